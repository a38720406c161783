//! HTTP client construction and request helpers.

use reqwest::{Client, ClientBuilder, RequestBuilder};
use std::collections::HashMap;

use crate::options::TransportOptions;

/// Build a configured HTTP client for the non-streaming endpoints.
///
/// Applies the whole-request timeout and proxy from the options.
pub fn build_http_client(options: &TransportOptions) -> Result<Client, reqwest::Error> {
    let mut builder = common_builder(options);

    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }

    builder.build()
}

/// Build the HTTP client used for the streaming endpoint.
///
/// Same configuration minus the whole-request timeout: a stream stays open
/// for as long as the backend keeps generating, and the per-chunk idle bound
/// is enforced by the session driver instead.
pub fn build_streaming_client(options: &TransportOptions) -> Result<Client, reqwest::Error> {
    common_builder(options).build()
}

fn common_builder(options: &TransportOptions) -> ClientBuilder {
    let mut builder = Client::builder();

    if let Some(proxy_url) = &options.proxy {
        if let Ok(proxy) = reqwest::Proxy::all(proxy_url) {
            builder = builder.proxy(proxy);
        }
    }

    builder
}

/// Add extra headers to a request if specified in the transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Join the base URL with an endpoint path, tolerating a trailing slash.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}
