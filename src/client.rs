//! Backend client surface and error types.

use std::time::Duration;

use futures::TryStreamExt;
use thiserror::Error;

use crate::http::{add_extra_headers, build_http_client, build_streaming_client, join_url};
use crate::model::{ChatMode, HistoryMessage, ProgressReport};
use crate::options::TransportOptions;
use crate::progress::ProgressPoller;
use crate::stream::{SessionHandle, StreamSession};

const CHAT_PATH: &str = "/chat";
const CHAT_STREAM_PATH: &str = "/chat_stream";
const HISTORY_PATH: &str = "/get_history";
const NEW_CHAT_PATH: &str = "/new_chat";
const PROGRESS_PATH: &str = "/get_progress";

/// Errors that can occur during client operations.
///
/// A malformed streaming frame is not an error: the line is dropped by
/// policy and streaming continues (visible at `tracing::debug!` level).
#[derive(Error, Debug)]
pub enum ClientError {
    /// The streaming request was refused before any bytes were read.
    /// Recovered by [`ChatClient::send`]'s non-streaming fallback.
    #[error("streaming request refused with status {0}")]
    StreamInit(reqwest::StatusCode),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The transport failed after the stream was established. Carries
    /// everything accumulated up to the failure; the caller decides
    /// whether to show the partial answer or discard it.
    #[error("stream interrupted: {source}")]
    Interrupted {
        partial: String,
        source: Box<ClientError>,
    },

    /// No chunk arrived within the configured idle timeout. Appears as the
    /// source of an [`ClientError::Interrupted`].
    #[error("no data received for {0:?}")]
    Stalled(Duration),

    /// The non-streaming reply carried no answer text.
    #[error("reply carried no answer text")]
    EmptyReply,

    /// The session was abandoned before reaching a terminal event.
    #[error("session cancelled")]
    Cancelled,
}

/// Client for one chat backend.
///
/// Holds two configured `reqwest` clients: the non-streaming one honors the
/// whole-request timeout from the options, the streaming one deliberately
/// does not (a live stream is bounded per-chunk by `idle_timeout` instead).
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    streaming_http: reqwest::Client,
    options: TransportOptions,
}

impl ChatClient {
    /// Create a client from transport options.
    pub fn new(options: TransportOptions) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_http_client(&options)?,
            streaming_http: build_streaming_client(&options)?,
            options,
        })
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Send a message to the non-streaming chat endpoint and return the
    /// whole answer at once.
    pub async fn chat(&self, message: &str, mode: ChatMode) -> Result<String, ClientError> {
        let url = join_url(&self.options.base_url, CHAT_PATH);
        let request = self
            .http
            .post(&url)
            .form(&[("mesaj", message), ("mod", mode.as_str())]);
        let request = add_extra_headers(request, &self.options.extra_headers);

        let response = request.send().await?.error_for_status()?;
        let body = response.text().await?;
        let reply: ChatReply = serde_json::from_str(&body)?;

        match reply.cevap {
            Some(answer) if !answer.is_empty() => Ok(answer),
            _ => Err(ClientError::EmptyReply),
        }
    }

    /// Open a streaming session against the streaming chat endpoint.
    ///
    /// Fails fast with [`ClientError::StreamInit`] on a non-success status,
    /// before any event is produced; the caller may then fall back to
    /// [`ChatClient::chat`] (or use [`ChatClient::send`], which does).
    pub async fn chat_stream(
        &self,
        message: &str,
        mode: ChatMode,
    ) -> Result<StreamSession, ClientError> {
        let url = join_url(&self.options.base_url, CHAT_STREAM_PATH);
        let request = self
            .streaming_http
            .post(&url)
            .form(&[("mesaj", message), ("mod", mode.as_str())]);
        let request = add_extra_headers(request, &self.options.extra_headers);

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::StreamInit(status));
        }

        tracing::debug!(%url, %mode, "streaming session opened");
        let bytes = response.bytes_stream().map_err(ClientError::from);
        Ok(StreamSession::new(bytes, self.options.idle_timeout))
    }

    /// Send a message, streaming if possible.
    ///
    /// When the stream cannot be established at all (refused status or the
    /// request never left), the same message is re-sent to the non-streaming
    /// endpoint and the whole answer is wrapped in a session that yields a
    /// single `Complete` event, so callers consume both paths uniformly.
    /// Mid-stream failures do NOT trigger the fallback; they surface as
    /// [`ClientError::Interrupted`] with the partial text.
    pub async fn send(&self, message: &str, mode: ChatMode) -> Result<StreamSession, ClientError> {
        match self.chat_stream(message, mode).await {
            Ok(session) => Ok(session),
            // Only establishment failures reach this arm; no stream bytes
            // were consumed yet.
            Err(error) => {
                tracing::warn!(%error, "streaming unavailable, falling back to whole-response chat");
                let answer = self.chat(message, mode).await?;
                Ok(StreamSession::completed(answer))
            }
        }
    }

    /// Fetch the active transcript.
    pub async fn history(&self) -> Result<Vec<HistoryMessage>, ClientError> {
        let url = join_url(&self.options.base_url, HISTORY_PATH);
        let request = add_extra_headers(self.http.get(&url), &self.options.extra_headers);
        let response = request.send().await?.error_for_status()?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Reset the conversation; the backend archives the current transcript
    /// and starts a fresh one.
    pub async fn new_chat(&self) -> Result<(), ClientError> {
        let url = join_url(&self.options.base_url, NEW_CHAT_PATH);
        let request = add_extra_headers(self.http.post(&url), &self.options.extra_headers);
        request.send().await?.error_for_status()?;
        Ok(())
    }

    /// Fetch one generation progress snapshot.
    pub async fn progress(&self) -> Result<ProgressReport, ClientError> {
        let url = join_url(&self.options.base_url, PROGRESS_PATH);
        let request = add_extra_headers(self.http.get(&url), &self.options.extra_headers);
        let response = request.send().await?.error_for_status()?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Poll the progress endpoint on a fixed period.
    pub fn watch_progress(&self, period: Duration) -> ProgressPoller {
        ProgressPoller::new(self.clone(), period)
    }
}

/// Conversation-scoped sender enforcing at most one live session per turn.
///
/// Starting a new turn cancels the previous unterminated session through its
/// handle before opening the next, so a late chunk of an abandoned stream
/// can never render into the new turn.
pub struct Conversation {
    client: ChatClient,
    mode: ChatMode,
    active: Option<SessionHandle>,
}

impl Conversation {
    pub fn new(client: ChatClient, mode: ChatMode) -> Self {
        Self {
            client,
            mode,
            active: None,
        }
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    /// Send the next turn, cancelling any session still live from the
    /// previous one.
    pub async fn send(&mut self, message: &str) -> Result<StreamSession, ClientError> {
        if let Some(previous) = self.active.take() {
            previous.cancel();
        }
        let session = self.client.send(message, self.mode).await?;
        self.active = Some(session.handle());
        Ok(session)
    }

    /// Cancel any live session and reset the conversation server-side.
    pub async fn reset(&mut self) -> Result<(), ClientError> {
        if let Some(previous) = self.active.take() {
            previous.cancel();
        }
        self.client.new_chat().await
    }
}

#[derive(Debug, serde::Deserialize)]
struct ChatReply {
    cevap: Option<String>,
}
