//! Generation progress demo: poll the backend until it goes idle.
//!
//! Run with:
//! ```bash
//! cargo run --example watch_progress
//! ```

use std::time::Duration;

use futures::StreamExt;
use sohbet::{ChatClient, ProgressStatus, TransportOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let base_url =
        std::env::var("SOHBET_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
    let client = ChatClient::new(TransportOptions::new(base_url))?;

    let mut poller = client.watch_progress(Duration::from_millis(500));
    let mut was_generating = false;

    while let Some(report) = poller.next().await {
        println!(
            "{:>3}% {:?} {}",
            report.percent, report.status, report.message
        );

        match report.status {
            ProgressStatus::Generating => was_generating = true,
            ProgressStatus::Idle if was_generating => break,
            ProgressStatus::Idle => {}
        }
    }

    Ok(())
}
