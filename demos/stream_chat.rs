//! Streaming chat demo with replace-rendering to stdout.
//!
//! Run with:
//! ```bash
//! cargo run --example stream_chat -- "Merhaba, nasılsın?"
//! ```
//!
//! Expects the backend on http://127.0.0.1:8000 (override with SOHBET_URL).

use std::io::Write;
use std::time::Duration;

use futures::StreamExt;
use sohbet::{ChatClient, ChatMode, StreamEvent, TransportOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let message = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Merhaba!".to_string());
    let base_url =
        std::env::var("SOHBET_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());

    let options = TransportOptions::new(base_url).with_idle_timeout(Duration::from_secs(30));
    let client = ChatClient::new(options)?;

    println!("> {message}\n");

    // `send` falls back to the whole-response endpoint by itself when the
    // stream cannot be opened; both paths arrive here as events.
    let mut session = client.send(&message, ChatMode::Sohbet).await?;

    while let Some(event) = session.next().await {
        match event {
            Ok(StreamEvent::Delta(text)) => {
                // Full accumulated text on every event: plain replace.
                print!("\r{text}");
                std::io::stdout().flush()?;
            }
            Ok(StreamEvent::Complete(text)) => {
                println!("\r{text}");
            }
            Err(sohbet::ClientError::Interrupted { partial, source }) => {
                eprintln!("\nstream interrupted ({source}); partial answer kept:");
                println!("{partial}");
                break;
            }
            Err(error) => {
                eprintln!("\nstream failed: {error}");
                return Err(error.into());
            }
        }
    }

    Ok(())
}
