//! # sohbet - Streaming chat backend client
//!
//! A small, pragmatic Rust client for a self-hosted chat backend that
//! streams its answers over Server-Sent Events.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Incremental SSE frame parsing, safe across arbitrary chunk boundaries
//! - Sessions as lazy `futures::Stream`s with explicit cancellation handles
//! - Automatic fallback to the whole-response endpoint when streaming is
//!   unavailable
//! - Transcript, conversation-reset, and generation-progress endpoints
//!
//! ## Architecture
//!
//! A [`client::ChatClient`] opens one [`stream::StreamSession`] per turn.
//! The session yields [`model::StreamEvent`]s where every `Delta` carries
//! the full accumulated text so far, so a renderer replaces its display on
//! each event instead of appending. Exactly one terminal item ends every
//! session that is not abandoned through its [`stream::SessionHandle`].
//!
//! Malformed frames in the stream are dropped silently by policy; a single
//! bad line never aborts a session.
//!
//! ## Example
//! ```no_run
//! use futures::StreamExt;
//! use sohbet::client::ChatClient;
//! use sohbet::model::{ChatMode, StreamEvent};
//! use sohbet::options::TransportOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::new(TransportOptions::default())?;
//!
//!     let mut session = client.send("Merhaba!", ChatMode::Sohbet).await?;
//!     while let Some(event) = session.next().await {
//!         match event? {
//!             StreamEvent::Delta(text) => print!("\r{text}"),
//!             StreamEvent::Complete(text) => println!("\r{text}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod progress;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{ChatClient, ClientError, Conversation};
pub use model::{ChatMode, HistoryMessage, ProgressReport, ProgressStatus, Role, StreamEvent};
pub use options::TransportOptions;
pub use progress::ProgressPoller;
pub use stream::{SessionHandle, StreamSession};
