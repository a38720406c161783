//! Streaming session driver.
//!
//! A [`StreamSession`] owns one streamed response end-to-end: it reads raw
//! chunks, feeds the frame parser, and yields [`StreamEvent`]s in arrival
//! order. Exactly one terminal item ends every session that is not
//! abandoned: `Ok(StreamEvent::Complete(_))` on a terminal frame or a clean
//! end-of-data, `Err(_)` on a mid-stream failure. Nothing is yielded after
//! the terminal, and nothing is yielded after cancellation.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::watch;

use crate::client::ClientError;
use crate::model::StreamEvent;
use crate::sse::{Frame, FrameBuffer};

/// Cancellation handle for one session.
///
/// Cloneable; any clone may cancel. Cancellation is cooperative: the driver
/// checks the flag before every yielded item and races every pending read
/// against it, so the transport handle is released promptly rather than
/// drained. An abandoned session yields no further items and no terminal.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: Arc::new(tx),
            },
            rx,
        )
    }

    /// Abandon the session. Idempotent.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// One streamed response, from request initiation to terminal event.
///
/// Implements `Stream<Item = Result<StreamEvent, ClientError>>`. Every
/// `Delta` carries the full accumulated text so far; the renderer replaces
/// its display rather than appending.
pub struct StreamSession {
    inner: Pin<Box<dyn Stream<Item = Result<StreamEvent, ClientError>> + Send>>,
    handle: SessionHandle,
}

impl StreamSession {
    /// Drive a raw byte stream as a session.
    pub(crate) fn new<S>(bytes: S, idle_timeout: Option<Duration>) -> Self
    where
        S: Stream<Item = Result<Bytes, ClientError>> + Send + 'static,
    {
        let (handle, cancel) = SessionHandle::new();
        let driver = Driver {
            bytes: Box::pin(bytes),
            parser: FrameBuffer::new(),
            pending: VecDeque::new(),
            accumulated: String::new(),
            idle_timeout,
            cancel,
            // Keeps the watch channel alive even if every handle is dropped.
            _keepalive: handle.clone(),
            eof: false,
            finished: false,
        };
        let inner = stream::unfold(driver, |mut driver| async move {
            let item = driver.advance().await?;
            Some((item, driver))
        });
        Self {
            inner: Box::pin(inner),
            handle,
        }
    }

    /// A session that is already complete, used for the non-streaming
    /// fallback so callers consume both paths uniformly. Honors the same
    /// cancel contract as a live session: nothing is yielded after the
    /// handle is cancelled.
    pub(crate) fn completed(text: String) -> Self {
        let (handle, cancel) = SessionHandle::new();
        let inner = stream::unfold(
            (Some(text), cancel, handle.clone()),
            |(text, cancel, keepalive)| async move {
                let text = text?;
                if *cancel.borrow() {
                    return None;
                }
                Some((
                    Ok(StreamEvent::Complete(text)),
                    (None, cancel, keepalive),
                ))
            },
        );
        Self {
            inner: Box::pin(inner),
            handle,
        }
    }

    /// A handle for cancelling this session.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Drain the session and return the canonical final text.
    ///
    /// Returns the terminal error if the session failed, and
    /// [`ClientError::Cancelled`] if it was abandoned before any terminal.
    pub async fn into_text(mut self) -> Result<String, ClientError> {
        while let Some(item) = self.inner.next().await {
            if let StreamEvent::Complete(text) = item? {
                return Ok(text);
            }
        }
        Err(ClientError::Cancelled)
    }
}

impl Stream for StreamSession {
    type Item = Result<StreamEvent, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

struct Driver {
    bytes: Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>,
    parser: FrameBuffer,
    pending: VecDeque<Frame>,
    accumulated: String,
    idle_timeout: Option<Duration>,
    cancel: watch::Receiver<bool>,
    _keepalive: SessionHandle,
    eof: bool,
    finished: bool,
}

enum Read {
    Chunk(Bytes),
    End,
    Failed(ClientError),
    Cancelled,
}

impl Driver {
    /// Produce the next session item, or `None` when the session is over.
    async fn advance(&mut self) -> Option<Result<StreamEvent, ClientError>> {
        loop {
            if self.finished || *self.cancel.borrow() {
                return None;
            }

            if let Some(frame) = self.pending.pop_front() {
                match frame {
                    Frame::Delta(text) => {
                        self.accumulated.push_str(&text);
                        return Some(Ok(StreamEvent::Delta(self.accumulated.clone())));
                    }
                    Frame::Done => {
                        self.finished = true;
                        let text = std::mem::take(&mut self.accumulated);
                        return Some(Ok(StreamEvent::Complete(text)));
                    }
                }
            }

            if self.eof {
                // Transport closed without an explicit terminal frame; a
                // graceful end-of-stream counts as completion, even with
                // zero deltas received.
                self.finished = true;
                let text = std::mem::take(&mut self.accumulated);
                return Some(Ok(StreamEvent::Complete(text)));
            }

            match self.read().await {
                Read::Chunk(chunk) => self.pending.extend(self.parser.feed(&chunk)),
                Read::End => {
                    self.eof = true;
                    self.pending.extend(self.parser.finish());
                }
                Read::Failed(source) => {
                    self.finished = true;
                    return Some(Err(ClientError::Interrupted {
                        partial: std::mem::take(&mut self.accumulated),
                        source: Box::new(source),
                    }));
                }
                Read::Cancelled => return None,
            }
        }
    }

    /// Await the next chunk, racing cancellation and the idle bound.
    async fn read(&mut self) -> Read {
        let Driver {
            bytes,
            idle_timeout,
            cancel,
            ..
        } = self;

        let next_chunk = async {
            let item = match idle_timeout {
                Some(limit) => match tokio::time::timeout(*limit, bytes.next()).await {
                    Ok(item) => item,
                    Err(_) => return Read::Failed(ClientError::Stalled(*limit)),
                },
                None => bytes.next().await,
            };
            match item {
                Some(Ok(chunk)) => Read::Chunk(chunk),
                Some(Err(error)) => Read::Failed(error),
                None => Read::End,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.wait_for(|cancelled| *cancelled) => Read::Cancelled,
            outcome = next_chunk => outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked(chunks: &[&str]) -> StreamSession {
        let items: Vec<Result<Bytes, ClientError>> = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
            .collect();
        StreamSession::new(stream::iter(items), None)
    }

    async fn collect_events(
        mut session: StreamSession,
    ) -> Vec<Result<StreamEvent, ClientError>> {
        let mut events = Vec::new();
        while let Some(item) = session.next().await {
            events.push(item);
        }
        events
    }

    fn parse_error() -> ClientError {
        ClientError::Parse(serde_json::from_str::<serde_json::Value>("{").unwrap_err())
    }

    #[tokio::test]
    async fn frame_split_across_chunks() {
        let session = chunked(&[
            "data: {\"text\":\"Hel",
            "lo\"}\n",
            "data: {\"done\":true}\n",
        ]);
        let events = collect_events(session).await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Delta("Hello".into())
        );
        assert_eq!(
            events[1].as_ref().unwrap(),
            &StreamEvent::Complete("Hello".into())
        );
    }

    #[tokio::test]
    async fn malformed_line_skipped_mid_stream() {
        let session = chunked(&[
            "data: {\"text\":\"A\"}\ndata: not-json\ndata: {\"text\":\"B\"}\ndata: {\"done\":true}\n",
        ]);
        let events = collect_events(session).await;
        let events: Vec<_> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("A".into()),
                StreamEvent::Delta("AB".into()),
                StreamEvent::Complete("AB".into()),
            ]
        );
    }

    #[tokio::test]
    async fn close_without_terminal_frame_completes() {
        let session = chunked(&["data: {\"text\":\"Hi\"}\n"]);
        let events = collect_events(session).await;
        let events: Vec<_> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("Hi".into()),
                StreamEvent::Complete("Hi".into()),
            ]
        );
    }

    #[tokio::test]
    async fn empty_stream_completes_with_empty_text() {
        let events = collect_events(chunked(&[])).await;
        let events: Vec<_> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(events, vec![StreamEvent::Complete(String::new())]);
    }

    #[tokio::test]
    async fn nothing_after_first_terminal_frame() {
        let session = chunked(&[
            "data: {\"done\":true}\ndata: {\"text\":\"late\"}\ndata: {\"done\":true}\n",
        ]);
        let events = collect_events(session).await;
        let events: Vec<_> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(events, vec![StreamEvent::Complete(String::new())]);
    }

    #[tokio::test]
    async fn unterminated_tail_flushed_at_close() {
        let session = chunked(&["data: {\"text\":\"Hi\"}\ndata: {\"text\":\" there\"}"]);
        let text = session.into_text().await.unwrap();
        assert_eq!(text, "Hi there");
    }

    #[tokio::test]
    async fn final_text_is_concatenation_regardless_of_chunking() {
        // Raw byte chunks: a 1-byte split lands inside the "ü" sequence,
        // which must stay buffered until its remaining byte arrives.
        let body = "data: {\"text\":\"Mer\"}\ndata: {\"text\":\"haba \"}\ndata: {\"text\":\"dünya\"}\ndata: {\"done\":true}\n".as_bytes();
        for size in [1, 3, 8, body.len()] {
            let items: Vec<Result<Bytes, ClientError>> = body
                .chunks(size)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect();
            let session = StreamSession::new(stream::iter(items), None);
            let text = session.into_text().await.unwrap();
            assert_eq!(text, "Merhaba dünya", "split at {size} bytes diverged");
        }
    }

    #[tokio::test]
    async fn mid_stream_failure_carries_partial_text() {
        let items: Vec<Result<Bytes, ClientError>> = vec![
            Ok(Bytes::from_static(b"data: {\"text\":\"Hi\"}\n")),
            Err(parse_error()),
        ];
        let mut session = StreamSession::new(stream::iter(items), None);

        let first = session.next().await.unwrap().unwrap();
        assert_eq!(first, StreamEvent::Delta("Hi".into()));

        match session.next().await.unwrap() {
            Err(ClientError::Interrupted { partial, .. }) => assert_eq!(partial, "Hi"),
            other => panic!("expected Interrupted, got {other:?}"),
        }
        assert!(session.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_read_interrupts_with_partial() {
        let items: Vec<Result<Bytes, ClientError>> =
            vec![Ok(Bytes::from_static(b"data: {\"text\":\"Hi\"}\n"))];
        let bytes = stream::iter(items).chain(stream::pending());
        let mut session = StreamSession::new(bytes, Some(Duration::from_secs(5)));

        let first = session.next().await.unwrap().unwrap();
        assert_eq!(first, StreamEvent::Delta("Hi".into()));

        match session.next().await.unwrap() {
            Err(ClientError::Interrupted { partial, source }) => {
                assert_eq!(partial, "Hi");
                assert!(matches!(*source, ClientError::Stalled(_)));
            }
            other => panic!("expected Interrupted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_before_polling_yields_nothing() {
        let mut session = chunked(&["data: {\"text\":\"Hi\"}\n"]);
        session.handle().cancel();
        assert!(session.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_releases_a_pending_read() {
        let bytes = stream::pending::<Result<Bytes, ClientError>>();
        let mut session = StreamSession::new(bytes, None);
        let handle = session.handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        });

        assert!(session.next().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_session_into_text_reports_cancelled() {
        let session = chunked(&["data: {\"text\":\"Hi\"}\n"]);
        session.handle().cancel();
        assert!(matches!(
            session.into_text().await,
            Err(ClientError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn cancelled_completed_session_yields_nothing() {
        let mut session = StreamSession::completed("Merhaba".into());
        session.handle().cancel();
        assert!(session.next().await.is_none());

        let session = StreamSession::completed("Merhaba".into());
        session.handle().cancel();
        assert!(matches!(
            session.into_text().await,
            Err(ClientError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn completed_session_yields_single_terminal() {
        let session = StreamSession::completed("Merhaba".into());
        let events = collect_events(session).await;
        let events: Vec<_> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(events, vec![StreamEvent::Complete("Merhaba".into())]);
    }
}
