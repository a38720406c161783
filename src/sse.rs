//! Server-Sent Events frame extraction.
//!
//! The backend streams a plain text body of newline-separated lines:
//!
//! ```text
//! data: {"text": "Mer"}
//! data: {"text": "haba"}
//! data: {"done": true}
//! ```
//!
//! Lines without the `data: ` prefix (keep-alives, comments, blank lines)
//! are ignored. A line whose payload is not valid JSON is dropped and the
//! stream continues; a single malformed frame must never abort a session.
//! The drop is observable at `tracing::debug!` level.

use bytes::BytesMut;
use serde::Deserialize;

const DATA_PREFIX: &str = "data: ";

/// A parsed protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The next increment of response text.
    Delta(String),
    /// Terminal marker; the stream is complete.
    Done,
}

/// Incremental frame extractor over a raw byte stream.
///
/// Buffers bytes rather than decoded text: `\n` (0x0A) never occurs inside
/// a multi-byte UTF-8 sequence, so line extraction cannot cut a character
/// in half, and a character split across chunk boundaries simply stays in
/// the tail until its remaining bytes arrive. At any point the buffer holds
/// only the fragment after the last newline seen.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and extract every frame completed by it, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            if let Some(frame) = parse_line(&line[..pos]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush the unterminated tail at end of input as a final line.
    ///
    /// The backend normally terminates every frame with `\n`, but a stream
    /// that closes right after a complete payload should not lose it.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.buf.is_empty() {
            return None;
        }
        let tail = self.buf.split();
        parse_line(&tail)
    }

    /// Bytes currently held back waiting for a newline.
    #[cfg(test)]
    fn residue(&self) -> &[u8] {
        &self.buf
    }
}

/// Payload of a `data: ` line. Missing fields are defaults, never errors:
/// a frame without `text` contributes the empty string.
#[derive(Debug, Deserialize)]
struct FramePayload {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    text: String,
}

fn parse_line(line: &[u8]) -> Option<Frame> {
    // Tolerate CRLF from normalizing intermediaries.
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let line = std::str::from_utf8(line).ok()?;
    let payload = line.strip_prefix(DATA_PREFIX)?;

    match serde_json::from_str::<FramePayload>(payload) {
        Ok(FramePayload { done: true, .. }) => Some(Frame::Done),
        Ok(FramePayload { text, .. }) => Some(Frame::Delta(text)),
        Err(error) => {
            tracing::debug!(%error, payload, "dropping malformed frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(chunks: &[&[u8]]) -> Vec<Frame> {
        let mut buffer = FrameBuffer::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            frames.extend(buffer.feed(chunk));
        }
        frames.extend(buffer.finish());
        frames
    }

    #[test]
    fn extracts_frames_in_order() {
        let frames = feed_all(&[b"data: {\"text\":\"A\"}\ndata: {\"text\":\"B\"}\n"]);
        assert_eq!(
            frames,
            vec![Frame::Delta("A".into()), Frame::Delta("B".into())]
        );
    }

    #[test]
    fn done_payload_is_terminal_frame() {
        let frames = feed_all(&[b"data: {\"done\": true}\n"]);
        assert_eq!(frames, vec![Frame::Done]);
    }

    #[test]
    fn missing_text_field_is_empty_delta() {
        let frames = feed_all(&[b"data: {}\n"]);
        assert_eq!(frames, vec![Frame::Delta(String::new())]);
    }

    #[test]
    fn malformed_json_dropped_valid_neighbors_kept() {
        let frames = feed_all(&[
            b"data: {\"text\":\"A\"}\ndata: not-json\ndata: {\"text\":\"B\"}\n",
        ]);
        assert_eq!(
            frames,
            vec![Frame::Delta("A".into()), Frame::Delta("B".into())]
        );
    }

    #[test]
    fn non_prefixed_lines_ignored() {
        let frames = feed_all(&[b": keep-alive\nevent: ping\n\ndata: {\"text\":\"X\"}\n"]);
        assert_eq!(frames, vec![Frame::Delta("X".into())]);
    }

    #[test]
    fn frame_split_mid_payload() {
        let frames = feed_all(&[b"data: {\"text\":\"Hel", b"lo\"}\n"]);
        assert_eq!(frames, vec![Frame::Delta("Hello".into())]);
    }

    #[test]
    fn frame_split_inside_prefix() {
        let frames = feed_all(&[b"da", b"ta: {\"text\":\"Y\"}\n"]);
        assert_eq!(frames, vec![Frame::Delta("Y".into())]);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        // "Ş" is 0xC5 0x9E; deliver one byte per chunk.
        let line = "data: {\"text\":\"Şeker\"}\n".as_bytes();
        let chunks: Vec<&[u8]> = line.chunks(1).collect();
        let frames = feed_all(&chunks);
        assert_eq!(frames, vec![Frame::Delta("Şeker".into())]);
    }

    #[test]
    fn chunk_boundary_invariance() {
        let input = "data: {\"text\":\"Merhaba \"}\ndata: not-json\n: ping\ndata: {\"text\":\"dünya\"}\ndata: {\"done\":true}\n".as_bytes();
        let whole = feed_all(&[input]);
        for size in 1..=7 {
            let chunks: Vec<&[u8]> = input.chunks(size).collect();
            assert_eq!(feed_all(&chunks), whole, "split at {size} bytes diverged");
        }
    }

    #[test]
    fn finish_flushes_unterminated_tail() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.feed(b"data: {\"text\":\"Hi\"}").is_empty());
        assert_eq!(buffer.finish(), Some(Frame::Delta("Hi".into())));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn finish_drops_partial_garbage() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.feed(b"data: {\"text\":\"tru").is_empty());
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn crlf_lines_parse() {
        let frames = feed_all(&[b"data: {\"text\":\"Z\"}\r\ndata: {\"done\":true}\r\n"]);
        assert_eq!(frames, vec![Frame::Delta("Z".into()), Frame::Done]);
    }

    #[test]
    fn non_boolean_done_is_malformed() {
        // Leniency policy: the frame is dropped, not promoted to a terminal.
        let frames = feed_all(&[b"data: {\"done\": \"yes\"}\n"]);
        assert!(frames.is_empty());
    }

    #[test]
    fn frames_after_done_still_parsed() {
        // The parser attaches no session semantics; the driver stops at the
        // first Done.
        let frames = feed_all(&[b"data: {\"done\":true}\ndata: {\"text\":\"late\"}\n"]);
        assert_eq!(frames, vec![Frame::Done, Frame::Delta("late".into())]);
    }

    #[test]
    fn residue_holds_only_the_tail() {
        let mut buffer = FrameBuffer::new();
        buffer.feed(b"data: {\"text\":\"A\"}\ndata: {\"te");
        assert_eq!(buffer.residue(), b"data: {\"te");
    }
}
