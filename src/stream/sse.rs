// src/stream/sse.rs
// Incremental SSE frame parser over a byte stream

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

use crate::error::AnimaError;

/// One named frame of the job stream: the accumulated `event:` name and the
/// joined `data:` lines of a single SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// SSE frame parser that buffers lines across byte chunks.
///
/// Accumulates `event:` and `data:` fields and emits a frame on each blank
/// line. Comment lines (leading `:`) and unknown fields are skipped, which is
/// how the server's heartbeats are tolerated.
pub struct SseFrames<S> {
    inner: S,
    buffer: Vec<u8>,
    current_event: Option<String>,
    current_data: Vec<String>,
    done: bool,
}

impl<S> SseFrames<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            current_event: None,
            current_data: Vec::new(),
            done: false,
        }
    }

    fn take_frame(&mut self) -> Option<SseFrame> {
        if self.current_event.is_none() && self.current_data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event: self.current_event.take(),
            data: std::mem::take(&mut self.current_data).join("\n"),
        })
    }

    /// Consume complete lines from the buffer. Returns a frame when a blank
    /// line closes one, otherwise `None` (need more bytes). Lines are split
    /// at the byte level so a multibyte character straddling two network
    /// chunks is reassembled before UTF-8 decoding.
    fn drain_buffered_lines(&mut self) -> Option<SseFrame> {
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.take_frame() {
                    return Some(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            if let Some(name) = line.strip_prefix("event:") {
                self.current_event = Some(name.trim().to_string());
            } else if let Some(data) = line.strip_prefix("data:") {
                self.current_data.push(data.trim_start().to_string());
            }
            // Other fields (id:, retry:) carry nothing this protocol uses.
        }
        None
    }
}

impl<S, E> Stream for SseFrames<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<SseFrame, AnimaError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.done {
                // Flush anything accumulated when the stream ended mid-event.
                if let Some(frame) = self.take_frame() {
                    return Poll::Ready(Some(Ok(frame)));
                }
                return Poll::Ready(None);
            }
            if let Some(frame) = self.drain_buffered_lines() {
                return Poll::Ready(Some(Ok(frame)));
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(err))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(AnimaError::Transport(err.to_string()))));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    // Flush a final frame the server did not terminate.
                    if !self.buffer.is_empty() {
                        self.buffer.push(b'\n');
                        if let Some(frame) = self.drain_buffered_lines() {
                            return Poll::Ready(Some(Ok(frame)));
                        }
                    }
                    if let Some(frame) = self.take_frame() {
                        return Poll::Ready(Some(Ok(frame)));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn byte_stream(
        chunks: Vec<&'static str>,
    ) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    async fn collect(chunks: Vec<&'static str>) -> Vec<SseFrame> {
        SseFrames::new(byte_stream(chunks))
            .map(|frame| frame.expect("frame error"))
            .collect()
            .await
    }

    #[tokio::test]
    async fn parses_named_frames() {
        let frames = collect(vec![
            "event: start\ndata: {\"sessionId\":\"s1\"}\n\n",
            "event: done\ndata: {\"payload\":{}}\n\n",
        ])
        .await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("start"));
        assert_eq!(frames[0].data, r#"{"sessionId":"s1"}"#);
        assert_eq!(frames[1].event.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn reassembles_frames_split_across_chunks() {
        let frames = collect(vec![
            "event: generating_code\nda",
            "ta: {\"payload\":{\"st",
            "atus\":\"running\",\"progress\":40}}\n",
            "\n",
        ])
        .await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("generating_code"));
        assert!(frames[0].data.contains("\"progress\":40"));
    }

    #[tokio::test]
    async fn skips_comments_and_heartbeats() {
        let frames = collect(vec![
            ": keep-alive\n\n",
            "event: start\ndata: {}\n\n",
            ": another heartbeat\n",
            "\n",
        ])
        .await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("start"));
    }

    #[tokio::test]
    async fn joins_multiline_data() {
        let frames = collect(vec!["event: x\ndata: line1\ndata: line2\n\n"]).await;
        assert_eq!(frames[0].data, "line1\nline2");
    }

    #[tokio::test]
    async fn flushes_unterminated_final_frame() {
        let frames = collect(vec!["event: done\ndata: {\"payload\":{}}"]).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn multibyte_character_split_across_chunks_survives() {
        // "é" is 0xC3 0xA9; the chunk boundary falls between the two bytes.
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"event: progress_messages_updated\ndata: {\"title\":\"r\xC3")),
            Ok(Bytes::from_static(b"\xA9sum\xC3\xA9\"}\n\n")),
        ];
        let frames: Vec<SseFrame> = SseFrames::new(futures::stream::iter(chunks))
            .map(|frame| frame.expect("frame error"))
            .collect()
            .await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, r#"{"title":"résumé"}"#);
    }

    #[tokio::test]
    async fn crlf_lines_handled() {
        let frames = collect(vec!["event: start\r\ndata: {}\r\n\r\n"]).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("start"));
        assert_eq!(frames[0].data, "{}");
    }
}
