//! Incremental decoder for the chat response body
//!
//! The body arrives as arbitrary byte chunks. Frames are separated by a blank
//! line (`"\n\n"`) and may be split anywhere, including in the middle of a
//! multi-byte UTF-8 sequence.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

/// Boundary between two frames
pub const FRAME_DELIMITER: &str = "\n\n";

/// Buffers decoded text until it forms complete frames.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Bytes of an incomplete UTF-8 sequence at the end of the last chunk
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a delimiter
    buffer: String,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every frame it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode(chunk);

        let mut frames = Vec::new();
        while let Some(boundary) = self.buffer.find(FRAME_DELIMITER) {
            frames.push(self.buffer[..boundary].to_string());
            self.buffer.drain(..boundary + FRAME_DELIMITER.len());
        }
        frames
    }

    /// Text still waiting for its delimiter.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }

    /// Consume the decoder and hand back the unterminated tail, if any.
    pub fn finish(mut self) -> Option<String> {
        if !self.pending.is_empty() {
            self.buffer.push(char::REPLACEMENT_CHARACTER);
        }
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer)
        }
    }

    fn decode(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        let mut consumed = 0;
        while consumed < self.pending.len() {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    consumed = self.pending.len();
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    let good = &self.pending[consumed..consumed + valid];
                    self.buffer.push_str(&String::from_utf8_lossy(good));
                    match err.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid + len;
                        }
                        // Sequence continues in the next chunk
                        None => {
                            consumed += valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }
}

/// Turn a byte stream into a lazy stream of frame candidates.
///
/// The first body error is yielded and ends the stream. An unterminated tail
/// left when the body ends is not yielded.
pub fn frames<S, E>(body: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    async_stream::stream! {
        let mut decoder = StreamDecoder::new();
        futures_util::pin_mut!(body);
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for frame in decoder.push(&bytes) {
                        yield Ok(frame);
                    }
                }
                Err(err) => {
                    yield Err(err);
                    break;
                }
            }
        }
        if !decoder.remainder().trim().is_empty() {
            tracing::debug!(tail = decoder.remainder(), "dropping unterminated frame at end of stream");
        }
    }
}
