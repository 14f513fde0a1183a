//! Incremental decoding of the newline-delimited JSON body that `/api/chat`
//! returns when `stream` is set.

use std::{collections::VecDeque, fmt::Display, pin::Pin};

use futures::{stream, Stream, StreamExt};
use memchr::memchr;
use tracing::debug;

use crate::api::ChatResponse;
use crate::error::TransportError;

/// Turns raw body chunks into content fragments.
///
/// Bytes are buffered until a `\n` arrives, so a JSON object split across
/// two reads (or a multibyte character split across them) decodes the same
/// as if it had arrived in one read.
#[derive(Debug, Default)]
pub struct FragmentDecoder {
    buffer: Vec<u8>,
}

impl FragmentDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one read and returns the fragments of every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut fragments = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = memchr(b'\n', &self.buffer[consumed..]) {
            let line_end = consumed + offset;
            if let Some(fragment) = parse_line(&self.buffer[consumed..line_end]) {
                fragments.push(fragment);
            }
            consumed = line_end + 1;
        }
        self.buffer.drain(..consumed);
        fragments
    }

    /// Ends the body. Only newline-terminated lines are ever decoded, so an
    /// unterminated remainder is dropped.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            debug!(bytes = self.buffer.len(), "dropping unterminated stream line");
            self.buffer.clear();
        }
    }

    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

fn parse_line(raw: &[u8]) -> Option<String> {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line.trim(),
        Err(err) => {
            debug!(error = %err, "skipping stream line with invalid UTF-8");
            return None;
        }
    };
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<ChatResponse>(line) {
        Ok(response) => response
            .content()
            .filter(|content| !content.is_empty())
            .map(str::to_owned),
        Err(err) => {
            debug!(error = %err, line, "skipping unparsable stream line");
            None
        }
    }
}

struct DecodeState<S> {
    chunks: Pin<Box<S>>,
    decoder: FragmentDecoder,
    ready: VecDeque<String>,
    finished: bool,
}

/// Adapts a stream of body chunks into a stream of content fragments.
///
/// The result is forward-only and ends when `chunks` ends. A read error is
/// yielded once as `TransportError::Stream` and terminates the sequence.
pub fn decode_fragments<S, B, E>(chunks: S) -> impl Stream<Item = Result<String, TransportError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = DecodeState {
        chunks: Box::pin(chunks),
        decoder: FragmentDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.ready.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.finished {
                return None;
            }

            match state.chunks.next().await {
                Some(Ok(chunk)) => {
                    let fragments = state.decoder.push(chunk.as_ref());
                    state.ready.extend(fragments);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(TransportError::Stream(err.to_string())), state));
                }
                None => {
                    state.finished = true;
                    state.decoder.finish();
                }
            }
        }
    })
}
