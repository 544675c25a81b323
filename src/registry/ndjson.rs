//! Newline-delimited JSON decoding for pull responses.

use crate::error::RegistryError;
use crate::registry::{PullEvent, PullStream, RegistryResult};
use futures_util::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;

/// Incremental line splitter; chunks may cut lines anywhere
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buf: Vec<u8>,
    /// Bytes of `buf` already known to hold no newline
    scanned: usize,
}

impl NdjsonDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every event completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RegistryResult<PullEvent>> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + offset;
            if let Some(event) = decode_line(&self.buf[start..end]) {
                events.push(event);
            }
            start = end + 1;
            self.scanned = start;
        }

        self.buf.drain(..start);
        self.scanned = self.buf.len();
        events
    }

    /// Flush a trailing line that had no newline
    pub fn finish(&mut self) -> Option<RegistryResult<PullEvent>> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        decode_line(&rest)
    }
}

fn decode_line(line: &[u8]) -> Option<RegistryResult<PullEvent>> {
    let start = line.iter().position(|b| !b.is_ascii_whitespace())?;
    let end = line.iter().rposition(|b| !b.is_ascii_whitespace())?;
    let line = &line[start..=end];

    Some(serde_json::from_slice(line).map_err(|e| {
        RegistryError::Decode(format!(
            "bad pull event {:?}: {e}",
            String::from_utf8_lossy(line)
        ))
    }))
}

struct DecodeState<S> {
    inner: Pin<Box<S>>,
    decoder: NdjsonDecoder,
    ready: VecDeque<RegistryResult<PullEvent>>,
    finished: bool,
}

/// Turn a byte stream into a stream of pull events. Ends after the first transport error.
pub fn decode_stream<S, B>(bytes: S) -> PullStream
where
    S: Stream<Item = RegistryResult<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = DecodeState {
        inner: Box::pin(bytes),
        decoder: NdjsonDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.ready.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => st.ready.extend(st.decoder.push(chunk.as_ref())),
                Some(Err(e)) => {
                    st.finished = true;
                    st.ready.push_back(Err(e));
                }
                None => {
                    st.finished = true;
                    if let Some(last) = st.decoder.finish() {
                        st.ready.push_back(last);
                    }
                }
            }
        }
    })
    .boxed()
}
