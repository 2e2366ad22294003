use bytes::Buf;
use bytes::BytesMut;
use tracing::warn;

/// Streaming byte-to-line decoder.
///
/// SSE events arrive split at arbitrary byte offsets, so a chunk can end in
/// the middle of a multi-byte UTF-8 sequence or in the middle of a line.
/// `feed` absorbs one chunk and yields only the lines that are complete;
/// both the undecodable byte tail and the trailing partial line are carried
/// over to the next call. Invalid sequences decode to U+FFFD rather than
/// aborting the stream.
#[derive(Default)]
pub(crate) struct LineDecoder {
    /// Bytes held back because they end in an incomplete UTF-8 sequence.
    pending: BytesMut,
    /// Decoded text after the last newline seen so far.
    partial: String,
}

impl LineDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Absorb one transport chunk and return every line it completes.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();

        let mut lines = Vec::new();
        while let Some(pos) = self.partial.find('\n') {
            let mut line: String = self.partial.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Drain everything left at end of stream. A trailing line is only
    /// returned if it decoded cleanly; a truncated multi-byte sequence means
    /// the line itself was cut off, so it is dropped rather than handed to
    /// the parser half-formed.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let partial = std::mem::take(&mut self.partial);
        if !self.pending.is_empty() {
            warn!(
                dropped = self.pending.len() + partial.len(),
                "discarding truncated trailing line"
            );
            self.pending.clear();
            return None;
        }
        let line = partial.strip_suffix('\r').unwrap_or(&partial);
        (!line.is_empty()).then(|| line.to_string())
    }

    /// Move as much of `pending` as possible into `partial`, leaving behind
    /// only an incomplete trailing sequence.
    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.partial.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    // The prefix up to `valid_up_to` is guaranteed UTF-8.
                    self.partial
                        .push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    self.pending.advance(valid);
                    match err.error_len() {
                        Some(bad) => {
                            self.partial.push(char::REPLACEMENT_CHARACTER);
                            self.pending.advance(bad);
                        }
                        // Incomplete sequence at the end of the chunk: wait
                        // for the next read.
                        None => return,
                    }
                }
            }
        }
    }
}
