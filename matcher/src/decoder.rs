//! Incremental byte-to-line decoding.
//!
//! [`LineDecoder`] accepts arbitrarily sized chunks, decodes them with a
//! configured character encoding, and yields complete lines. A trailing
//! partial line (or a multi-byte character split across chunks) stays
//! buffered until the next [`LineDecoder::write`] or [`LineDecoder::end`].

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};

use crate::error::UnknownEncoding;

pub struct LineDecoder {
    encoding: &'static Encoding,
    decoder: Decoder,
    buffer: String,
}

impl LineDecoder {
    #[must_use]
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            decoder: encoding.new_decoder_with_bom_removal(),
            buffer: String::new(),
        }
    }

    /// Decoder for a WHATWG encoding label such as `"utf-8"` or `"windows-1252"`.
    pub fn for_label(label: &str) -> Result<Self, UnknownEncoding> {
        Encoding::for_label(label.trim().as_bytes())
            .map(Self::new)
            .ok_or_else(|| UnknownEncoding(label.to_string()))
    }

    #[must_use]
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Feed a chunk and iterate the lines it completes.
    ///
    /// Lines are produced lazily; any the caller does not consume remain
    /// buffered and are yielded again by the next call.
    pub fn write(&mut self, chunk: &[u8]) -> Lines<'_> {
        self.decode(chunk, false);
        Lines {
            buffer: &mut self.buffer,
            consumed: 0,
        }
    }

    /// Flush the decoder and return the final unterminated line (empty when
    /// nothing is pending). The decoder is reset for reuse.
    ///
    /// Complete lines left unread by a dropped [`Lines`] are not part of the
    /// result; they stay buffered and the next [`LineDecoder::write`] yields them.
    pub fn end(&mut self) -> String {
        self.decode(&[], true);
        self.decoder = self.encoding.new_decoder_with_bom_removal();
        let start = self.buffer.rfind('\n').map_or(0, |newline| newline + 1);
        let mut rest = self.buffer.split_off(start);
        if rest.ends_with('\r') {
            rest.pop();
        }
        rest
    }

    /// Decode a complete byte buffer into lines, including a final unterminated line.
    #[must_use]
    pub fn decode_all(encoding: &'static Encoding, bytes: &[u8]) -> Vec<String> {
        let mut decoder = Self::new(encoding);
        let mut lines: Vec<String> = decoder.write(bytes).collect();
        let last = decoder.end();
        if !last.is_empty() {
            lines.push(last);
        }
        lines
    }

    fn decode(&mut self, bytes: &[u8], last: bool) {
        let mut remaining = bytes;
        loop {
            let wanted = self
                .decoder
                .max_utf8_buffer_length(remaining.len())
                .unwrap_or(remaining.len().saturating_mul(3))
                .max(4);
            self.buffer.reserve(wanted);
            let (result, read, _had_replacements) =
                self.decoder
                    .decode_to_string(remaining, &mut self.buffer, last);
            remaining = &remaining[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => {}
            }
        }
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(UTF_8)
    }
}

/// Lines completed by one [`LineDecoder::write`] call.
///
/// `\n` terminates a line; a preceding `\r` is dropped.
pub struct Lines<'a> {
    buffer: &'a mut String,
    consumed: usize,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let rest = &self.buffer[self.consumed..];
        let newline = rest.find('\n')?;
        let raw = &rest[..newline];
        let line = raw.strip_suffix('\r').unwrap_or(raw).to_string();
        self.consumed += newline + 1;
        Some(line)
    }
}

impl Drop for Lines<'_> {
    fn drop(&mut self) {
        self.buffer.drain(..self.consumed);
    }
}
