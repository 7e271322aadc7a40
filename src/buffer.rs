use std::str;

/// Growing byte buffer fed by a live transport.
///
/// Bytes are kept as received; text is produced by decoding the longest valid UTF-8
/// prefix, so a multi-byte character split across two chunks is held back until its
/// remaining bytes arrive. Invalid sequences in the interior decode to U+FFFD, the same
/// as a one-shot `String::from_utf8_lossy` of the full input.
#[derive(Debug, Default, Clone)]
pub struct StreamingTextBuffer {
    bytes: Vec<u8>,
    text: String,
    // bytes[..decoded] are reflected in `text`
    decoded: usize,
}

impl StreamingTextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the text decoded so far.
    pub fn append(&mut self, chunk: &[u8]) -> &str {
        self.bytes.extend_from_slice(chunk);
        self.decode_pending(false);
        &self.text
    }

    /// Decode whatever is still held back, replacing an incomplete tail with U+FFFD.
    /// Call once the transport has closed.
    pub fn finish(&mut self) -> &str {
        self.decode_pending(true);
        &self.text
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes received but not yet reflected in `text()`.
    pub fn pending(&self) -> usize {
        self.bytes.len() - self.decoded
    }

    fn decode_pending(&mut self, at_end: bool) {
        let mut rest = &self.bytes[self.decoded..];
        while !rest.is_empty() {
            match str::from_utf8(rest) {
                Ok(s) => {
                    self.text.push_str(s);
                    self.decoded += rest.len();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(s) = str::from_utf8(&rest[..valid]) {
                        self.text.push_str(s);
                    }
                    self.decoded += valid;
                    match e.error_len() {
                        Some(bad) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.decoded += bad;
                            rest = &self.bytes[self.decoded..];
                        }
                        None => {
                            // incomplete sequence at the tail
                            if at_end {
                                self.text.push(char::REPLACEMENT_CHARACTER);
                                self.decoded = self.bytes.len();
                            }
                            return;
                        }
                    }
                }
            }
        }
    }
}
