//! Incremental UTF-8 decoding for pipe reads.
//!
//! A read can end in the middle of a multi-byte sequence, so the tail of one
//! read is carried over to the next. Bytes that can never form valid UTF-8
//! are handed back as [`Decoded::Invalid`] instead of being replaced, so the
//! caller can show them to the user.

/// One piece of decoded output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Text(String),
    Invalid(Vec<u8>),
}

/// Streaming decoder state for a single pipe.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    /// Incomplete sequence left over from the previous read (at most 3 bytes)
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next read. Returns pieces in stream order.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<Decoded> {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = Vec::new();
        let mut rest: &[u8] = &input;
        let mut text = String::new();

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // valid_up_to() marks a prefix that already passed validation
                    text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            if !text.is_empty() {
                                out.push(Decoded::Text(std::mem::take(&mut text)));
                            }
                            let (bad, tail) = after.split_at(len);
                            push_invalid(&mut out, bad);
                            rest = tail;
                        }
                        None => {
                            // Truncated sequence at the end: wait for more bytes
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        if !text.is_empty() {
            out.push(Decoded::Text(text));
        }
        out
    }

    /// Flush at end of stream. A sequence that never completed is invalid.
    pub fn finish(&mut self) -> Option<Decoded> {
        if self.pending.is_empty() {
            None
        } else {
            Some(Decoded::Invalid(std::mem::take(&mut self.pending)))
        }
    }
}

/// Adjacent invalid runs are merged into one piece.
fn push_invalid(out: &mut Vec<Decoded>, bad: &[u8]) {
    if let Some(Decoded::Invalid(prev)) = out.last_mut() {
        prev.extend_from_slice(bad);
    } else {
        out.push(Decoded::Invalid(bad.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Decoded {
        Decoded::Text(s.to_string())
    }

    #[test]
    fn test_plain_ascii() {
        let mut d = Utf8StreamDecoder::new();
        assert_eq!(d.decode(b"hello\n"), vec![text("hello\n")]);
        assert_eq!(d.finish(), None);
    }

    #[test]
    fn test_empty_read_yields_nothing() {
        let mut d = Utf8StreamDecoder::new();
        assert!(d.decode(b"").is_empty());
    }

    #[test]
    fn test_multibyte_split_across_reads() {
        let bytes = "héllo".as_bytes();
        // 'é' is 0xc3 0xa9; split between them
        let mut d = Utf8StreamDecoder::new();
        assert_eq!(d.decode(&bytes[..2]), vec![text("h")]);
        assert_eq!(d.decode(&bytes[2..]), vec![text("éllo")]);
        assert_eq!(d.finish(), None);
    }

    #[test]
    fn test_invalid_bytes_are_reported_not_dropped() {
        let mut d = Utf8StreamDecoder::new();
        let out = d.decode(b"ab\xff\xfecd");
        assert_eq!(
            out,
            vec![text("ab"), Decoded::Invalid(vec![0xff, 0xfe]), text("cd")]
        );
    }

    #[test]
    fn test_incomplete_sequence_at_eof_is_invalid() {
        let mut d = Utf8StreamDecoder::new();
        assert_eq!(d.decode(b"ok\xe2\x82"), vec![text("ok")]);
        assert_eq!(d.finish(), Some(Decoded::Invalid(vec![0xe2, 0x82])));
        assert_eq!(d.finish(), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any split of a valid stream decodes back to the original text
            #[test]
            fn split_points_do_not_change_text(s in "\\PC{0,40}", cut in 0usize..200) {
                let bytes = s.as_bytes();
                let cut = cut.min(bytes.len());
                let mut d = Utf8StreamDecoder::new();
                let mut joined = String::new();
                for piece in d.decode(&bytes[..cut]).into_iter().chain(d.decode(&bytes[cut..])) {
                    match piece {
                        Decoded::Text(t) => joined.push_str(&t),
                        Decoded::Invalid(b) => prop_assert!(false, "unexpected invalid {:?}", b),
                    }
                }
                prop_assert_eq!(d.finish(), None);
                prop_assert_eq!(joined, s);
            }

            /// Every input byte shows up either as text or as an invalid byte
            #[test]
            fn no_bytes_are_lost(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
                let mut d = Utf8StreamDecoder::new();
                let mut total = 0usize;
                for piece in d.decode(&bytes).into_iter().chain(d.finish()) {
                    total += match piece {
                        Decoded::Text(t) => t.len(),
                        Decoded::Invalid(b) => b.len(),
                    };
                }
                prop_assert_eq!(total, bytes.len());
            }
        }
    }
}
