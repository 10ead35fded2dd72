//! Incremental UTF-8 decoding for streamed response bodies.
//!
//! The transport delivers arbitrary byte chunks, so a multi-byte character can
//! be split across two reads. The decoder retains the trailing partial
//! sequence between calls instead of decoding each chunk independently.

/// Streaming UTF-8 decoder with carry-over of incomplete sequences.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    /// Bytes of an incomplete sequence from the previous chunk
    partial: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, prepending any carried-over bytes. Invalid sequences
    /// are replaced with U+FFFD; an incomplete trailing sequence is held back
    /// for the next call.
    pub fn decode(&mut self, input: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.partial);
        bytes.extend_from_slice(input);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;

        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or(""));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete trailing sequence: carry it over.
                            self.partial = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush at end of stream. A dangling partial sequence decodes to U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.partial.is_empty() {
            String::new()
        } else {
            self.partial.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn ascii_passes_through() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"Hi"), "Hi");
        assert_eq!(decoder.decode(b" there"), " there");
        assert_eq!(decoder.finish(), "");
    }

    #[rstest]
    #[case("héllo wörld")]
    #[case("日本語のテキスト")]
    #[case("emoji 🦀🚀 mix")]
    #[case("àβçδê")]
    fn every_split_point_reassembles(#[case] text: &str) {
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = Utf8StreamDecoder::new();
            let mut out = decoder.decode(&bytes[..split]);
            out.push_str(&decoder.decode(&bytes[split..]));
            out.push_str(&decoder.finish());
            assert_eq!(out, text, "split at byte {split}");
        }
    }

    #[test]
    fn four_byte_char_split_three_ways() {
        let crab = "🦀".as_bytes(); // 4 bytes
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&crab[..1]), "");
        assert_eq!(decoder.decode(&crab[1..3]), "");
        assert_eq!(decoder.decode(&crab[3..]), "🦀");
    }

    #[test]
    fn invalid_bytes_become_replacement_chars() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"ok\xff\xfeok"), "ok\u{fffd}\u{fffd}ok");
    }

    #[test]
    fn truncated_stream_flushes_replacement() {
        let mut decoder = Utf8StreamDecoder::new();
        let e_acute = "é".as_bytes();
        assert_eq!(decoder.decode(&e_acute[..1]), "");
        assert_eq!(decoder.finish(), "\u{fffd}");
        // Decoder is reusable after finish.
        assert_eq!(decoder.decode(b"next"), "next");
    }
}
