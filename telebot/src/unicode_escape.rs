//! Decodes `\uXXXX` escapes the upstream platform's wire encoding uses for
//! non-ASCII text, in both webhook request bodies and upstream HTTP response
//! bodies: a plain byte scan for the four-hex-digit escape, decoding
//! surrogate pairs back into a single code point where present.

/// Decode every `\uXXXX` escape in `bytes` (ASCII bytes containing literal
/// backslash-u escapes, as produced by the upstream's JSON encoder) into the
/// UTF-8 bytes of the escaped code point. Bytes that aren't part of a
/// recognized escape pass through unchanged, including a lone `\u` with
/// fewer than four following hex digits.
#[must_use]
pub fn decode_unicode_escapes(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'u') {
            if let Some(high) = parse_hex4(bytes, i + 2) {
                if (0xD800..=0xDBFF).contains(&high) {
                    // High surrogate: look for a trailing \uXXXX low surrogate.
                    if bytes.get(i + 6) == Some(&b'\\') && bytes.get(i + 7) == Some(&b'u') {
                        if let Some(low) = parse_hex4(bytes, i + 8) {
                            if (0xDC00..=0xDFFF).contains(&low) {
                                let code = 0x10000
                                    + (u32::from(high) - 0xD800) * 0x400
                                    + (u32::from(low) - 0xDC00);
                                if let Some(c) = char::from_u32(code) {
                                    let mut buf = [0u8; 4];
                                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                                    i += 12;
                                    continue;
                                }
                            }
                        }
                    }
                    // Unpaired surrogate: emit the replacement character
                    // rather than invalid UTF-8.
                    out.extend_from_slice("\u{FFFD}".as_bytes());
                    i += 6;
                    continue;
                }

                if let Some(c) = char::from_u32(u32::from(high)) {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    i += 6;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    out
}

/// Parse the four ASCII hex digits starting at `pos`, if present.
fn parse_hex4(bytes: &[u8], pos: usize) -> Option<u16> {
    let digits = bytes.get(pos..pos + 4)?;
    let s = std::str::from_utf8(digits).ok()?;
    u16::from_str_radix(s, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_plain_ascii() {
        let out = decode_unicode_escapes(b"hello world");
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn decodes_bmp_escape() {
        // с is cyrillic 'с', wire-encoded as a literal backslash-u escape.
        let out = decode_unicode_escapes(br"\u0441");
        assert_eq!(String::from_utf8(out).unwrap(), "\u{0441}");
    }

    #[test]
    fn decodes_surrogate_pair() {
        // U+1F600 GRINNING FACE, wire-encoded as its surrogate pair D83D DE00.
        let out = decode_unicode_escapes(br"\ud83d\ude00");
        assert_eq!(String::from_utf8(out).unwrap(), "\u{1F600}");
    }

    #[test]
    fn leaves_malformed_escape_untouched() {
        let out = decode_unicode_escapes(br"\uZZZZ");
        assert_eq!(out, br"\uZZZZ");
    }

    #[test]
    fn unpaired_high_surrogate_becomes_replacement_character() {
        let out = decode_unicode_escapes(br"\ud83dx");
        assert_eq!(String::from_utf8(out).unwrap(), "\u{FFFD}x");
    }
}
