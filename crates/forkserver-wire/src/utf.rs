//! Modified UTF-8, the encoding used for names on the wire.
//!
//! Differences from standard UTF-8:
//! - U+0000 is encoded as the two bytes `C0 80`
//! - supplementary characters are encoded as two 3-byte surrogates
//!
//! On the wire the bytes are prefixed with their count as a big-endian `u16`.

use crate::error::{Result, WireError};

/// Maximum number of encoded bytes a name may occupy.
pub const MAX_UTF_LEN: usize = u16::MAX as usize;

/// Encode a string as modified UTF-8 (without the length prefix).
pub fn encode_modified_utf8(s: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }

    if out.len() > MAX_UTF_LEN {
        return Err(WireError::StringTooLong {
            len: out.len(),
            max: MAX_UTF_LEN,
        });
    }
    Ok(out)
}

/// Decode modified UTF-8 bytes (without the length prefix).
///
/// Unpaired surrogates are rejected since they cannot form a `String`.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let a = bytes[i];
        if a & 0x80 == 0 {
            units.push(a as u16);
            i += 1;
        } else if a & 0xE0 == 0xC0 {
            let b = continuation(bytes, i + 1)?;
            units.push(((a as u16 & 0x1F) << 6) | b);
            i += 2;
        } else if a & 0xF0 == 0xE0 {
            let b = continuation(bytes, i + 1)?;
            let c = continuation(bytes, i + 2)?;
            units.push(((a as u16 & 0x0F) << 12) | (b << 6) | c);
            i += 3;
        } else {
            return Err(WireError::MalformedUtf { offset: i });
        }
    }

    String::from_utf16(&units).map_err(|_| WireError::MalformedUtf { offset: bytes.len() })
}

fn continuation(bytes: &[u8], offset: usize) -> Result<u16> {
    match bytes.get(offset) {
        Some(&b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        _ => Err(WireError::MalformedUtf { offset }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_unchanged() {
        let encoded = encode_modified_utf8("org/example/Foo.class").unwrap();
        assert_eq!(encoded, b"org/example/Foo.class");
    }

    #[test]
    fn nul_uses_two_bytes() {
        let encoded = encode_modified_utf8("a\0b").unwrap();
        assert_eq!(encoded, vec![b'a', 0xC0, 0x80, b'b']);
        assert_eq!(decode_modified_utf8(&encoded).unwrap(), "a\0b");
    }

    #[test]
    fn supplementary_characters_use_surrogate_pairs() {
        let encoded = encode_modified_utf8("\u{1F600}").unwrap();
        assert_eq!(encoded, vec![0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]);
        assert_eq!(decode_modified_utf8(&encoded).unwrap(), "\u{1F600}");
    }

    #[test]
    fn two_and_three_byte_forms_decode() {
        let text = "caf\u{E9}/\u{4E2D}\u{6587}.txt";
        let encoded = encode_modified_utf8(text).unwrap();
        assert_eq!(encoded.len(), 3 + 2 + 1 + 6 + 4);
        assert_eq!(decode_modified_utf8(&encoded).unwrap(), text);
    }

    #[test]
    fn too_long_string_is_rejected() {
        let name = "x".repeat(MAX_UTF_LEN + 1);
        let err = encode_modified_utf8(&name).unwrap_err();
        assert!(matches!(err, WireError::StringTooLong { .. }));
    }

    #[test]
    fn truncated_sequence_is_rejected() {
        let err = decode_modified_utf8(&[b'a', 0xE4, 0xB8]).unwrap_err();
        assert!(matches!(err, WireError::MalformedUtf { offset: 3 }));
    }

    #[test]
    fn invalid_lead_byte_is_rejected() {
        let err = decode_modified_utf8(&[0xF0, 0x9F, 0x98, 0x80]).unwrap_err();
        assert!(matches!(err, WireError::MalformedUtf { offset: 0 }));
    }

    #[test]
    fn unpaired_surrogate_is_rejected() {
        let err = decode_modified_utf8(&[0xED, 0xA0, 0xBD]).unwrap_err();
        assert!(matches!(err, WireError::MalformedUtf { .. }));
    }
}
