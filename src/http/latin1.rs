//! 8-bit-clean conversion between header bytes and text.
//!
//! Header bytes are not guaranteed to be UTF-8. Mapping every byte to the
//! code point of the same value makes decode followed by encode exact.

/// Decode bytes as ISO-8859-1.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode text as ISO-8859-1. Characters outside the range become `?`.
pub fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_bytes_survive_retransmission() {
        let raw: Vec<u8> = (0u8..=255).collect();
        assert_eq!(encode(&decode(&raw)), raw);
    }

    #[test]
    fn wide_characters_are_replaced() {
        assert_eq!(encode("a\u{263a}b"), b"a?b");
    }
}
