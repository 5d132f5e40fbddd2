//! On-chain metadata entries (CIP-25/CIP-20 style key-value label 721/674)
//! are bounded to 64 bytes per string; longer values are split into chunks.

pub const METADATA_CHUNK_SIZE: usize = 64;

/// Split a UTF-8 string longer than 64 bytes into 64-byte chunks. Splitting
/// happens on byte boundaries that land on UTF-8 char boundaries, so no
/// chunk ends mid-codepoint.
pub fn string_to_metadata(s: &str) -> Vec<String> {
    if s.len() <= METADATA_CHUNK_SIZE {
        return vec![s.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < s.len() {
        let mut end = (start + METADATA_CHUNK_SIZE).min(s.len());
        while end > start && !s.is_char_boundary(end) {
            end -= 1;
        }
        chunks.push(s[start..end].to_string());
        start = end;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_string_is_a_single_chunk() {
        let chunks = string_to_metadata("short");
        assert_eq!(chunks, vec!["short".to_string()]);
    }

    #[test]
    fn exactly_64_bytes_is_a_single_chunk() {
        let s = "a".repeat(64);
        let chunks = string_to_metadata(&s);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 64);
    }

    #[test]
    fn long_string_splits_into_64_byte_chunks() {
        let s = "a".repeat(130);
        let chunks = string_to_metadata(&s);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 64);
        assert_eq!(chunks[1].len(), 64);
        assert_eq!(chunks[2].len(), 2);
        assert_eq!(chunks.concat(), s);
    }

    #[test]
    fn split_never_breaks_a_utf8_codepoint() {
        // 3-byte-per-char string, 64 is not a multiple of 3.
        let s = "\u{20AC}".repeat(30); // euro sign, 3 bytes each, 90 bytes total
        let chunks = string_to_metadata(&s);
        for chunk in &chunks {
            assert!(std::str::from_utf8(chunk.as_bytes()).is_ok());
        }
        assert_eq!(chunks.concat(), s);
    }
}
