/// Maximum message length accepted by the Telegram Bot API
pub const MAX_CHUNK_LEN: usize = 4096;

/// Split `text` into ordered chunks of at most `max` characters.
///
/// Splits on character boundaries, so a multi-byte character is never cut.
/// Produces `ceil(chars / max)` chunks whose concatenation is `text`.
pub fn split_chunks(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == max {
            chunks.push(text[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }

    if count > 0 {
        chunks.push(text[start..].to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_single_chunk() {
        assert_eq!(split_chunks("hello", 10), vec!["hello"]);
    }

    #[test]
    fn test_exact_multiple() {
        let text = "a".repeat(8);
        let chunks = split_chunks(&text, 4);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_ceil_chunk_count() {
        let text = "x".repeat(MAX_CHUNK_LEN * 2 + 1);
        let chunks = split_chunks(&text, MAX_CHUNK_LEN);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_LEN));
        assert_eq!(chunks[2], "x");
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_multibyte_boundaries() {
        let text = "╭──╮ñé";
        let chunks = split_chunks(text, 4);
        assert_eq!(chunks, vec!["╭──╮", "ñé"]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(split_chunks("", 4).is_empty());
    }
}
