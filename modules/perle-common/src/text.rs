//! Text helpers shared by the ingestion adapters and the studio.

use sha2::{Digest, Sha256};

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased, whitespace-collapsed form used for identity hashing.
pub fn normalize_for_identity(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}

/// Hex SHA-256 of the normalized text. Two snippets that differ only in
/// case or spacing hash the same.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(normalize_for_identity(text).as_bytes());
    hex::encode(digest)
}

/// Number of letters and digits in `text`.
pub fn meaningful_len(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphanumeric()).count()
}

/// Cut `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Emoji, pictographs, dingbats and the invisible joiners that glue them
/// together. None of these survive a TTS engine or a plain font.
fn is_decorative(c: char) -> bool {
    matches!(c as u32,
        0x1F000..=0x1FAFF   // emoji, pictographs, playing cards, flags
        | 0x2600..=0x27BF   // misc symbols, dingbats
        | 0x2B00..=0x2BFF   // arrows, stars
        | 0x2190..=0x21FF   // arrows
        | 0x25A0..=0x25FF   // geometric shapes
        | 0x2022 | 0x2023 | 0x2043 // bullets
        | 0xFE00..=0xFE0F   // variation selectors
        | 0x200B..=0x200D   // zero-width space / joiners
        | 0x20E3            // combining keycap
        | 0xE0020..=0xE007F // tag characters
    ) || matches!(c, '*' | '~' | '|' | '_' | '#' | '^')
}

/// Strip decorative symbols and normalize spacing so the text can be spoken
/// or drawn.
pub fn sanitize(text: &str) -> String {
    let stripped: String = text
        .chars()
        .map(|c| if is_decorative(c) { ' ' } else { c })
        .collect();
    collapse_whitespace(&stripped)
}
