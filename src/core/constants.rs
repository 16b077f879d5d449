//! Constants shared across the answer-sheet pipeline.

/// Number of questions on the supported answer-sheet format.
///
/// This is the fixed question domain: question indices are always in
/// `1..=QUESTION_COUNT` and every inference produces exactly this many slots.
pub const QUESTION_COUNT: usize = 40;

/// Number of choices per question (A-D).
pub const CHOICE_COUNT: usize = 4;

/// Glyphs that OCR reports for a hand-drawn cross, compared after uppercasing.
pub const CROSS_GLYPHS: [char; 4] = ['X', '×', '✗', '✕'];

/// Returns true when `text` contains the letter X, in either case, or a cross glyph.
pub fn contains_cross(text: &str) -> bool {
    text.chars()
        .any(|c| CROSS_GLYPHS.contains(&c.to_ascii_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_cross() {
        assert!(contains_cross("X"));
        assert!(contains_cross("x"));
        assert!(contains_cross("A ×"));
        assert!(contains_cross("✗"));
        assert!(!contains_cross("ABCD"));
        assert!(!contains_cross(""));
    }
}
