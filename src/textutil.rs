//! Unicode-safe truncation (spec.md §9): byte-slicing would split a
//! multi-byte grapheme cluster in half, so every truncation in this crate
//! goes through grapheme boundaries instead.

use unicode_segmentation::UnicodeSegmentation;

pub fn truncate_unicode(input: &str, max: usize) -> String {
    let graphemes: Vec<&str> = input.graphemes(true).collect();
    if graphemes.len() <= max {
        input.to_string()
    } else {
        graphemes[..max].concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_string_is_unchanged() {
        assert_eq!(truncate_unicode("hello", 255), "hello");
    }

    #[test]
    fn truncates_long_ascii_to_exact_grapheme_count() {
        let input = "x".repeat(300);
        assert_eq!(truncate_unicode(&input, 255).chars().count(), 255);
    }

    #[test]
    fn truncates_on_grapheme_boundary() {
        let input = "caf\u{e9} au lait";
        let truncated = truncate_unicode(input, 4);
        assert_eq!(truncated, "caf\u{e9}");
    }
}
