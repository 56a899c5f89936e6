/// Longest title, in characters, before it gets cut.
pub const TITLE_MAX_CHARS: usize = 50;

const ELLIPSIS: &str = "...";

/// Derive a conversation title from the first user message.
///
/// Counts `char`s rather than bytes so multi-byte text is never split.
pub fn truncate_title(text: &str) -> String {
    match text.char_indices().nth(TITLE_MAX_CHARS) {
        Some((boundary, _)) => format!("{}{}", &text[..boundary], ELLIPSIS),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_unchanged() {
        let text = "a".repeat(40);
        assert_eq!(truncate_title(&text), text);
    }

    #[test]
    fn test_exact_limit_unchanged() {
        let text = "b".repeat(TITLE_MAX_CHARS);
        assert_eq!(truncate_title(&text), text);
    }

    #[test]
    fn test_long_text_truncated() {
        let text = "x".repeat(60);
        let title = truncate_title(&text);
        assert_eq!(title, format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn test_multibyte_counts_chars() {
        let text = "你好".repeat(30);
        let title = truncate_title(&text);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
        assert!(title.starts_with(&"你好".repeat(25)));
        assert!(title.ends_with("..."));
    }
}
