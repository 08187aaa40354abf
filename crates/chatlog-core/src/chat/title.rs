//! Session title normalization and the message-derived fallback title.
//!
//! Titles are shown in a narrow sidebar, so they are capped at
//! [`TITLE_MAX_CHARS`] characters. The cap is counted in `char`s, not bytes,
//! so multi-byte scripts are cut on character boundaries.

/// Soft display cap for session titles.
pub const TITLE_MAX_CHARS: usize = 15;

/// Title used when there is nothing to derive one from.
pub const DEFAULT_TITLE: &str = "New chat";

/// A word boundary is only honoured if at least this many characters survive.
const MIN_KEPT_BEFORE_SPACE: usize = 10;

const ELLIPSIS: &str = "...";

/// Clean up a generated title: strip surrounding quotes, collapse
/// whitespace, and cap the length.
///
/// Returns `None` when nothing usable is left.
pub fn normalize_title(raw: &str) -> Option<String> {
    let stripped = raw
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim();
    let cleaned = collapse_whitespace(stripped);
    if cleaned.is_empty() {
        return None;
    }

    let chars: Vec<char> = cleaned.chars().collect();
    if chars.len() <= TITLE_MAX_CHARS {
        return Some(cleaned);
    }

    let mut kept = &chars[..TITLE_MAX_CHARS];
    if let Some(space) = kept.iter().rposition(|c| *c == ' ') {
        if space > MIN_KEPT_BEFORE_SPACE {
            kept = &kept[..space];
        }
    }

    let mut title: String = kept.iter().collect();
    title.push_str(ELLIPSIS);
    Some(title)
}

/// Derive a title directly from the user's message.
///
/// Used when no title generator is available or it fails. The result never
/// exceeds `max_chars`; the ellipsis is only appended when it fits.
pub fn fallback_title(message: &str, max_chars: usize) -> String {
    let cleaned = collapse_whitespace(message.trim());
    if cleaned.is_empty() {
        return DEFAULT_TITLE.to_string();
    }

    let chars: Vec<char> = cleaned.chars().collect();
    if chars.len() <= max_chars {
        return cleaned;
    }

    let mut kept = &chars[..max_chars];
    if let Some(space) = kept.iter().rposition(|c| *c == ' ') {
        if space > max_chars / 2 {
            kept = &kept[..space];
        }
    }

    let mut title: String = kept.iter().collect();
    if kept.len() + ELLIPSIS.len() <= max_chars {
        title.push_str(ELLIPSIS);
    }
    title
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_quotes() {
        assert_eq!(normalize_title("  \"Rust lifetimes\"  ").as_deref(), Some("Rust lifetimes"));
        assert_eq!(normalize_title("'Trip plan'").as_deref(), Some("Trip plan"));
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_title("Trip\n\n  plan").as_deref(), Some("Trip plan"));
    }

    #[test]
    fn test_normalize_empty_is_none() {
        assert_eq!(normalize_title("   "), None);
        assert_eq!(normalize_title("\"\""), None);
    }

    #[test]
    fn test_normalize_cuts_at_late_word_boundary() {
        // 15-char prefix "Debugging Rust " has its last space at index 14.
        let title = normalize_title("Debugging Rust lifetime errors").unwrap();
        assert_eq!(title, "Debugging Rust...");
    }

    #[test]
    fn test_normalize_hard_cut_when_space_is_early() {
        // Last space within the first 15 chars is at index 3, too early to honour.
        let title = normalize_title("The quickbrownfoxjumps").unwrap();
        assert_eq!(title, "The quickbrownf...");
    }

    #[test]
    fn test_normalize_counts_chars_not_bytes() {
        let title = normalize_title("東京への週末旅行の計画を立てるための相談").unwrap();
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + ELLIPSIS.len());
        assert!(title.starts_with("東京への週末旅行の計画を立てる"));
    }

    #[test]
    fn test_fallback_short_message_kept() {
        assert_eq!(fallback_title("  hello   there ", 15), "hello there");
    }

    #[test]
    fn test_fallback_empty_message() {
        assert_eq!(fallback_title(" \n ", 15), DEFAULT_TITLE);
    }

    #[test]
    fn test_fallback_cuts_at_word_and_adds_ellipsis() {
        // Prefix "How do I write " -> last space at 14 -> "How do I write" (14 chars),
        // 14 + 3 > 15, so no ellipsis.
        assert_eq!(fallback_title("How do I write a parser", 15), "How do I write");
        // Prefix "Tell me a story" has its last space at 9 -> "Tell me a" (9 chars) + "..."
        assert_eq!(fallback_title("Tell me a storyline please", 15), "Tell me a...");
    }

    #[test]
    fn test_fallback_never_exceeds_cap() {
        let title = fallback_title("abcdefghijklmnopqrstuvwxyz", 15);
        assert_eq!(title, "abcdefghijklmno");
        assert!(title.chars().count() <= 15);
    }
}
