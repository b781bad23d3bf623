//! Wiki-link helpers for linked-note references.
//!
//! Linked notes may be stored either as plain text or bracketed
//! (`[[Note name]]`); these helpers convert between the two and derive
//! safe file names from link text.

/// Whether the text contains a `[[...]]` wiki link.
pub fn is_wiki_link(text: &str) -> bool {
    match (text.find("[["), text.rfind("]]")) {
        (Some(open), Some(close)) => close > open + 1,
        _ => false,
    }
}

/// Extract the note name from a wiki link, or return the trimmed text
/// unchanged when it is not bracketed.
pub fn note_name(text: &str) -> &str {
    if let (Some(open), Some(close)) = (text.find("[["), text.rfind("]]")) {
        if close > open + 1 {
            return text[open + 2..close].trim();
        }
    }
    text.trim()
}

/// Bracket plain text as a wiki link; already-bracketed text is returned
/// as-is.
pub fn to_wiki_link(text: &str) -> String {
    if text.is_empty() || is_wiki_link(text) {
        text.to_string()
    } else {
        format!("[[{}]]", text.trim())
    }
}

/// Strip characters that are not allowed in file names and collapse runs
/// of whitespace.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_and_extracts_links() {
        assert!(is_wiki_link("[[Project plan]]"));
        assert!(!is_wiki_link("Project plan"));
        assert!(!is_wiki_link("[[]]"));
        assert_eq!(note_name("[[ Project plan ]]"), "Project plan");
        assert_eq!(note_name("  plain text "), "plain text");
    }

    #[test]
    fn bracketing_is_idempotent() {
        assert_eq!(to_wiki_link("note"), "[[note]]");
        assert_eq!(to_wiki_link("[[note]]"), "[[note]]");
        assert_eq!(to_wiki_link(""), "");
    }

    #[test]
    fn sanitizes_forbidden_characters() {
        assert_eq!(sanitize_file_name("a/b:c*d?e"), "abcde");
        assert_eq!(sanitize_file_name("  spaced   out  "), "spaced out");
    }
}
