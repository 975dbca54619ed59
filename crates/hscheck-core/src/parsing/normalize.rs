/// Case-insensitive substring test used for every marker phrase.
pub fn contains_marker(text: &str, marker: &str) -> bool {
    text.to_lowercase().contains(&marker.to_lowercase())
}

/// Byte offset of `marker` in `text`, ignoring ASCII case.
///
/// ASCII lowercasing keeps byte offsets stable, so the result can slice the
/// original text.
pub fn find_marker(text: &str, marker: &str) -> Option<usize> {
    text.to_ascii_lowercase()
        .find(&marker.to_ascii_lowercase())
}

/// Normalize free text from descriptions and customer names.
///
/// 1. Full-width parentheses become ASCII
/// 2. Spaces around parentheses are removed
///
/// "VALVE （THERMAL）" -> "VALVE(THERMAL)"
pub fn clean_text(text: &str) -> String {
    text.replace('（', "(")
        .replace('）', ")")
        .replace(" (", "(")
        .replace("( ", "(")
        .replace(" )", ")")
        .replace(") ", ")")
}

/// Join the words of one table cell and undo a renderer's mid-token wrap.
///
/// When the joined text is exactly two tokens made only of ASCII letters and
/// digits, the separating space is an artifact and is removed
/// ("D01ACMP 0012759" -> "D01ACMP0012759").
pub fn normalize_cell_text(words: &[&str]) -> String {
    let joined = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let tokens: Vec<&str> = joined.split(' ').collect();
    if tokens.len() == 2
        && tokens
            .iter()
            .all(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        return tokens.concat();
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_parentheses() {
        assert_eq!(clean_text("VALVE （THERMAL）"), "VALVE(THERMAL)");
        assert_eq!(clean_text("AIFI ( GOODMAN ) LTD"), "AIFI(GOODMAN)LTD");
        assert_eq!(clean_text("PLAIN"), "PLAIN");
    }

    #[test]
    fn test_find_marker_ignores_case() {
        assert_eq!(find_marker("Goods H.S Code: 8481", "h.s code:"), Some(6));
        assert_eq!(find_marker("nothing here", "h.s code:"), None);
        assert!(contains_marker("SUB TOTAL", "sub total"));
    }

    #[test]
    fn test_normalize_cell_text_rejoins_wrapped_code() {
        assert_eq!(normalize_cell_text(&["D01ACMP", "0012759"]), "D01ACMP0012759");
        // Punctuation means a real phrase, not a wrapped token.
        assert_eq!(normalize_cell_text(&["AIFI", "(GOODMAN)"]), "AIFI (GOODMAN)");
        assert_eq!(normalize_cell_text(&["ACME", "TRADING", "CO"]), "ACME TRADING CO");
        assert_eq!(normalize_cell_text(&["1,200"]), "1,200");
        assert_eq!(normalize_cell_text(&[]), "");
    }
}
