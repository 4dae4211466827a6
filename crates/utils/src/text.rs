/// Truncate to at most `max` characters, appending an ellipsis when cut.
///
/// Counts chars, not bytes, so multibyte input never splits a codepoint.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// Collapse internal whitespace runs to single spaces and trim the ends.
/// Used before embedding user-entered text into prompts and emails.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
