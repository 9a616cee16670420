//! Text normalization helpers for header-bound fields

/// Collapse a multi-line value into a single line.
///
/// Each line is trimmed, blank lines are dropped, and the remaining
/// lines are joined with a single space. Address and subject fields
/// must never carry line breaks into an outgoing header.
pub fn trim_string(field: &str) -> String {
    field
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shorten a string to at most `max_chars` characters.
///
/// Strings over the limit are cut to `max_chars - 3` characters and
/// suffixed with "...", so the result is exactly `max_chars` long.
/// Counts characters, not bytes.
pub fn truncate_with_ellipsis(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    let mut truncated: String = value.chars().take(max_chars.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}
