//! CLI parsing helpers for clap value parsers.

/// Parse a target or configuration name.
///
/// Names are trimmed; empty names are rejected so a missing selection is
/// reported up front instead of as an unknown target.
pub(super) fn parse_name(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("name must not be empty".to_owned());
    }
    Ok(trimmed.to_owned())
}
