/// Trims the reply and removes one optional markdown fence.
///
/// Only a leading "```json" (or bare "```") and a trailing "```" are removed. Nothing in the
/// middle of the text is touched, so fenced blocks nested inside a reply survive.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}
