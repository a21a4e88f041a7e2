//! Pull a JSON object out of free-form model output.

/// Locate the JSON object in a completion.
///
/// Tries, in order: the whole output, the first fenced code block, and the
/// outermost `{ .. }` span. `None` means the output holds no object at all,
/// which the classifier reports to the model when it asks for a repair.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        return Some(trimmed);
    }

    if let Some(body) = fenced_body(trimmed)
        && body.starts_with('{')
    {
        return Some(body);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// Body of the first ``` fence, with any language tag dropped.
fn fenced_body(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let rest = &text[open + 3..];
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let close = rest.find("```")?;
    Some(rest[..close].trim())
}
