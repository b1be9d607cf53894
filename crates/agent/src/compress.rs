//! Tool-result compression: keep the head and tail of oversized output.

/// Truncate `content` to about `max_chars` characters, keeping the first and
/// last halves around an omission marker. Shorter content is unchanged.
pub fn compress_tool_result(content: &str, max_chars: usize) -> String {
    let total = content.chars().count();
    if total <= max_chars {
        return content.to_string();
    }
    let head_chars = max_chars / 2;
    let tail_chars = max_chars - head_chars;
    let omitted = total - head_chars - tail_chars;

    let head_end = content
        .char_indices()
        .nth(head_chars)
        .map(|(i, _)| i)
        .unwrap_or(content.len());
    let tail_start = content
        .char_indices()
        .nth(total - tail_chars)
        .map(|(i, _)| i)
        .unwrap_or(content.len());

    format!(
        "{}\n[... {omitted} characters omitted ...]\n{}",
        &content[..head_end],
        &content[tail_start..]
    )
}
