//! Small text helpers shared by the tools.

/// Largest char boundary `<= index`.
pub(crate) fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// A NUL byte in the first 8 KiB marks a file as binary.
pub(crate) fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(8192).any(|b| *b == 0)
}

/// Cut `s` to at most `max_chars` characters, appending a notice when cut.
pub(crate) fn cap_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\n[truncated at {max_chars} characters]", &s[..idx]),
        None => s.to_string(),
    }
}
