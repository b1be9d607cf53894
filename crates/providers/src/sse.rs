//! Server-sent event line framing.
//!
//! Network reads split frames anywhere, including inside a multi-byte UTF-8
//! character, so buffering happens on raw bytes and a line is only decoded
//! once its terminating newline has arrived.

/// A meaningful SSE line. Comments, blank lines and unknown fields are
/// dropped during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// `event:` name; informational only.
    Event(String),
    /// `data:` payload.
    Data(String),
}

/// Byte-level buffer turning arbitrary chunks into complete lines.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buf: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete line it finishes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseLine> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + pos;
            if let Some(line) = parse_line(&self.buf[start..end]) {
                lines.push(line);
            }
            start = end + 1;
        }
        self.buf.drain(..start);
        lines
    }

    /// Flush a trailing line the upstream never terminated.
    pub fn finish(&mut self) -> Option<SseLine> {
        let rest = std::mem::take(&mut self.buf);
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseLine> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.is_empty() || raw[0] == b':' {
        return None;
    }
    let line = String::from_utf8_lossy(raw);
    if let Some(data) = field_value(&line, "data:") {
        return Some(SseLine::Data(data.to_string()));
    }
    if let Some(name) = field_value(&line, "event:") {
        return Some(SseLine::Event(name.trim().to_string()));
    }
    tracing::trace!(line = %line, "Ignoring SSE field");
    None
}

/// Value after `field`, with at most one leading space removed.
fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    line.strip_prefix(field)
        .map(|v| v.strip_prefix(' ').unwrap_or(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_lines_are_parsed() {
        let mut buf = SseLineBuffer::new();
        let lines = buf.push(b"event: ping\ndata: {\"a\":1}\n\n: keep-alive\ndata:{\"b\":2}\r\n");
        assert_eq!(
            lines,
            vec![
                SseLine::Event("ping".into()),
                SseLine::Data("{\"a\":1}".into()),
                SseLine::Data("{\"b\":2}".into()),
            ]
        );
    }

    #[test]
    fn partial_line_waits_for_newline() {
        let mut buf = SseLineBuffer::new();
        assert!(buf.push(b"data: hel").is_empty());
        assert_eq!(buf.push(b"lo\n"), vec![SseLine::Data("hello".into())]);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let crab = "data: 🦀\n".as_bytes();
        let mut buf = SseLineBuffer::new();
        // split inside the four-byte crab
        assert!(buf.push(&crab[..8]).is_empty());
        assert_eq!(buf.push(&crab[8..]), vec![SseLine::Data("🦀".into())]);
    }

    #[test]
    fn unterminated_trailing_line_is_flushed() {
        let mut buf = SseLineBuffer::new();
        assert!(buf.push(b"data: [DONE]").is_empty());
        assert_eq!(buf.finish(), Some(SseLine::Data("[DONE]".into())));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn other_fields_ignored() {
        let mut buf = SseLineBuffer::new();
        assert!(buf.push(b"id: 7\nretry: 100\n").is_empty());
    }
}
