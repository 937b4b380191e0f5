//! Incremental Server-Sent Events decoding

/// Splits a byte stream into SSE `data:` payloads
///
/// Network chunks may end mid-line or mid-character; incomplete input is
/// buffered until its newline arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `bytes` and returns the payloads of every completed `data:` line
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);

            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
        }

        payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: {\"a\":1}\n\ndata: {\"a\":2}\n\n");

        assert_eq!(payloads, vec![r#"{"a":1}"#, r#"{"a":2}"#]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.push(b"data: {\"content\":\"ol").is_empty());
        assert_eq!(decoder.push(b"a\"}\r\n"), vec![r#"{"content":"ola"}"#]);
    }

    #[test]
    fn test_multibyte_character_split() {
        let mut decoder = SseDecoder::new();
        let text = "data: año\n".as_bytes();
        let (head, tail) = text.split_at(8);

        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), vec!["año"]);
    }

    #[test]
    fn test_ignores_comments_and_other_fields() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b": keep-alive\nevent: message\ndata: [DONE]\n");

        assert_eq!(payloads, vec!["[DONE]"]);
    }
}
