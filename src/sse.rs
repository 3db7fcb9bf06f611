use serde::Deserialize;

use crate::models::StreamEvent;

const DONE_SENTINEL: &str = "[DONE]";

/// Wire shape of one `data:` payload, as emitted by the backend.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Thinking {
        #[serde(default)]
        content: String,
    },
    Text {
        #[serde(default)]
        content: String,
    },
    Status {
        #[serde(default)]
        message: String,
    },
    ToolCall {
        #[serde(default)]
        tool_name: String,
        #[serde(default)]
        tool_input: String,
    },
    Complete {
        content: Option<String>,
        session_id: Option<String>,
    },
    Error {
        #[serde(default)]
        error: String,
    },
}

impl From<WireEvent> for StreamEvent {
    fn from(wire: WireEvent) -> Self {
        match wire {
            WireEvent::Thinking { content } => StreamEvent::Reasoning(content),
            WireEvent::Text { content } => StreamEvent::Answer(content),
            WireEvent::Status { message } => StreamEvent::Status(message),
            WireEvent::ToolCall {
                tool_name,
                tool_input,
            } => StreamEvent::ToolCall {
                name: tool_name,
                input: tool_input,
            },
            WireEvent::Complete {
                content,
                session_id,
            } => StreamEvent::Complete {
                content,
                session_id,
            },
            WireEvent::Error { error } => StreamEvent::Error(error),
        }
    }
}

/// Incremental decoder for the newline-delimited `data: <JSON>` stream.
/// Transport chunks cut anywhere, including mid-line and mid-UTF-8-sequence,
/// so bytes buffer until a full line is available. A malformed payload is
/// dropped and decoding continues with the next line.
#[derive(Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one transport chunk and returns every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = decode_line(line.trim_end()) {
                events.push(event);
            }
        }
        events
    }
}

fn decode_line(line: &str) -> Option<StreamEvent> {
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() || payload == DONE_SENTINEL {
        return None;
    }

    match serde_json::from_str::<WireEvent>(payload) {
        Ok(wire) => Some(wire.into()),
        Err(err) => {
            tracing::debug!("dropping malformed stream payload: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut SseDecoder, input: &str) -> Vec<StreamEvent> {
        decoder.push(input.as_bytes())
    }

    #[test]
    fn decodes_each_event_type() {
        let mut decoder = SseDecoder::new();
        let events = decode_all(
            &mut decoder,
            concat!(
                "data: {\"type\": \"status\", \"message\": \"Processing PDF...\"}\n",
                "data: {\"type\": \"thinking\", \"content\": \"checking page 2\"}\n",
                "data: {\"type\": \"text\", \"content\": \"Net sales\"}\n",
                "data: {\"type\": \"tool_call\", \"tool_name\": \"Read\", \"tool_input\": \"{}\"}\n",
                "data: {\"type\": \"complete\", \"content\": \"done\", \"session_id\": \"s1\"}\n",
                "data: {\"type\": \"error\", \"error\": \"boom\"}\n",
            ),
        );

        assert_eq!(events.len(), 6);
        assert_eq!(events[0], StreamEvent::Status("Processing PDF...".to_string()));
        assert_eq!(events[1], StreamEvent::Reasoning("checking page 2".to_string()));
        assert_eq!(events[2], StreamEvent::Answer("Net sales".to_string()));
        assert_eq!(
            events[3],
            StreamEvent::ToolCall {
                name: "Read".to_string(),
                input: "{}".to_string()
            }
        );
        assert_eq!(
            events[4],
            StreamEvent::Complete {
                content: Some("done".to_string()),
                session_id: Some("s1".to_string())
            }
        );
        assert_eq!(events[5], StreamEvent::Error("boom".to_string()));
    }

    #[test]
    fn line_split_across_chunks_yields_exactly_one_event() {
        let mut decoder = SseDecoder::new();
        let line = "data: {\"type\": \"text\", \"content\": \"split right here\"}\n";
        let (head, tail) = line.as_bytes().split_at(23);

        assert!(decoder.push(head).is_empty());
        let events = decoder.push(tail);
        assert_eq!(
            events,
            vec![StreamEvent::Answer("split right here".to_string())]
        );
    }

    #[test]
    fn utf8_sequence_split_across_chunks_survives() {
        let mut decoder = SseDecoder::new();
        let line = "data: {\"type\": \"text\", \"content\": \"résumé\"}\n".as_bytes();
        // Cut inside the two-byte encoding of 'é'.
        let cut = line.iter().position(|&b| b >= 0x80).unwrap() + 1;

        assert!(decoder.push(&line[..cut]).is_empty());
        let events = decoder.push(&line[cut..]);
        assert_eq!(events, vec![StreamEvent::Answer("résumé".to_string())]);
    }

    #[test]
    fn done_sentinel_and_blank_lines_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decode_all(
            &mut decoder,
            "data: [DONE]\n\n\ndata: {\"type\": \"text\", \"content\": \"x\"}\n",
        );
        assert_eq!(events, vec![StreamEvent::Answer("x".to_string())]);
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decode_all(
            &mut decoder,
            "event: message\nretry: 100\ndata: {\"type\": \"text\", \"content\": \"y\"}\n",
        );
        assert_eq!(events, vec![StreamEvent::Answer("y".to_string())]);
    }

    #[test]
    fn malformed_payload_does_not_abort_the_stream() {
        let mut decoder = SseDecoder::new();
        let events = decode_all(
            &mut decoder,
            concat!(
                "data: {not json at all\n",
                "data: {\"type\": \"martian\", \"content\": \"?\"}\n",
                "data: {\"type\": \"text\", \"content\": \"still alive\"}\n",
            ),
        );
        assert_eq!(events, vec![StreamEvent::Answer("still alive".to_string())]);
    }

    #[test]
    fn complete_without_content_or_session_decodes() {
        let mut decoder = SseDecoder::new();
        let events = decode_all(&mut decoder, "data: {\"type\": \"complete\"}\n");
        assert_eq!(
            events,
            vec![StreamEvent::Complete {
                content: None,
                session_id: None
            }]
        );
    }

    #[test]
    fn crlf_line_endings_decode() {
        let mut decoder = SseDecoder::new();
        let events = decode_all(&mut decoder, "data: {\"type\": \"text\", \"content\": \"z\"}\r\n");
        assert_eq!(events, vec![StreamEvent::Answer("z".to_string())]);
    }

    #[test]
    fn trailing_bytes_without_newline_stay_buffered() {
        let mut decoder = SseDecoder::new();
        assert!(decoder
            .push(b"data: {\"type\": \"text\", \"content\": \"pending\"}")
            .is_empty());
        let events = decoder.push(b"\n");
        assert_eq!(events, vec![StreamEvent::Answer("pending".to_string())]);
    }
}
