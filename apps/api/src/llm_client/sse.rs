//! Incremental decoder for the completion API's streaming mode: server-sent
//! events whose `data:` payloads carry token deltas, ended by `data: [DONE]`.

use serde::Deserialize;

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Buffers raw bytes and yields complete events. Chunk boundaries may fall anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A decoder that yields nothing further; ends a stream after a transport error.
    pub fn finished() -> Self {
        Self {
            buffer: Vec::new(),
            finished: true,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.buffer.extend_from_slice(bytes);

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == DONE_SENTINEL {
                self.finished = true;
                self.buffer.clear();
                events.push(StreamEvent::Done);
                break;
            }
            match serde_json::from_str::<StreamChunk>(data) {
                Ok(chunk) => events.extend(
                    chunk
                        .choices
                        .into_iter()
                        .filter_map(|c| c.delta.content)
                        .filter(|s| !s.is_empty())
                        .map(StreamEvent::Delta),
                ),
                Err(e) => tracing::debug!("Skipping malformed stream chunk: {e}"),
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n\n",
            serde_json::to_string(content).unwrap()
        )
    }

    #[test]
    fn test_decodes_deltas_until_done() {
        let mut decoder = SseDecoder::new();
        let payload = format!("{}{}data: [DONE]\n\n", chunk("Hel"), chunk("lo"));
        let events = decoder.push(payload.as_bytes());
        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("Hel".into()),
                StreamEvent::Delta("lo".into()),
                StreamEvent::Done
            ]
        );
        assert!(decoder.is_finished());
        assert!(decoder.push(chunk("late").as_bytes()).is_empty());
    }

    #[test]
    fn test_handles_split_chunks() {
        let mut decoder = SseDecoder::new();
        let payload = chunk("split me");
        let (a, b) = payload.as_bytes().split_at(17);
        assert!(decoder.push(a).is_empty());
        assert_eq!(decoder.push(b), vec![StreamEvent::Delta("split me".into())]);
    }

    #[test]
    fn test_ignores_role_only_and_comment_lines() {
        let mut decoder = SseDecoder::new();
        let payload = ": keep-alive\ndata: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n";
        assert!(decoder.push(payload.as_bytes()).is_empty());
    }
}
