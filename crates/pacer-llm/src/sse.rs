//! Server-sent event parsing for streaming chat completions.
//!
//! Network chunks split lines anywhere, including inside a multi-byte
//! character, so bytes are buffered until a full line is available.

use serde::Deserialize;

use pacer_core::{LlmError, StreamEvent};

/// One meaningful SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line.
    Data(String),
    /// `data: [DONE]`
    Done,
}

fn parse_line(raw: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    // Comments (": keep-alive") and other fields are ignored
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() {
        return None;
    }
    if payload == "[DONE]" {
        return Some(SseEvent::Done);
    }
    Some(SseEvent::Data(payload.to_string()))
}

/// Incremental line splitter.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that had no newline.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
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
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: String,
}

/// Turn one `data:` payload into stream events.
///
/// Reasoning comes before content when a delta carries both.
pub fn delta_events(payload: &str) -> Result<Vec<StreamEvent>, LlmError> {
    let chunk: StreamChunk = serde_json::from_str(payload)?;
    if let Some(error) = chunk.error {
        return Err(LlmError::Generation(error.message));
    }

    let mut events = Vec::new();
    for choice in chunk.choices {
        let delta = choice.delta;
        let reasoning = delta
            .reasoning
            .filter(|r| !r.is_empty())
            .or(delta.reasoning_content.filter(|r| !r.is_empty()));
        if let Some(reasoning) = reasoning {
            events.push(StreamEvent::Reasoning(reasoning));
        }
        if let Some(content) = delta.content {
            if !content.is_empty() {
                events.push(StreamEvent::Content(content));
            }
        }
    }
    Ok(events)
}
