//! Scripted LLM backend.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use pacer_core::{ChatRequest, ChatResponse, EventStream, LlmBackend, LlmError, StreamEvent};

#[derive(Debug, Clone)]
enum ScriptedItem {
    Event(StreamEvent),
    Fail(String),
}

/// One scripted streaming call.
#[derive(Debug, Clone, Default)]
pub struct StreamScript {
    open_error: Option<String>,
    items: Vec<ScriptedItem>,
    token_delay: Option<Duration>,
}

impl StreamScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stream that cannot be opened.
    pub fn fail_to_open(error: impl Into<String>) -> Self {
        Self {
            open_error: Some(error.into()),
            ..Self::default()
        }
    }

    /// One content token.
    pub fn content(mut self, token: impl Into<String>) -> Self {
        self.items
            .push(ScriptedItem::Event(StreamEvent::Content(token.into())));
        self
    }

    /// Several content tokens, in order.
    pub fn tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for token in tokens {
            self = self.content(token);
        }
        self
    }

    /// One content token per character.
    pub fn chars(self, text: &str) -> Self {
        self.tokens(text.chars().map(String::from))
    }

    /// One reasoning token.
    pub fn reasoning(mut self, token: impl Into<String>) -> Self {
        self.items
            .push(ScriptedItem::Event(StreamEvent::Reasoning(token.into())));
        self
    }

    /// Final aggregate event.
    pub fn completed(mut self, response: ChatResponse) -> Self {
        self.items
            .push(ScriptedItem::Event(StreamEvent::Completed(response)));
        self
    }

    /// Error in the middle of the stream.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.items.push(ScriptedItem::Fail(error.into()));
        self
    }

    /// Sleep before every item.
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = Some(delay);
        self
    }

    fn into_stream(self) -> Result<EventStream, LlmError> {
        if let Some(error) = self.open_error {
            return Err(LlmError::Network(error));
        }
        let StreamScript {
            items, token_delay, ..
        } = self;
        let stream = async_stream::stream! {
            for item in items {
                if let Some(delay) = token_delay {
                    tokio::time::sleep(delay).await;
                }
                match item {
                    ScriptedItem::Event(event) => {
                        yield Ok(event);
                    }
                    ScriptedItem::Fail(error) => {
                        yield Err(LlmError::Network(error));
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Stream,
    Complete,
}

/// A request the backend received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub request: ChatRequest,
}

/// Backend replaying queued scripts in order.
///
/// Unscripted calls fail, except completions when a repeating response is set.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    streams: Mutex<VecDeque<StreamScript>>,
    completions: Mutex<VecDeque<Result<ChatResponse, String>>>,
    repeating: Mutex<Option<ChatResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(self, script: StreamScript) -> Self {
        self.streams.lock().push_back(script);
        self
    }

    pub fn with_completion(self, response: ChatResponse) -> Self {
        self.completions.lock().push_back(Ok(response));
        self
    }

    pub fn with_completion_error(self, error: impl Into<String>) -> Self {
        self.completions.lock().push_back(Err(error.into()));
        self
    }

    /// Answer every unscripted completion with `response`.
    pub fn repeating_completion(self, response: ChatResponse) -> Self {
        *self.repeating.lock() = Some(response);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn stream_calls(&self) -> usize {
        self.count(CallKind::Stream)
    }

    pub fn completion_calls(&self) -> usize {
        self.count(CallKind::Complete)
    }

    fn count(&self, kind: CallKind) -> usize {
        self.calls.lock().iter().filter(|c| c.kind == kind).count()
    }

    fn record(&self, kind: CallKind, request: ChatRequest) {
        self.calls.lock().push(RecordedCall { kind, request });
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        self.record(CallKind::Complete, request);
        let next = self.completions.lock().pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(error)) => Err(LlmError::Network(error)),
            None => self
                .repeating
                .lock()
                .clone()
                .ok_or_else(|| LlmError::Generation("no scripted completion left".to_string())),
        }
    }

    async fn stream(&self, request: ChatRequest) -> Result<EventStream, LlmError> {
        self.record(CallKind::Stream, request);
        let next = self.streams.lock().pop_front();
        match next {
            Some(script) => script.into_stream(),
            None => Err(LlmError::Generation("no scripted stream left".to_string())),
        }
    }
}
