//! Recording conversation delegate.

use parking_lot::Mutex;

use pacer_core::{
    ConversationDelegate, ConversationState, Error, Message, MessageLifecycle, MessageRole,
    Result, ToolCallResult,
};

/// Everything the core told the delegate, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DelegateEvent {
    Created {
        index: usize,
        content: String,
    },
    Updated {
        index: usize,
        content: String,
        lifecycle: MessageLifecycle,
    },
    ToolDetected {
        name: String,
        description: String,
    },
    ToolStarted {
        name: String,
        description: String,
    },
    ToolCompleted(ToolCallResult),
    Reasoning {
        is_streaming: bool,
        chunk: Option<String>,
    },
    State(ConversationState),
}

/// Delegate keeping the history in memory and logging every call.
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    messages: Mutex<Vec<Message>>,
    events: Mutex<Vec<DelegateEvent>>,
    rejected_role: Option<MessageRole>,
}

impl RecordingDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delegate whose history holds one user message.
    pub fn with_user(text: impl Into<String>) -> Self {
        Self::with_history(vec![Message::user(text)])
    }

    pub fn with_history(messages: Vec<Message>) -> Self {
        Self {
            messages: Mutex::new(messages),
            events: Mutex::new(Vec::new()),
            rejected_role: None,
        }
    }

    /// Fail every `create_message` call for messages with `role`.
    pub fn rejecting_creates(mut self, role: MessageRole) -> Self {
        self.rejected_role = Some(role);
        self
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub fn events(&self) -> Vec<DelegateEvent> {
        self.events.lock().clone()
    }

    pub fn assistant_messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .cloned()
            .collect()
    }

    pub fn system_messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .cloned()
            .collect()
    }

    pub fn last_assistant(&self) -> Option<Message> {
        self.assistant_messages().pop()
    }

    pub fn create_count(&self) -> usize {
        self.count(|e| matches!(e, DelegateEvent::Created { .. }))
    }

    pub fn update_count(&self) -> usize {
        self.count(|e| matches!(e, DelegateEvent::Updated { .. }))
    }

    /// How often a tool call named `name` was reported as detected.
    pub fn detected_count(&self, name: &str) -> usize {
        self.count(|e| matches!(e, DelegateEvent::ToolDetected { name: n, .. } if n == name))
    }

    pub fn started_tools(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                DelegateEvent::ToolStarted { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<ConversationState> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                DelegateEvent::State(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Contents passed to `update_message` for `index`, in order.
    pub fn updates_for(&self, index: usize) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                DelegateEvent::Updated { index: i, content, .. } if *i == index => {
                    Some(content.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&DelegateEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    fn record(&self, event: DelegateEvent) {
        self.events.lock().push(event);
    }
}

impl ConversationDelegate for RecordingDelegate {
    fn history(&self) -> Vec<Message> {
        self.messages()
    }

    fn message(&self, index: usize) -> Option<Message> {
        self.messages.lock().get(index).cloned()
    }

    fn create_message(&self, message: Message) -> Result<usize> {
        if self.rejected_role == Some(message.role) {
            return Err(Error::delegate(format!(
                "{} messages are rejected",
                message.role.as_str()
            )));
        }
        let content = message.content.clone();
        let index = {
            let mut messages = self.messages.lock();
            messages.push(message);
            messages.len() - 1
        };
        self.record(DelegateEvent::Created { index, content });
        Ok(index)
    }

    fn update_message(&self, index: usize, message: Message) -> Result<()> {
        let event = DelegateEvent::Updated {
            index,
            content: message.content.clone(),
            lifecycle: message.lifecycle,
        };
        {
            let mut messages = self.messages.lock();
            let slot = messages
                .get_mut(index)
                .ok_or(Error::MessageNotFound(index))?;
            *slot = message;
        }
        self.record(event);
        Ok(())
    }

    fn notify_tool_detected(&self, name: &str, description: &str) {
        self.record(DelegateEvent::ToolDetected {
            name: name.to_string(),
            description: description.to_string(),
        });
    }

    fn notify_tool_started(&self, name: &str, description: &str) {
        self.record(DelegateEvent::ToolStarted {
            name: name.to_string(),
            description: description.to_string(),
        });
    }

    fn notify_tool_completed(&self, result: &ToolCallResult) {
        self.record(DelegateEvent::ToolCompleted(result.clone()));
    }

    fn notify_reasoning_state(&self, is_streaming: bool, latest_chunk: Option<&str>) {
        self.record(DelegateEvent::Reasoning {
            is_streaming,
            chunk: latest_chunk.map(str::to_string),
        });
    }

    fn notify_conversation_state(&self, state: ConversationState) {
        self.record(DelegateEvent::State(state));
    }
}
