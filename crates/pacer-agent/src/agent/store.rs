//! In-memory conversation store.
//!
//! A ready-made [`ConversationDelegate`]: the history sits behind one
//! mutex and every notification is forwarded as a [`ConversationEvent`] to
//! an optional subscriber.

use parking_lot::Mutex;
use tokio::sync::mpsc;

use pacer_core::{
    ConversationDelegate, ConversationState, Error, Message, Result, ToolCallResult,
};

use super::types::ConversationEvent;

/// History plus an event channel.
#[derive(Default)]
pub struct ConversationStore {
    messages: Mutex<Vec<Message>>,
    events: Mutex<Option<mpsc::UnboundedSender<ConversationEvent>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an existing history.
    pub fn with_history(messages: Vec<Message>) -> Self {
        Self {
            messages: Mutex::new(messages),
            events: Mutex::new(None),
        }
    }

    /// Receive every event from now on. Replaces an earlier subscriber.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ConversationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock() = Some(tx);
        rx
    }

    fn emit(&self, event: ConversationEvent) {
        let mut events = self.events.lock();
        if let Some(tx) = events.as_ref() {
            if tx.send(event).is_err() {
                tracing::debug!("Event subscriber dropped");
                *events = None;
            }
        }
    }

    fn push(&self, message: Message) -> usize {
        let index = {
            let mut messages = self.messages.lock();
            messages.push(message.clone());
            messages.len() - 1
        };
        self.emit(ConversationEvent::message_created(index, message));
        index
    }

    /// Append a user message.
    pub fn push_user(&self, text: impl Into<String>) -> usize {
        self.push(Message::user(text))
    }

    /// Append a system message.
    pub fn push_system(&self, text: impl Into<String>) -> usize {
        self.push(Message::system(text))
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    pub fn last(&self) -> Option<Message> {
        self.messages.lock().last().cloned()
    }

    /// Drop the whole history.
    pub fn clear(&self) {
        self.messages.lock().clear();
        self.emit(ConversationEvent::Cleared);
    }
}

impl ConversationDelegate for ConversationStore {
    fn history(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    fn message(&self, index: usize) -> Option<Message> {
        self.messages.lock().get(index).cloned()
    }

    fn create_message(&self, message: Message) -> Result<usize> {
        Ok(self.push(message))
    }

    fn update_message(&self, index: usize, message: Message) -> Result<()> {
        {
            let mut messages = self.messages.lock();
            let slot = messages
                .get_mut(index)
                .ok_or(Error::MessageNotFound(index))?;
            *slot = message.clone();
        }
        self.emit(ConversationEvent::message_updated(index, message));
        Ok(())
    }

    fn notify_tool_detected(&self, name: &str, description: &str) {
        self.emit(ConversationEvent::tool_detected(name, description));
    }

    fn notify_tool_started(&self, name: &str, description: &str) {
        self.emit(ConversationEvent::tool_started(name, description));
    }

    fn notify_tool_completed(&self, result: &ToolCallResult) {
        self.emit(ConversationEvent::ToolCompleted {
            result: result.clone(),
        });
    }

    fn notify_reasoning_state(&self, is_streaming: bool, latest_chunk: Option<&str>) {
        self.emit(ConversationEvent::Reasoning {
            is_streaming,
            chunk: latest_chunk.map(str::to_string),
        });
    }

    fn notify_conversation_state(&self, state: ConversationState) {
        self.emit(ConversationEvent::state(state));
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("messages", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_follow_mutations() {
        let store = ConversationStore::new();
        let mut events = store.subscribe();

        let index = store.push_user("Plan my long run");
        let mut reply = Message::assistant_streaming("", None);
        let reply_index = store.create_message(reply.clone()).unwrap();
        reply.content = "Saturday works.".to_string();
        store.update_message(reply_index, reply).unwrap();

        assert_eq!(index, 0);
        assert!(matches!(
            events.recv().await,
            Some(ConversationEvent::MessageCreated { index: 0, .. })
        ));
        assert!(matches!(
            events.recv().await,
            Some(ConversationEvent::MessageCreated { index: 1, .. })
        ));
        match events.recv().await {
            Some(ConversationEvent::MessageUpdated { index, message }) => {
                assert_eq!(index, 1);
                assert_eq!(message.content, "Saturday works.");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_update_out_of_range() {
        let store = ConversationStore::new();
        let err = store.update_message(4, Message::assistant("x")).unwrap_err();
        assert!(matches!(err, Error::MessageNotFound(4)));
    }

    #[test]
    fn test_clear_and_dropped_subscriber() {
        let store = ConversationStore::new();
        drop(store.subscribe());
        store.push_system("You are a running coach.");
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.history(), Vec::<Message>::new());
    }
}
