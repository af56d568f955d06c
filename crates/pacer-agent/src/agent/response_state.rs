//! Accumulated state of one model response.

/// Content, reasoning and the visible message a response is bound to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseState {
    content: String,
    reasoning: Option<String>,
    message_index: Option<usize>,
    is_complete: bool,
}

impl ResponseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a finished non-streaming response.
    pub fn completed(content: impl Into<String>, reasoning: Option<String>) -> Self {
        let mut state = Self::new();
        state.set_content(content);
        state.set_reasoning(reasoning);
        state.mark_complete();
        state
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning.as_deref()
    }

    pub fn message_index(&self) -> Option<usize> {
        self.message_index
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    pub fn append_content(&mut self, token: &str) {
        self.content.push_str(token);
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn append_reasoning(&mut self, token: &str) {
        self.reasoning.get_or_insert_with(String::new).push_str(token);
    }

    /// Replace reasoning; blank reasoning is stored as `None`.
    pub fn set_reasoning(&mut self, reasoning: Option<String>) {
        self.reasoning = reasoning.filter(|r| !r.trim().is_empty());
    }

    pub fn set_message_index(&mut self, index: usize) {
        self.message_index = Some(index);
    }

    pub fn mark_complete(&mut self) {
        self.is_complete = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_set() {
        let mut state = ResponseState::new();
        state.append_content("Easy ");
        state.append_content("run");
        state.append_reasoning("thinking");
        assert_eq!(state.content(), "Easy run");
        assert_eq!(state.reasoning(), Some("thinking"));
        assert!(!state.is_complete());

        state.set_content("Tempo run");
        state.set_message_index(3);
        state.mark_complete();
        assert_eq!(state.content(), "Tempo run");
        assert_eq!(state.message_index(), Some(3));
        assert!(state.is_complete());
    }

    #[test]
    fn test_blank_reasoning_is_none() {
        let state = ResponseState::completed("  ", Some(" \n".to_string()));
        assert_eq!(state.reasoning(), None);
        assert!(!state.has_content());
        assert!(state.is_complete());
    }
}
