//! Orchestrator configuration.
//!
//! Every knob of the turn loop lives here so the streaming coordinator,
//! the tool execution step and the CLI read the same values.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use pacer_core::config::{env_parse, env_vars};

/// Literal shown when a turn produced nothing usable.
pub const DEFAULT_FALLBACK_TEXT: &str =
    "I've processed your request, but encountered an issue generating a response. Please try again.";

/// Turn loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum model turns per user message.
    ///
    /// Bounds the tool-call loop; when exhausted the best available
    /// content is finalized instead of asking the model again.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// How often buffered message updates reach the delegate (ms).
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,

    /// Size of the sliding window scanned for tool calls (chars).
    #[serde(default = "default_detection_buffer")]
    pub detection_buffer_chars: usize,

    /// Pause between finalizing and reporting idle (ms).
    #[serde(default = "default_idle_delay")]
    pub idle_delay_ms: u64,

    /// Text used when a turn ends with no content.
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,

    /// Longest reasoning chunk passed to preview notifications (chars).
    #[serde(default = "default_reasoning_preview")]
    pub reasoning_preview_chars: usize,
}

fn default_max_turns() -> usize { 5 }
fn default_flush_interval() -> u64 { 50 }
fn default_detection_buffer() -> usize { 2000 }
fn default_idle_delay() -> u64 { 300 }
fn default_fallback_text() -> String { DEFAULT_FALLBACK_TEXT.to_string() }
fn default_reasoning_preview() -> usize { 200 }

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            flush_interval_ms: default_flush_interval(),
            detection_buffer_chars: default_detection_buffer(),
            idle_delay_ms: default_idle_delay(),
            fallback_text: default_fallback_text(),
            reasoning_preview_chars: default_reasoning_preview(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_idle_delay_ms(mut self, idle_delay_ms: u64) -> Self {
        self.idle_delay_ms = idle_delay_ms;
        self
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    /// Load configuration from environment variables
    ///
    /// Supported variables:
    /// - `PACER_MAX_TURNS`: turn limit per user message
    /// - `PACER_FLUSH_INTERVAL_MS`: update batching interval
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Overlay environment variables on top of `self`.
    pub fn apply_env(mut self) -> Self {
        if let Some(n) = env_parse::<usize>(env_vars::MAX_TURNS) {
            self.max_turns = n;
        }
        if let Some(ms) = env_parse::<u64>(env_vars::FLUSH_INTERVAL_MS) {
            self.flush_interval_ms = ms;
        }
        self
    }

    /// Check the configuration for values the turn loop cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_turns < 1 {
            return Err("max_turns must be at least 1".to_string());
        }

        if self.flush_interval_ms < 1 {
            return Err("flush_interval_ms must be at least 1 millisecond".to_string());
        }

        if self.detection_buffer_chars < 64 {
            return Err("detection_buffer_chars must be at least 64".to_string());
        }

        if self.fallback_text.trim().is_empty() {
            return Err("fallback_text must not be empty".to_string());
        }

        Ok(())
    }
}
