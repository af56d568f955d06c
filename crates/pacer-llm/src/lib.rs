//! LLM backends for Pacer.
//!
//! Currently one backend: any endpoint speaking the OpenAI chat completions
//! protocol (OpenRouter, OpenAI, Ollama's `/v1`, ...).

pub mod backends;
pub mod sse;

pub use backends::openai::{OpenAiCompatBackend, OpenAiCompatConfig};
