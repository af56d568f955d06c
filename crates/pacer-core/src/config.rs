//! Shared configuration constants.
//!
//! Default endpoints, models and environment variable names live here so
//! the backend, agent and CLI crates agree on them.

/// Default endpoint constants
pub mod endpoints {
    pub const OPENROUTER: &str = "https://openrouter.ai/api/v1";
    pub const OPENAI: &str = "https://api.openai.com/v1";
    pub const OLLAMA: &str = "http://localhost:11434/v1";
}

/// Default model constants
pub mod models {
    pub const DEFAULT: &str = "deepseek/deepseek-r1";
}

/// Environment variable names
pub mod env_vars {
    pub const API_KEY: &str = "PACER_API_KEY";
    pub const MODEL: &str = "PACER_MODEL";
    pub const ENDPOINT: &str = "PACER_ENDPOINT";
    pub const TIMEOUT_SECS: &str = "PACER_TIMEOUT_SECS";
    pub const MAX_TURNS: &str = "PACER_MAX_TURNS";
    pub const FLUSH_INTERVAL_MS: &str = "PACER_FLUSH_INTERVAL_MS";
    pub const LOG_JSON: &str = "PACER_LOG_JSON";
}

/// Read and parse an environment variable, ignoring unset or malformed values.
pub fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring malformed value for {}: {:?}", name, raw);
            None
        }
    }
}
