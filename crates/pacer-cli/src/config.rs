//! CLI configuration: TOML file, then environment, then flags.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use pacer_agent::OrchestratorConfig;
use pacer_llm::OpenAiCompatConfig;

/// Coaching prompt used when the config file sets none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are Pacer, a friendly endurance coach. Keep answers short and practical.

You can manage the athlete's training schedule. To use a tool, write it on its own line:
[TOOL_CALL: plan_workout(date: \"YYYY-MM-DD\", workout_json: \"{\\\"type\\\": \\\"easy\\\", \\\"description\\\": \\\"5k at conversational pace\\\"}\")]
[TOOL_CALL: get_schedule(date: \"YYYY-MM-DD\")]  (omit date for the whole schedule)
[TOOL_CALL: delete_workout(date: \"YYYY-MM-DD\")]
Dates may also be \"today\" or \"tomorrow\". Tool results come back as a system message; \
use them to answer the athlete.";

/// Contents of `pacer.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub system_prompt: Option<String>,
    pub llm: OpenAiCompatConfig,
    pub orchestrator: OrchestratorConfig,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid configuration file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Everything a command needs.
#[derive(Debug)]
pub struct Settings {
    pub system_prompt: String,
    pub llm: OpenAiCompatConfig,
    pub orchestrator: OrchestratorConfig,
}

impl Settings {
    /// Merge the file (if any), the environment and the flags, then validate.
    pub fn resolve(
        path: Option<&Path>,
        model: Option<String>,
        max_turns: Option<usize>,
    ) -> Result<Self> {
        let file = match path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::from_file(file, model, max_turns)
    }

    fn from_file(file: FileConfig, model: Option<String>, max_turns: Option<usize>) -> Result<Self> {
        let mut llm = file.llm.apply_env();
        let mut orchestrator = file.orchestrator.apply_env();

        if let Some(model) = model {
            llm.model = model;
        }
        if let Some(max_turns) = max_turns {
            orchestrator.max_turns = max_turns;
        }

        orchestrator
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid orchestrator configuration: {}", e))?;

        Ok(Self {
            system_prompt: file
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            llm,
            orchestrator,
        })
    }
}
