use futures::future::BoxFuture;
use rig::completion::{CompletionError, PromptError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{conversation::Message, llm_provider::LLMProviderError};

pub trait Agent: Send + Sync {
    /// Answer a single task with no prior history.
    fn run(&self, task: String) -> BoxFuture<'_, Result<String, AgentError>>;

    /// Answer the last user message of `history`, using the earlier messages as context.
    fn chat(&self, history: Vec<Message>) -> BoxFuture<'_, Result<String, AgentError>>;

    /// Get agent ID
    fn id(&self) -> String;

    /// Get agent name
    fn name(&self) -> String;

    /// Get agent description
    fn description(&self) -> String;
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent prompt error: {0}")]
    PromptError(#[from] PromptError),
    #[error("Completion error: {0}")]
    CompletionError(#[from] CompletionError),
    #[error("LLM provider error: {0}")]
    ProviderError(#[from] LLMProviderError),
    #[error("Conversation history is empty")]
    EmptyHistory,
    #[error("Model returned neither text nor tool calls")]
    EmptyResponse,
    #[cfg(test)]
    #[error("Test error: {0}")]
    TestError(String),
}

#[derive(Clone)]
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    pub fn agent_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn user_name(mut self, name: impl Into<String>) -> Self {
        self.config.user_name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = Some(description.into());
        self
    }

    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.config.system_prompt = system_prompt.into();
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u64) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn build(self) -> AgentConfig {
        self.config
    }
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    pub user_name: String,
    pub system_prompt: String,
    pub description: Option<String>,
    pub temperature: f64,
    pub max_tokens: u64,
    /// Upper bound on model calls for a single query in tool-calling loops.
    pub max_iterations: u32,
    /// Log every intermediate step of tool-calling loops.
    pub verbose: bool,
}

impl AgentConfig {
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder {
            config: AgentConfig::default(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: "Agent".to_owned(),
            user_name: "User".to_owned(),
            system_prompt: "You are a helpful assistant.".to_owned(),
            description: None,
            temperature: 0.7,
            max_tokens: 8192,
            max_iterations: 3,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = AgentConfig::builder()
            .agent_name("Weatherman")
            .description("Answers weather questions")
            .temperature(0.0)
            .max_iterations(5)
            .verbose(true)
            .build();

        assert_eq!(config.name, "Weatherman");
        assert_eq!(config.user_name, "User");
        assert_eq!(config.description.as_deref(), Some("Answers weather questions"));
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.max_iterations, 5);
        assert!(config.verbose);
    }

    #[test]
    fn every_config_gets_its_own_id() {
        assert_ne!(AgentConfig::default().id, AgentConfig::default().id);
    }
}
