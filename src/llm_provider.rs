use rig::{
    agent::AgentBuilder,
    providers::{gemini, openai},
};
use thiserror::Error;

/// The chat models used by the programs.
pub const OPENAI_CHAT_MODEL: &str = openai::GPT_4O;
pub const OPENAI_FAST_MODEL: &str = openai::GPT_4O_MINI;
pub const OPENAI_EMBEDDING_MODEL: &str = openai::TEXT_EMBEDDING_3_SMALL;
pub const GEMINI_CHAT_MODEL: &str = "gemini-2.0-flash-lite";

#[derive(Clone)]
pub enum LLMProvider {
    OpenAI(ModelConfig),
    Gemini(ModelConfig),
}

macro_rules! impl_agent_builder {
    ($method:ident, $variant:ident, $client:ty, $model:ty) => {
        pub fn $method(&self) -> Result<AgentBuilder<$model>, LLMProviderError> {
            let LLMProvider::$variant(config) = self else {
                return Err(LLMProviderError::LLMProviderNotMatch);
            };
            let client = <$client>::new(config.api_key()?);
            Ok(client.agent(&config.model))
        }
    };
}

macro_rules! impl_completion_model {
    ($method:ident, $variant:ident, $client:ty, $model:ty) => {
        pub fn $method(&self) -> Result<$model, LLMProviderError> {
            let LLMProvider::$variant(config) = self else {
                return Err(LLMProviderError::LLMProviderNotMatch);
            };
            let client = <$client>::new(config.api_key()?);
            Ok(client.completion_model(&config.model))
        }
    };
}

// `$name` is spelled out because `:snake` splits acronyms (`OpenAI` -> `open_a_i`).
macro_rules! impl_provider_accessors {
    ($name:ident, $variant:ident, $client:ty, $model:ty) => {
        paste::paste! {
            impl_agent_builder!(
                [<get_ $name _agent_builder>],
                $variant,
                $client,
                $model
            );
            impl_completion_model!(
                [<get_ $name _completion_model>],
                $variant,
                $client,
                $model
            );
        }
    };
}

impl LLMProvider {
    pub fn openai(model: impl Into<String>) -> Self {
        Self::OpenAI(ModelConfig::new(model))
    }

    pub fn gemini(model: impl Into<String>) -> Self {
        Self::Gemini(ModelConfig::new(model))
    }

    /// Attach the API key used to build clients for this provider.
    pub fn with_api_key(self, api_key: impl Into<String>) -> Self {
        match self {
            LLMProvider::OpenAI(config) => LLMProvider::OpenAI(config.with_api_key(api_key)),
            LLMProvider::Gemini(config) => LLMProvider::Gemini(config.with_api_key(api_key)),
        }
    }

    pub fn get_config(&self) -> &ModelConfig {
        match self {
            LLMProvider::OpenAI(config) | LLMProvider::Gemini(config) => config,
        }
    }

    /// Embedding model for RAG. Only OpenAI provides one here.
    pub fn openai_embedding_model(
        &self,
        model: &str,
    ) -> Result<openai::EmbeddingModel, LLMProviderError> {
        let LLMProvider::OpenAI(config) = self else {
            return Err(LLMProviderError::LLMProviderNotMatch);
        };
        let client = openai::Client::new(config.api_key()?);
        Ok(client.embedding_model(model))
    }

    impl_provider_accessors!(open_ai, OpenAI, openai::Client, openai::CompletionModel);

    impl_provider_accessors!(gemini, Gemini, gemini::Client, gemini::completion::CompletionModel);
}

#[derive(Clone)]
pub struct ModelConfig {
    pub model: String,
    api_key: Option<String>,
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn api_key(&self) -> Result<&str, LLMProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| LLMProviderError::MissingApiKey(self.model.clone()))
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum LLMProviderError {
    #[error("LLM provider not match")]
    LLMProviderNotMatch,
    #[error("No API key configured for model {0}")]
    MissingApiKey(String),
    #[error("LLM provider not set")]
    ProviderNotSet,
}
