use futures::future::BoxFuture;
use rig::{
    OneOrMany,
    agent::AgentBuilder,
    completion::{Chat, CompletionModel, Prompt},
    message::{AssistantContent, Message as RigMessage, ToolResultContent, UserContent},
    providers::{gemini, openai},
};

use crate::{
    agent::{Agent, AgentConfig, AgentError},
    completion::{LanguageModel, ModelRequest, ModelTurn},
    conversation::{Content, Message, Role, ToolInvocation},
    llm_provider::{LLMProvider, LLMProviderError},
};

type ResolveBuilder<M> = fn(&LLMProvider) -> Result<AgentBuilder<M>, LLMProviderError>;

/// An [Agent] backed by a rig agent. Handles plain prompting and multi-turn chat.
pub struct RigAgent<M: CompletionModel> {
    agent: rig::agent::Agent<M>,
    config: AgentConfig,
}

impl RigAgent<openai::CompletionModel> {
    pub fn openai_builder() -> RigAgentBuilder<openai::CompletionModel> {
        RigAgentBuilder::new(LLMProvider::get_open_ai_agent_builder)
    }
}

impl RigAgent<gemini::completion::CompletionModel> {
    pub fn gemini_builder() -> RigAgentBuilder<gemini::completion::CompletionModel> {
        RigAgentBuilder::new(LLMProvider::get_gemini_agent_builder)
    }
}

impl<M: CompletionModel> RigAgent<M> {
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

impl<M: CompletionModel> Agent for RigAgent<M> {
    fn run(&self, task: String) -> BoxFuture<'_, Result<String, AgentError>> {
        Box::pin(async move {
            tracing::debug!(agent = %self.config.name, %task, "prompting");
            Ok(self.agent.prompt(task.as_str()).await?)
        })
    }

    fn chat(&self, history: Vec<Message>) -> BoxFuture<'_, Result<String, AgentError>> {
        Box::pin(async move {
            let (prompt, earlier) = history.split_last().ok_or(AgentError::EmptyHistory)?;
            let prompt = prompt.text().ok_or(AgentError::EmptyHistory)?;
            let chat_history = earlier.iter().filter_map(text_message).collect();
            Ok(self.agent.chat(prompt, chat_history).await?)
        })
    }

    fn id(&self) -> String {
        self.config.id.clone()
    }

    fn name(&self) -> String {
        self.config.name.clone()
    }

    fn description(&self) -> String {
        self.config.description.clone().unwrap_or_default()
    }
}

pub struct RigAgentBuilder<M: CompletionModel> {
    resolve: ResolveBuilder<M>,
    agent_builder: Option<AgentBuilder<M>>,
    config: AgentConfig,
}

impl<M: CompletionModel> RigAgentBuilder<M> {
    fn new(resolve: ResolveBuilder<M>) -> Self {
        Self {
            resolve,
            agent_builder: None,
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: LLMProvider) -> Result<Self, AgentError> {
        self.agent_builder = Some((self.resolve)(&provider)?);
        Ok(self)
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn agent_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
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

    pub fn build(self) -> Result<RigAgent<M>, AgentError> {
        let agent_builder = self
            .agent_builder
            .ok_or(LLMProviderError::ProviderNotSet)?;
        let agent = agent_builder
            .preamble(&self.config.system_prompt)
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .build();

        Ok(RigAgent {
            agent,
            config: self.config,
        })
    }
}

/// A [LanguageModel] over a rig completion model, with native tool calling.
pub struct RigCompletion<M: CompletionModel> {
    model: M,
    max_tokens: Option<u64>,
}

impl RigCompletion<openai::CompletionModel> {
    pub fn openai(provider: &LLMProvider) -> Result<Self, AgentError> {
        Ok(Self::new(provider.get_open_ai_completion_model()?))
    }
}

impl RigCompletion<gemini::completion::CompletionModel> {
    pub fn gemini(provider: &LLMProvider) -> Result<Self, AgentError> {
        Ok(Self::new(provider.get_gemini_completion_model()?))
    }
}

impl<M: CompletionModel> RigCompletion<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            max_tokens: None,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl<M: CompletionModel> LanguageModel for RigCompletion<M> {
    fn complete(&self, request: ModelRequest) -> BoxFuture<'_, Result<ModelTurn, AgentError>> {
        Box::pin(async move {
            let mut history: Vec<RigMessage> =
                request.history.iter().filter_map(to_rig_message).collect();
            let prompt = history.pop().ok_or(AgentError::EmptyHistory)?;

            let mut builder = self
                .model
                .completion_request(prompt)
                .preamble(request.preamble)
                .messages(history)
                .tools(request.tools);
            if let Some(temperature) = request.temperature {
                builder = builder.temperature(temperature);
            }
            if let Some(max_tokens) = self.max_tokens {
                builder = builder.max_tokens(max_tokens);
            }

            let response = builder.send().await?;

            let mut turn = ModelTurn::default();
            for content in response.choice.iter() {
                if let AssistantContent::Text(text) = content {
                    match &mut turn.text {
                        Some(existing) => existing.push_str(&text.text),
                        None => turn.text = Some(text.text.clone()),
                    }
                } else if let AssistantContent::ToolCall(call) = content {
                    turn.tool_calls.push(ToolInvocation {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments: call.function.arguments.clone(),
                    });
                }
            }
            tracing::debug!(?turn, "model turn");
            Ok(turn)
        })
    }
}

fn text_message(message: &Message) -> Option<RigMessage> {
    match (&message.role, &message.content) {
        (Role::Assistant(_), Content::Text(text)) => Some(RigMessage::assistant(text.clone())),
        (Role::User(_) | Role::Tool(_), Content::Text(text)) => {
            Some(RigMessage::user(text.clone()))
        }
        (_, Content::ToolCalls(_) | Content::ToolResults(_)) => None,
    }
}

fn to_rig_message(message: &Message) -> Option<RigMessage> {
    match &message.content {
        Content::Text(_) => text_message(message),
        Content::ToolCalls(calls) => {
            let contents: Vec<_> = calls
                .iter()
                .map(|call| {
                    AssistantContent::tool_call(
                        call.id.clone(),
                        call.name.clone(),
                        call.arguments.clone(),
                    )
                })
                .collect();
            OneOrMany::many(contents)
                .ok()
                .map(|content| RigMessage::Assistant { content })
        }
        Content::ToolResults(results) => {
            let contents: Vec<_> = results
                .iter()
                .map(|result| {
                    UserContent::tool_result(
                        result.id.clone(),
                        OneOrMany::one(ToolResultContent::text(result.output.clone())),
                    )
                })
                .collect();
            OneOrMany::many(contents)
                .ok()
                .map(|content| RigMessage::User { content })
        }
    }
}
