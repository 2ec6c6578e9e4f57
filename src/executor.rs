//! Agent-executor style tool use: call the model, run any tools it asks for,
//! feed the observations back, and stop at the first plain answer or when the
//! iteration budget is spent.

use std::sync::Arc;

use futures::future::join_all;

use crate::{
    agent::{AgentConfig, AgentError},
    completion::{LanguageModel, ModelRequest},
    conversation::{Content, Message, Role, ToolInvocation},
    llm_provider::{LLMProvider, OPENAI_CHAT_MODEL},
    rig_agent::RigCompletion,
    tools::{TimeTool, Toolbox, WeatherTool},
};

pub const MAX_ITERATIONS_MESSAGE: &str = "Agent stopped due to max iterations.";
pub const NO_ANSWER_MESSAGE: &str = "I apologize, but I couldn't process your request.";

pub const TOOL_AGENT_PROMPT: &str = "\
You are a helpful AI assistant with access to external tools for real-time information.

IMPORTANT: You MUST use the available tools when users ask for real-time information. Do not provide generic responses.

When a user asks about:
- Time/current time/what time is it -> ALWAYS use get_current_time tool
- Weather/temperature/conditions -> ALWAYS use get_weather tool

Available tools:
- get_weather: Get current weather for any location
- get_current_time: Get current time and date

You must call the appropriate tools to get real-time data before responding.";

/// A tool call and what it returned.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentStep {
    pub invocation: ToolInvocation,
    pub observation: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExecutorOutput {
    pub output: String,
    pub steps: Vec<AgentStep>,
}

pub struct AgentExecutor {
    model: Arc<dyn LanguageModel>,
    toolbox: Toolbox,
    config: AgentConfig,
}

impl AgentExecutor {
    pub fn new(model: impl LanguageModel + 'static, toolbox: Toolbox, config: AgentConfig) -> Self {
        Self {
            model: Arc::new(model),
            toolbox,
            config,
        }
    }

    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Answer `input` from scratch; nothing is remembered between calls.
    pub async fn invoke(&self, input: &str) -> Result<ExecutorOutput, AgentError> {
        let tools = self.toolbox.definitions().await;
        let mut history = vec![Message::user(&self.config.user_name, input)];
        let mut steps = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            let turn = self
                .model
                .complete(ModelRequest {
                    preamble: self.config.system_prompt.clone(),
                    history: history.clone(),
                    tools: tools.clone(),
                    temperature: Some(self.config.temperature),
                })
                .await?;

            if !turn.wants_tools() {
                let output = turn.text.unwrap_or_default();
                if self.config.verbose {
                    tracing::info!(iteration, %output, "agent finished");
                }
                return Ok(ExecutorOutput { output, steps });
            }

            let outcomes =
                join_all(turn.tool_calls.iter().map(|call| self.toolbox.call(call))).await;
            for (invocation, outcome) in turn.tool_calls.iter().zip(&outcomes) {
                if self.config.verbose {
                    tracing::info!(
                        iteration,
                        tool = %invocation.name,
                        arguments = %invocation.arguments,
                        observation = %outcome.output,
                        "invoked tool"
                    );
                }
                steps.push(AgentStep {
                    invocation: invocation.clone(),
                    observation: outcome.output.clone(),
                });
            }

            history.push(Message::new(
                Role::Assistant(self.config.name.clone()),
                Content::ToolCalls(turn.tool_calls),
            ));
            history.push(Message::new(
                Role::Tool(self.config.name.clone()),
                Content::ToolResults(outcomes),
            ));
        }

        tracing::warn!(
            max_iterations = self.config.max_iterations,
            "agent stopped before producing an answer"
        );
        Ok(ExecutorOutput {
            output: MAX_ITERATIONS_MESSAGE.to_owned(),
            steps,
        })
    }
}

/// The weather and time assistant: gpt-4o, temperature 0, three iterations, verbose.
pub struct ToolCallingAgent {
    executor: AgentExecutor,
}

impl ToolCallingAgent {
    pub fn new(provider: &LLMProvider, weather: WeatherTool) -> Result<Self, AgentError> {
        let model = RigCompletion::openai(provider)?;
        let toolbox = Toolbox::new().with_tool(weather).with_tool(TimeTool::new());
        Ok(Self::from_executor(AgentExecutor::new(
            model,
            toolbox,
            Self::default_config(),
        )))
    }

    pub fn from_executor(executor: AgentExecutor) -> Self {
        Self { executor }
    }

    pub fn default_config() -> AgentConfig {
        AgentConfig::builder()
            .agent_name("ToolCallingAgent")
            .system_prompt(TOOL_AGENT_PROMPT)
            .temperature(0.0)
            .max_iterations(3)
            .verbose(true)
            .build()
    }

    pub fn default_provider() -> LLMProvider {
        LLMProvider::openai(OPENAI_CHAT_MODEL)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.executor.toolbox().names()
    }

    /// Run one query and always return text for the user; failures are phrased as an apology.
    pub async fn process_query(&self, query: &str) -> String {
        println!("\n🤖 Processing query: '{query}'");
        println!("{}", "=".repeat(60));
        println!("📝 Step 1: LLM analyzing query and determining tool needs...");
        println!("🔧 Available tools: {:?}", self.tool_names());

        match self.executor.invoke(query).await {
            Ok(result) => {
                println!("✅ Task completed!");
                if result.output.trim().is_empty() {
                    NO_ANSWER_MESSAGE.to_owned()
                } else {
                    result.output
                }
            }
            Err(err) => {
                let message = format!("Sorry, I encountered an error: {err}");
                println!("❌ Error: {message}");
                message
            }
        }
    }
}
