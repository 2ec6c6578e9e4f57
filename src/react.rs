//! ReAct agent on top of [`crate::graph`]: an `agent` node asks the model, a
//! `tools` node runs whatever it called, and the loop ends when the model
//! answers without tool calls. Each thread id keeps its own history in a
//! [`ThreadMemory`].

use std::{pin::pin, sync::Arc};

use dashmap::DashMap;
use futures::{StreamExt, future::join_all};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    agent::{AgentConfig, AgentError},
    completion::{LanguageModel, ModelRequest},
    conversation::{Content, Message, Role, ThreadMemory},
    graph::{CompiledGraph, END, GraphError, GraphState, MessagesState, START, StateGraph},
    llm_provider::{LLMProvider, OPENAI_FAST_MODEL},
    rig_agent::RigCompletion,
    tools::{TimeTool, Toolbox, WeatherTool},
};

pub const DEFAULT_THREAD_ID: &str = "simple-react-agent-session";

pub const REACT_PROMPT: &str = "\
You are a helpful ReAct agent with access to several tools.

Available tools:
- get_weather: Get weather information for any city
- get_current_time: Get the current date and time

When solving problems:
1. Think step by step (Reasoning)
2. Use appropriate tools when needed (Acting)
3. Provide clear, helpful responses
4. Always explain your reasoning before taking actions

If you need to use a tool, call it and then provide a response based on the results.";

const AGENT_NODE: &str = "agent";
const TOOLS_NODE: &str = "tools";

#[derive(Debug, Error)]
pub enum ReactError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

pub struct ReactAgent {
    graph: CompiledGraph<MessagesState>,
    memory: ThreadMemory,
    /// One lock per thread id, held for a whole turn.
    turns: DashMap<String, Arc<Mutex<()>>>,
    config: AgentConfig,
}

impl ReactAgent {
    pub fn new(
        model: impl LanguageModel + 'static,
        toolbox: Toolbox,
        config: AgentConfig,
    ) -> Result<Self, ReactError> {
        let graph = build_graph(Arc::new(model), Arc::new(toolbox), &config)?;
        Ok(Self {
            graph,
            memory: ThreadMemory::new(),
            turns: DashMap::new(),
            config,
        })
    }

    /// The weather and time assistant: gpt-4o-mini at temperature 0 with both tools.
    pub fn openai(provider: &LLMProvider, weather: WeatherTool) -> Result<Self, ReactError> {
        let model = RigCompletion::openai(provider)?;
        let toolbox = Toolbox::new().with_tool(weather).with_tool(TimeTool::new());
        Self::new(model, toolbox, Self::default_config())
    }

    pub fn default_config() -> AgentConfig {
        AgentConfig::builder()
            .agent_name("ReActAgent")
            .system_prompt(REACT_PROMPT)
            .temperature(0.0)
            .build()
    }

    pub fn default_provider() -> LLMProvider {
        LLMProvider::openai(OPENAI_FAST_MODEL)
    }

    pub fn memory(&self) -> &ThreadMemory {
        &self.memory
    }

    pub fn graph(&self) -> &CompiledGraph<MessagesState> {
        &self.graph
    }

    /// Add `input` to the history of `thread_id`, run the graph, and return the final reply.
    /// Turns on the same thread run one after another; other threads are not blocked.
    pub async fn invoke(&self, thread_id: &str, input: &str) -> Result<String, ReactError> {
        let turn = Arc::clone(&self.turns.entry(thread_id.to_owned()).or_default());
        let _turn = turn.lock().await;

        let mut messages = self.memory.history(thread_id);
        messages.push(Message::user(&self.config.user_name, input));
        let mut state = MessagesState::new(messages);

        let mut events = pin!(self.graph.stream(state.clone()));
        while let Some(event) = events.next().await {
            let event = event?;
            for message in &event.update {
                tracing::debug!(
                    thread = %thread_id,
                    node = %event.node,
                    "{}: {}",
                    message.role,
                    message.content
                );
            }
            state.apply(event.update);
        }

        let reply = state
            .last()
            .map(|message| message.content.to_string())
            .unwrap_or_default();
        self.memory.store(thread_id, self.config.name.clone(), state.messages);
        Ok(reply)
    }
}

fn build_graph(
    model: Arc<dyn LanguageModel>,
    toolbox: Arc<Toolbox>,
    config: &AgentConfig,
) -> Result<CompiledGraph<MessagesState>, GraphError> {
    let agent = {
        let toolbox = Arc::clone(&toolbox);
        let config = config.clone();
        move |state: MessagesState| {
            let model = Arc::clone(&model);
            let toolbox = Arc::clone(&toolbox);
            let config = config.clone();
            async move {
                let turn = model
                    .complete(ModelRequest {
                        preamble: config.system_prompt,
                        history: state.messages,
                        tools: toolbox.definitions().await,
                        temperature: Some(config.temperature),
                    })
                    .await?;

                let mut update = Vec::new();
                if let Some(text) = turn.text.filter(|text| !text.trim().is_empty()) {
                    update.push(Message::assistant(config.name.clone(), text));
                }
                if !turn.tool_calls.is_empty() {
                    update.push(Message::new(
                        Role::Assistant(config.name),
                        Content::ToolCalls(turn.tool_calls),
                    ));
                }
                if update.is_empty() {
                    return Err(AgentError::EmptyResponse);
                }
                Ok(update)
            }
        }
    };

    let tools = {
        let name = config.name.clone();
        move |state: MessagesState| {
            let toolbox = Arc::clone(&toolbox);
            let name = name.clone();
            async move {
                let calls = state
                    .last()
                    .map(|message| message.tool_calls().to_vec())
                    .unwrap_or_default();
                let outcomes = join_all(calls.iter().map(|call| toolbox.call(call))).await;
                Ok(vec![Message::new(
                    Role::Tool(name),
                    Content::ToolResults(outcomes),
                )])
            }
        }
    };

    let mut graph = StateGraph::new();
    graph.add_node(AGENT_NODE, agent)?;
    graph.add_node(TOOLS_NODE, tools)?;
    graph.add_edge(START, AGENT_NODE)?;
    graph.add_conditional_edges(AGENT_NODE, route_after_agent, &[TOOLS_NODE, END])?;
    graph.add_edge(TOOLS_NODE, AGENT_NODE)?;
    graph.compile()
}

fn route_after_agent(state: &MessagesState) -> String {
    let wants_tools = state
        .last()
        .is_some_and(|message| !message.tool_calls().is_empty());
    if wants_tools { TOOLS_NODE } else { END }.to_owned()
}
