//! One-node chat graph: START -> chatbot -> END, streamed per user line.

use std::{pin::pin, sync::Arc};

use futures::StreamExt;
use rigbook::{
    agent::{Agent, AgentError},
    config::Settings,
    conversation::Message,
    graph::{CompiledGraph, END, GraphError, MessagesState, START, StateGraph},
    llm_provider::{LLMProvider, OPENAI_FAST_MODEL},
    repl::Repl,
    rig_agent::RigAgent,
    telemetry::init_tracing,
};

const GRAPH_FILE: &str = "graph_visualization.mmd";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let settings = Settings::load();

    let provider = LLMProvider::openai(OPENAI_FAST_MODEL).with_api_key(settings.openai_api_key()?);
    let llm: Arc<dyn Agent> = Arc::new(
        RigAgent::openai_builder()
            .provider(provider)?
            .agent_name("chatbot")
            .build()?,
    );

    let chatbot = move |state: MessagesState| {
        let llm = Arc::clone(&llm);
        async move {
            let reply = llm.chat(state.messages).await?;
            Ok::<_, AgentError>(vec![Message::assistant(llm.name(), reply)])
        }
    };

    let mut builder = StateGraph::new();
    builder.add_node("chatbot", chatbot)?;
    builder.add_edge(START, "chatbot")?;
    builder.add_edge("chatbot", END)?;
    let graph = builder.compile()?;

    let graph_file = std::env::current_dir()?.join(GRAPH_FILE);
    match tokio::fs::write(&graph_file, graph.draw_mermaid()).await {
        Ok(()) => println!("Graph visualization saved to: {}", graph_file.display()),
        Err(err) => println!("Could not generate graph visualization: {err}"),
    }

    Repl::stdin("User: ")
        .run(|input| stream_graph_updates(&graph, input))
        .await?;
    Ok(())
}

async fn stream_graph_updates(
    graph: &CompiledGraph<MessagesState>,
    input: String,
) -> Result<(), GraphError> {
    let state = MessagesState::new(vec![Message::user("User", input)]);
    let mut events = pin!(graph.stream(state));
    while let Some(event) = events.next().await {
        if let Some(message) = event?.update.last() {
            println!("Assistant: {}", message.content);
        }
    }
    Ok(())
}
