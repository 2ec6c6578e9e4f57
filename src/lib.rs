//! Recipes for building LLM programs on top of rig.
//!
//! Rigbook adds a thin, typed layer over [`rig`] so that each of its programs
//! (a chat graph, prompt chains, prompting strategies, a PDF question
//! answering console and two tool-calling agents) stays a short sequence of
//! calls. At a high level, it provides:
//!
//! * Tools for [working with agents][agents], including
//!   [configuration][agent_config], [providers][llm_provider] and [rig-backed agents][rig_agent].
//! * A [state graph runner][graph] with conditional edges, streaming and Mermaid export.
//! * [Prompt templates and chains][chain], sequential or parallel, and five [prompting strategies][prompting].
//! * Two tool-calling loops: an [agent executor][executor] and a [ReAct agent][react],
//!   sharing the [weather and time tools][tools].
//! * [Retrieval-augmented generation][rag] over PDFs with an on-disk vector index.
//! * APIs for [conversations][conversation], [persistence], [settings][config],
//!   [logging][telemetry] and the interactive [loop][repl].
//!
//! [agents]: #working-with-agents
//! [agent_config]: crate::agent::AgentConfig
//! [llm_provider]: crate::llm_provider
//! [rig_agent]: crate::rig_agent
//! [graph]: crate::graph
//! [chain]: crate::chain
//! [prompting]: crate::prompting
//! [executor]: crate::executor
//! [react]: crate::react
//! [tools]: crate::tools
//! [rag]: crate::rag
//! [conversation]: crate::conversation
//! [persistence]: crate::persistence
//! [config]: crate::config
//! [telemetry]: crate::telemetry
//! [repl]: crate::repl
//!
//! # A Tour of Rigbook
//!
//! ## Working With Agents
//!
//! The [`Agent`] trait answers a task or continues a chat history. [`RigAgent`]
//! implements it over a rig agent built for a provider:
//!
//! [`Agent`]: crate::agent::Agent
//! [`RigAgent`]: crate::rig_agent::RigAgent
//!
//! ```rust,ignore
//! use rigbook::llm_provider::{LLMProvider, GEMINI_CHAT_MODEL};
//! use rigbook::rig_agent::RigAgent;
//!
//! let provider = LLMProvider::gemini(GEMINI_CHAT_MODEL).with_api_key(api_key);
//! let agent = RigAgent::gemini_builder()
//!     .provider(provider)?
//!     .agent_name("Reviewer")
//!     .system_prompt("You are a helpful assistant.")
//!     .build()?;
//! let answer = agent.run("Summarize in one sentence: ...".to_owned()).await?;
//! ```
//!
//! Tool-calling loops need to see tool calls in the model's reply, so they talk
//! to a [`LanguageModel`] instead; [`RigCompletion`] provides one for any rig
//! completion model.
//!
//! [`LanguageModel`]: crate::completion::LanguageModel
//! [`RigCompletion`]: crate::rig_agent::RigCompletion
//!
//! ## Composing Prompts
//!
//! ```rust,ignore
//! use rigbook::chain::{review_parallel_chain, variables};
//!
//! let chain = review_parallel_chain(agent)?;
//! let output = chain.invoke_all(&variables([("review", review)])).await?;
//! println!("{}", output.get("sentiment").unwrap_or_default());
//! ```
//!
//! ## Running Graphs
//!
//! ```rust,ignore
//! use rigbook::graph::{END, MessagesState, START, StateGraph};
//!
//! let mut graph = StateGraph::<MessagesState>::new();
//! graph.add_node("chatbot", chatbot)?;
//! graph.add_edge(START, "chatbot")?;
//! graph.add_edge("chatbot", END)?;
//! let graph = graph.compile()?;
//! std::fs::write("graph_visualization.mmd", graph.draw_mermaid())?;
//! ```
//!
//! ## Data Persistence
//!
//! The [`persistence`] module saves and loads bytes and compresses them with
//! zstd. The RAG [`VectorStore`] and [`Conversation`] transcripts build on it.
//!
//! [`persistence`]: crate::persistence
//! [`VectorStore`]: crate::rag::VectorStore
//! [`Conversation`]: crate::conversation::Conversation

pub mod agent;
pub mod chain;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod executor;
pub mod graph;
pub mod llm_provider;
pub mod persistence;
pub mod prompting;
pub mod rag;
pub mod react;
pub mod repl;
pub mod rig_agent;
pub mod telemetry;
pub mod tools;

pub use rig;
