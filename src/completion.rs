//! The seam between the agent loops and a concrete chat model.
//!
//! Tool-calling loops need more than `prompt -> text`: they send tool
//! definitions with the history and must see tool calls in the reply.
//! [`LanguageModel`] captures that exchange; [`crate::rig_agent::RigCompletion`]
//! implements it over any rig completion model.

use futures::future::BoxFuture;
use rig::completion::ToolDefinition;

use crate::{
    agent::AgentError,
    conversation::{Message, ToolInvocation},
};

/// One request to the model: system preamble, full history (last entry is the
/// newest turn), and the tools the model may call.
#[derive(Clone, Debug)]
pub struct ModelRequest {
    pub preamble: String,
    pub history: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f64>,
}

/// What the model answered: free text, tool calls, or both.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelTurn {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
}

impl ModelTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolInvocation>) -> Self {
        Self {
            text: None,
            tool_calls,
        }
    }

    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

pub trait LanguageModel: Send + Sync {
    fn complete(&self, request: ModelRequest) -> BoxFuture<'_, Result<ModelTurn, AgentError>>;
}
