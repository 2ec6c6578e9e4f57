//! Tools exposed to the tool-calling agents.
//!
//! Every tool implements rig's [`Tool`] trait. A [`Toolbox`] keeps them in
//! registration order, hands their definitions to the model, and dispatches
//! the calls the model makes.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rig::{
    completion::ToolDefinition,
    tool::{Tool, ToolDyn},
};
use schemars::JsonSchema;
use serde_json::Value;

use crate::conversation::{ToolInvocation, ToolOutcome};

pub mod time;
pub mod weather;

pub use time::TimeTool;
pub use weather::{ReportStyle, WeatherTool};

/// Source of the current instant, so time-dependent output can be pinned in tests.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Default)]
pub struct Toolbox {
    tools: Vec<Box<dyn ToolDyn>>,
}

impl Toolbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Box::new(tool));
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        join_all(
            self.tools
                .iter()
                .map(|tool| tool.definition(String::new())),
        )
        .await
    }

    /// Run one invocation. Failures become the observation text so the model can react to them.
    pub async fn call(&self, invocation: &ToolInvocation) -> ToolOutcome {
        let output = match self.tools.iter().find(|tool| tool.name() == invocation.name) {
            Some(tool) => match tool.call(arguments_json(&invocation.arguments)).await {
                Ok(output) => unquote(output),
                Err(err) => {
                    tracing::warn!(tool = %invocation.name, %err, "tool call failed");
                    format!("Error: {err}")
                }
            },
            None => format!("Unknown tool: {}", invocation.name),
        };

        ToolOutcome {
            id: invocation.id.clone(),
            name: invocation.name.clone(),
            output,
        }
    }
}

// Some providers hand back the arguments as a JSON document inside a string.
fn arguments_json(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        Value::Null => "{}".to_owned(),
        other => other.to_string(),
    }
}

// Tool outputs are serialized with serde_json; text outputs arrive quoted.
fn unquote(output: String) -> String {
    match serde_json::from_str::<Value>(&output) {
        Ok(Value::String(text)) => text,
        _ => output,
    }
}

/// JSON schema of a tool's argument type, without the meta keys providers reject.
pub(crate) fn parameters_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
    if let Value::Object(map) = &mut schema {
        map.remove("$schema");
        map.remove("title");
    }
    schema
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn toolbox() -> Toolbox {
        let mut clock = MockClock::new();
        clock
            .expect_now()
            .returning(|| Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());
        Toolbox::new().with_tool(TimeTool::with_clock(clock))
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let toolbox = toolbox();
        let outcome = toolbox
            .call(&ToolInvocation {
                id: "call_7".to_owned(),
                name: "get_current_time".to_owned(),
                arguments: serde_json::json!({ "timezone": "UTC" }),
            })
            .await;

        assert_eq!(outcome.id, "call_7");
        assert!(outcome.output.starts_with("Current Time Information:"));
        assert!(outcome.output.contains("Time: 12:00:00"));
    }

    #[tokio::test]
    async fn stringified_arguments_are_accepted() {
        let outcome = toolbox()
            .call(&ToolInvocation {
                id: "1".to_owned(),
                name: "get_current_time".to_owned(),
                arguments: Value::String(r#"{"timezone":"JST"}"#.to_owned()),
            })
            .await;

        assert!(outcome.output.contains("Timezone: Asia/Tokyo"));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_the_model() {
        let outcome = toolbox()
            .call(&ToolInvocation {
                id: "1".to_owned(),
                name: "launch_rocket".to_owned(),
                arguments: Value::Null,
            })
            .await;

        assert_eq!(outcome.output, "Unknown tool: launch_rocket");
    }

    #[tokio::test]
    async fn definitions_follow_registration_order() {
        let toolbox = Toolbox::new()
            .with_tool(WeatherTool::new(None, "http://localhost", ReportStyle::Brief))
            .with_tool(TimeTool::new());

        let names: Vec<_> = toolbox
            .definitions()
            .await
            .into_iter()
            .map(|definition| definition.name)
            .collect();
        assert_eq!(names, ["get_weather", "get_current_time"]);
        assert_eq!(toolbox.names(), names);
    }
}
