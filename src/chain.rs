//! Prompt templates and the chains built from them.
//!
//! A [`PromptTemplate`] renders `{name}` placeholders from a [`Variables`] map
//! (`{{` and `}}` stand for literal braces). Piping a template into an
//! [`Agent`] gives an [`LlmChain`]; a [`ParallelChain`] runs several named
//! chains over the same variables at once and joins their outputs.

use std::{collections::BTreeMap, fmt, sync::Arc};

use futures::future::{BoxFuture, try_join_all};
use thiserror::Error;

use crate::agent::{Agent, AgentError};

pub type Variables = BTreeMap<String, String>;

/// Build a [`Variables`] map from literal pairs.
pub fn variables<const N: usize>(pairs: [(&str, &str); N]) -> Variables {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value.to_owned()))
        .collect()
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Missing value for template variable '{0}'")]
    MissingVariable(String),
    #[error("Invalid template at byte {position}: {detail}")]
    InvalidTemplate { position: usize, detail: &'static str },
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("Branch '{name}' failed: {source}")]
    Branch {
        name: String,
        #[source]
        source: Box<ChainError>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Clone, Debug)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn from_template(template: &str) -> Result<Self, ChainError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' if chars.peek().is_some_and(|(_, next)| *next == '{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().is_some_and(|(_, next)| *next == '}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(ChainError::InvalidTemplate {
                            position,
                            detail: "unclosed '{'",
                        });
                    }
                    let name = name.trim();
                    if name.is_empty() || name.contains('{') {
                        return Err(ChainError::InvalidTemplate {
                            position,
                            detail: "placeholder needs a name",
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name.to_owned()));
                }
                '}' => {
                    return Err(ChainError::InvalidTemplate {
                        position,
                        detail: "single '}' outside a placeholder",
                    });
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    pub fn format(&self, variables: &Variables) -> Result<String, ChainError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => out.push_str(
                    variables
                        .get(name)
                        .ok_or_else(|| ChainError::MissingVariable(name.clone()))?,
                ),
            }
        }
        Ok(out)
    }

    /// Send the rendered prompt to `agent`.
    pub fn pipe(self, agent: Arc<dyn Agent>) -> LlmChain {
        LlmChain {
            prompt: self,
            agent,
        }
    }
}

pub trait Runnable: Send + Sync {
    fn invoke<'a>(&'a self, variables: &'a Variables) -> BoxFuture<'a, Result<String, ChainError>>;
}

pub struct LlmChain {
    prompt: PromptTemplate,
    agent: Arc<dyn Agent>,
}

impl LlmChain {
    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }
}

impl Runnable for LlmChain {
    fn invoke<'a>(&'a self, variables: &'a Variables) -> BoxFuture<'a, Result<String, ChainError>> {
        Box::pin(async move {
            let prompt = self.prompt.format(variables)?;
            tracing::debug!(agent = %self.agent.name(), %prompt, "invoking chain");
            Ok(self.agent.run(prompt).await?)
        })
    }
}

#[derive(Default)]
pub struct ParallelChain {
    branches: Vec<(String, Box<dyn Runnable>)>,
}

impl ParallelChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn branch(mut self, name: impl Into<String>, runnable: impl Runnable + 'static) -> Self {
        self.branches.push((name.into(), Box::new(runnable)));
        self
    }

    /// Run every branch concurrently. The first failure fails the whole join.
    pub async fn invoke_all(&self, variables: &Variables) -> Result<ParallelOutput, ChainError> {
        let outputs = try_join_all(self.branches.iter().map(|(name, runnable)| async move {
            runnable
                .invoke(variables)
                .await
                .map(|output| (name.clone(), output))
                .map_err(|source| ChainError::Branch {
                    name: name.clone(),
                    source: Box::new(source),
                })
        }))
        .await?;
        Ok(ParallelOutput(outputs))
    }
}

impl Runnable for ParallelChain {
    fn invoke<'a>(&'a self, variables: &'a Variables) -> BoxFuture<'a, Result<String, ChainError>> {
        Box::pin(async move { Ok(self.invoke_all(variables).await?.to_string()) })
    }
}

/// Branch outputs in the order the branches were declared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParallelOutput(Vec<(String, String)>);

impl ParallelOutput {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(branch, _)| branch == name)
            .map(|(_, output)| output.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(name, output)| (name.as_str(), output.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParallelOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (name, output)) in self.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{name}: {}", output.trim_end())?;
        }
        Ok(())
    }
}

pub const REVIEW_ANALYSIS_TEMPLATE: &str = r#"
Analyze the following product review:
"{review}"

Provide your analysis in the following format:
- Sentiment: (positive, negative, or neutral)
- Key Features Mentioned: (list the product features mentioned)
- Summary: (one-sentence summary)
"#;

pub const SENTIMENT_TEMPLATE: &str =
    "Classify sentiment (positive, negative, or neutral):\n\"{review}\"";
pub const FEATURES_TEMPLATE: &str = "Extract product features mentioned:\n\"{review}\"";
pub const SUMMARY_TEMPLATE: &str = "Summarize in one sentence:\n\"{review}\"";

/// One prompt asking for sentiment, features and a summary together.
pub fn review_analysis_chain(agent: Arc<dyn Agent>) -> Result<LlmChain, ChainError> {
    Ok(PromptTemplate::from_template(REVIEW_ANALYSIS_TEMPLATE)?.pipe(agent))
}

/// Sentiment, features and summary as three concurrent prompts.
pub fn review_parallel_chain(agent: Arc<dyn Agent>) -> Result<ParallelChain, ChainError> {
    Ok(ParallelChain::new()
        .branch(
            "sentiment",
            PromptTemplate::from_template(SENTIMENT_TEMPLATE)?.pipe(Arc::clone(&agent)),
        )
        .branch(
            "features",
            PromptTemplate::from_template(FEATURES_TEMPLATE)?.pipe(Arc::clone(&agent)),
        )
        .branch(
            "summary",
            PromptTemplate::from_template(SUMMARY_TEMPLATE)?.pipe(agent),
        ))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::conversation::Message;

    /// Answers every task with a canned reply and remembers what it was asked.
    #[derive(Default)]
    struct EchoAgent {
        prompts: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl Agent for EchoAgent {
        fn run(&self, task: String) -> BoxFuture<'_, Result<String, AgentError>> {
            self.prompts.lock().unwrap().push(task.clone());
            let fail = self.fail_on.is_some_and(|needle| task.contains(needle));
            Box::pin(async move {
                if fail {
                    Err(AgentError::TestError("refused".to_owned()))
                } else {
                    Ok(format!("echo: {}", task.lines().next().unwrap_or_default()))
                }
            })
        }

        fn chat(&self, _history: Vec<Message>) -> BoxFuture<'_, Result<String, AgentError>> {
            Box::pin(async { Err(AgentError::EmptyHistory) })
        }

        fn id(&self) -> String {
            "echo".to_owned()
        }

        fn name(&self) -> String {
            "echo".to_owned()
        }

        fn description(&self) -> String {
            String::new()
        }
    }

    #[test]
    fn formats_placeholders_and_escapes() {
        let template = PromptTemplate::from_template("{{\"{name}\": {value}}} {name}").unwrap();

        assert_eq!(template.placeholders(), ["name", "value"]);
        let rendered = template
            .format(&variables([("name", "k"), ("value", "1")]))
            .unwrap();
        assert_eq!(rendered, "{\"k\": 1} k");
    }

    #[test]
    fn missing_variable_is_named() {
        let template = PromptTemplate::from_template("Translate: {sentence}").unwrap();

        let err = template.format(&Variables::new()).unwrap_err();
        assert!(matches!(err, ChainError::MissingVariable(name) if name == "sentence"));
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(matches!(
            PromptTemplate::from_template("open {brace"),
            Err(ChainError::InvalidTemplate { position: 5, .. })
        ));
        assert!(matches!(
            PromptTemplate::from_template("stray } brace"),
            Err(ChainError::InvalidTemplate { .. })
        ));
        assert!(matches!(
            PromptTemplate::from_template("empty {}"),
            Err(ChainError::InvalidTemplate { .. })
        ));
    }

    #[tokio::test]
    async fn llm_chain_sends_the_rendered_prompt() {
        let agent = Arc::new(EchoAgent::default());
        let chain = review_analysis_chain(Arc::clone(&agent) as Arc<dyn Agent>).unwrap();

        let output = chain
            .invoke(&variables([("review", "Great battery.")]))
            .await
            .unwrap();

        assert_eq!(output, "echo: ");
        let prompts = agent.prompts.lock().unwrap();
        assert!(
            prompts[0].starts_with("\nAnalyze the following product review:\n\"Great battery.\"\n")
        );
    }

    #[tokio::test]
    async fn parallel_chain_keeps_branch_order() {
        let chain = review_parallel_chain(Arc::new(EchoAgent::default())).unwrap();

        let output = chain
            .invoke_all(&variables([("review", "Too slow.")]))
            .await
            .unwrap();

        assert_eq!(output.len(), 3);
        let names: Vec<_> = output.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["sentiment", "features", "summary"]);
        assert_eq!(output.get("summary"), Some("echo: Summarize in one sentence:"));
        assert_eq!(
            output.to_string(),
            "sentiment: echo: Classify sentiment (positive, negative, or neutral):\n\
             features: echo: Extract product features mentioned:\n\
             summary: echo: Summarize in one sentence:"
        );
    }

    /// Every call waits until `barrier` is full, so calls only finish when they overlap.
    struct BarrierAgent {
        barrier: tokio::sync::Barrier,
    }

    impl Agent for BarrierAgent {
        fn run(&self, task: String) -> BoxFuture<'_, Result<String, AgentError>> {
            Box::pin(async move {
                self.barrier.wait().await;
                Ok(task.len().to_string())
            })
        }

        fn chat(&self, _history: Vec<Message>) -> BoxFuture<'_, Result<String, AgentError>> {
            Box::pin(async { Err(AgentError::EmptyHistory) })
        }

        fn id(&self) -> String {
            "barrier".to_owned()
        }

        fn name(&self) -> String {
            "barrier".to_owned()
        }

        fn description(&self) -> String {
            String::new()
        }
    }

    #[tokio::test]
    async fn parallel_branches_run_concurrently() {
        let agent = Arc::new(BarrierAgent {
            barrier: tokio::sync::Barrier::new(3),
        });
        let chain = review_parallel_chain(agent).unwrap();

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            chain.invoke_all(&variables([("review", "Loud fan.")])),
        )
        .await
        .expect("branches waited on each other")
        .unwrap();

        assert_eq!(output.len(), 3);
    }

    #[tokio::test]
    async fn one_failing_branch_fails_the_join() {
        let agent = Arc::new(EchoAgent {
            fail_on: Some("Extract"),
            ..EchoAgent::default()
        });
        let chain = review_parallel_chain(agent).unwrap();

        let err = chain
            .invoke_all(&variables([("review", "Fine.")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Branch { name, .. } if name == "features"));
    }
}
