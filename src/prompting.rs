//! Five prompting strategies behind one dispatcher.

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::{
    agent::{Agent, AgentError},
    chain::{ChainError, PromptTemplate, Variables, variables},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PromptType {
    ZeroShot,
    OneShot,
    FewShot,
    ChainOfThought,
    SelfConsistency,
}

impl PromptType {
    pub const ALL: [PromptType; 5] = [
        PromptType::ZeroShot,
        PromptType::OneShot,
        PromptType::FewShot,
        PromptType::ChainOfThought,
        PromptType::SelfConsistency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PromptType::ZeroShot => "zero_shot",
            PromptType::OneShot => "one_shot",
            PromptType::FewShot => "few_shot",
            PromptType::ChainOfThought => "chain_of_thought",
            PromptType::SelfConsistency => "self_consistency",
        }
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptType {
    type Err = PromptingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        PromptType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| PromptingError::Unsupported(value.to_owned()))
    }
}

#[derive(Debug, Error)]
pub enum PromptingError {
    #[error("Unsupported prompt type: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Template(#[from] ChainError),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Inputs for every strategy; each one reads only the fields it needs.
#[derive(Clone, Debug)]
pub struct PromptArgs {
    pub sentence: String,
    pub target_language: String,
    pub review: String,
    pub input_word: String,
    pub question: String,
}

impl Default for PromptArgs {
    fn default() -> Self {
        Self {
            sentence: String::new(),
            target_language: "French".to_owned(),
            review: String::new(),
            input_word: String::new(),
            question: String::new(),
        }
    }
}

impl PromptArgs {
    pub fn sentence(mut self, sentence: impl Into<String>) -> Self {
        self.sentence = sentence.into();
        self
    }

    pub fn target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = language.into();
        self
    }

    pub fn review(mut self, review: impl Into<String>) -> Self {
        self.review = review.into();
        self
    }

    pub fn input_word(mut self, word: impl Into<String>) -> Self {
        self.input_word = word.into();
        self
    }

    pub fn question(mut self, question: impl Into<String>) -> Self {
        self.question = question.into();
        self
    }
}

const ONE_SHOT_TEMPLATE: &str = concat!(
    "You are a sentiment classifier. \n",
    "    Example:\n",
    "    Review: \"I love this phone, it's fast and reliable.\"\n",
    "    Sentiment: Positive\n",
    "\n",
    "    Now classify the next review:\n",
    "    Review: {review}\n",
    "    Sentiment:",
);

const CHAIN_OF_THOUGHT_TEMPLATE: &str = concat!(
    "Solve the problem step by step, then give the final answer.\n",
    "\n",
    "    Question: {qs}\n",
    "\n",
    "    Answer: Let's think step by step.",
);

const SELF_CONSISTENCY_TEMPLATE: &str = concat!(
    "Solve the following problem in three *independent* ways, \n",
    "            each with reasoning and a final answer.\n",
    "\n",
    "            Problem:\n",
    "            {qs}\n",
    "\n",
    "            Provide three calculations and explanations, then end with:\n",
    "            Final Answer:",
);

const ANTONYMS: [(&str, &str); 4] = [
    ("big", "small"),
    ("happy", "sad"),
    ("light", "dark"),
    ("fast", "slow"),
];

/// Examples rendered through `example_prompt`, framed by `prefix` and `suffix`
/// and joined with `separator`. Empty pieces are left out.
#[derive(Clone, Debug)]
pub struct FewShotTemplate {
    pub examples: Vec<Variables>,
    pub example_prompt: PromptTemplate,
    pub prefix: String,
    pub suffix: PromptTemplate,
    pub separator: String,
}

impl FewShotTemplate {
    pub fn new(
        examples: Vec<Variables>,
        example_prompt: PromptTemplate,
        suffix: PromptTemplate,
    ) -> Self {
        Self {
            examples,
            example_prompt,
            prefix: String::new(),
            suffix,
            separator: "\n\n".to_owned(),
        }
    }

    pub fn format(&self, input: &Variables) -> Result<String, ChainError> {
        let mut pieces = Vec::with_capacity(self.examples.len() + 2);
        pieces.push(self.prefix.clone());
        for example in &self.examples {
            pieces.push(self.example_prompt.format(example)?);
        }
        pieces.push(self.suffix.format(input)?);

        Ok(pieces
            .into_iter()
            .filter(|piece| !piece.is_empty())
            .collect::<Vec<_>>()
            .join(&self.separator))
    }
}

fn antonym_template() -> Result<FewShotTemplate, ChainError> {
    let examples = ANTONYMS
        .iter()
        .map(|&(word, antonym)| variables([("word", word), ("antonym", antonym)]))
        .collect();
    Ok(FewShotTemplate::new(
        examples,
        PromptTemplate::from_template("Word: {word}\nAntonym: {antonym}")?,
        PromptTemplate::from_template("Word: {input}\nAntonym:")?,
    ))
}

fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

/// Render the prompt `kind` sends for `args`.
pub fn build_prompt(kind: PromptType, args: &PromptArgs) -> Result<String, PromptingError> {
    let prompt = match kind {
        PromptType::ZeroShot => PromptTemplate::from_template(&format!(
            "Translate the following sentence to {}:\n{{sentence}}",
            escape_braces(&args.target_language)
        ))?
        .format(&variables([("sentence", args.sentence.as_str())]))?,
        PromptType::OneShot => PromptTemplate::from_template(ONE_SHOT_TEMPLATE)?
            .format(&variables([("review", args.review.as_str())]))?,
        PromptType::FewShot => {
            antonym_template()?.format(&variables([("input", args.input_word.as_str())]))?
        }
        PromptType::ChainOfThought => PromptTemplate::from_template(CHAIN_OF_THOUGHT_TEMPLATE)?
            .format(&variables([("qs", args.question.as_str())]))?,
        PromptType::SelfConsistency => PromptTemplate::from_template(SELF_CONSISTENCY_TEMPLATE)?
            .format(&variables([("qs", args.question.as_str())]))?,
    };
    Ok(prompt)
}

/// Send the rendered prompt to `agent` and return its text, trimmed.
pub async fn execute_prompt(
    agent: &dyn Agent,
    kind: PromptType,
    args: &PromptArgs,
) -> Result<String, PromptingError> {
    let prompt = build_prompt(kind, args)?;
    tracing::debug!(%kind, %prompt, "executing prompt");
    let output = agent.run(prompt).await?;
    Ok(output.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::conversation::Message;

    struct Parrot;

    impl Agent for Parrot {
        fn run(&self, task: String) -> BoxFuture<'_, Result<String, AgentError>> {
            Box::pin(async move { Ok(format!("\n  {task}  \n")) })
        }

        fn chat(&self, _history: Vec<Message>) -> BoxFuture<'_, Result<String, AgentError>> {
            Box::pin(async { Err(AgentError::EmptyHistory) })
        }

        fn id(&self) -> String {
            "parrot".to_owned()
        }

        fn name(&self) -> String {
            "parrot".to_owned()
        }

        fn description(&self) -> String {
            String::new()
        }
    }

    #[test]
    fn prompt_types_parse_from_their_names() {
        for kind in PromptType::ALL {
            assert_eq!(kind.to_string().parse::<PromptType>().unwrap(), kind);
        }
        assert_eq!(
            "chain_of_thought".parse::<PromptType>().unwrap(),
            PromptType::ChainOfThought
        );

        let err = "tree_of_thought".parse::<PromptType>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported prompt type: tree_of_thought");
    }

    #[test]
    fn zero_shot_defaults_to_french() {
        let prompt = build_prompt(
            PromptType::ZeroShot,
            &PromptArgs::default().sentence("Hello, how are you?"),
        )
        .unwrap();
        assert_eq!(
            prompt,
            "Translate the following sentence to French:\nHello, how are you?"
        );

        let prompt = build_prompt(
            PromptType::ZeroShot,
            &PromptArgs::default()
                .sentence("Good night")
                .target_language("{German}"),
        )
        .unwrap();
        assert_eq!(prompt, "Translate the following sentence to {German}:\nGood night");
    }

    #[test]
    fn few_shot_joins_examples_with_blank_lines() {
        let prompt =
            build_prompt(PromptType::FewShot, &PromptArgs::default().input_word("hot")).unwrap();
        assert_eq!(
            prompt,
            "Word: big\nAntonym: small\n\n\
             Word: happy\nAntonym: sad\n\n\
             Word: light\nAntonym: dark\n\n\
             Word: fast\nAntonym: slow\n\n\
             Word: hot\nAntonym:"
        );
    }

    #[test]
    fn question_templates_embed_the_question() {
        let args = PromptArgs::default().question("What is 2 + 2?");

        let cot = build_prompt(PromptType::ChainOfThought, &args).unwrap();
        assert!(cot.contains("    Question: What is 2 + 2?\n"));
        assert!(cot.ends_with("Let's think step by step."));

        let sc = build_prompt(PromptType::SelfConsistency, &args).unwrap();
        assert!(sc.starts_with("Solve the following problem in three *independent* ways, \n"));
        assert!(sc.contains("            What is 2 + 2?\n"));
        assert!(sc.ends_with("Final Answer:"));
    }

    #[test]
    fn one_shot_keeps_the_worked_example() {
        let prompt = build_prompt(
            PromptType::OneShot,
            &PromptArgs::default().review("I hate this product! It's terrible."),
        )
        .unwrap();
        assert!(prompt.contains("    Sentiment: Positive\n\n"));
        assert!(prompt.ends_with("Review: I hate this product! It's terrible.\n    Sentiment:"));
    }

    #[tokio::test]
    async fn execute_prompt_trims_the_answer() {
        let output = execute_prompt(
            &Parrot,
            PromptType::ZeroShot,
            &PromptArgs::default().sentence("Hi"),
        )
        .await
        .unwrap();
        assert_eq!(output, "Translate the following sentence to French:\nHi");
    }
}
