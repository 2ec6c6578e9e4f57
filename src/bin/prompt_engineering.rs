//! Zero-shot, one-shot, few-shot, chain-of-thought and self-consistency prompts.
//! After the worked examples, stdin lines are run through one strategy.

use clap::Parser;
use rigbook::{
    config::Settings,
    llm_provider::{GEMINI_CHAT_MODEL, LLMProvider},
    prompting::{PromptArgs, PromptType, PromptingError, execute_prompt},
    repl::Repl,
    rig_agent::RigAgent,
    telemetry::init_tracing,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Run only this strategy (zero_shot, one_shot, few_shot, chain_of_thought, self_consistency)
    #[arg(short = 't', long)]
    prompt_type: Option<PromptType>,
}

/// Put `input` in the field that `kind` reads.
fn user_args(kind: PromptType, input: String) -> PromptArgs {
    let args = PromptArgs::default();
    match kind {
        PromptType::ZeroShot => args.sentence(input),
        PromptType::OneShot => args.review(input),
        PromptType::FewShot => args.input_word(input),
        PromptType::ChainOfThought | PromptType::SelfConsistency => args.question(input),
    }
}

fn example(kind: PromptType) -> (&'static str, PromptArgs) {
    let args = PromptArgs::default();
    match kind {
        PromptType::ZeroShot => ("Zero-Shot Example", args.sentence("Hello, how are you?")),
        PromptType::OneShot => (
            "One-Shot Example",
            args.review("I hate this product! It's terrible."),
        ),
        PromptType::FewShot => ("Few-Shot Learning Example", args.input_word("hot")),
        PromptType::ChainOfThought => (
            "Chain of Thought Example",
            args.question(
                "A shopkeeper buys 12 pens at $1.50 each and sells them all for $24. What is his profit percentage?",
            ),
        ),
        PromptType::SelfConsistency => (
            "Self Consistency Example",
            args.question(
                "When I was 6, my sister was half my age. Now I am 70, what age is my sister?",
            ),
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = Settings::load();

    let provider = LLMProvider::gemini(GEMINI_CHAT_MODEL).with_api_key(settings.google_api_key()?);
    let llm = RigAgent::gemini_builder()
        .provider(provider)?
        .agent_name("PromptEngineer")
        .build()?;

    let kinds = match args.prompt_type {
        Some(kind) => vec![kind],
        None => PromptType::ALL.to_vec(),
    };
    for (index, kind) in kinds.into_iter().enumerate() {
        let (title, prompt_args) = example(kind);
        let separator = if index == 0 { "" } else { "\n" };
        println!("{separator}=== {title} ===");
        let result = execute_prompt(&llm, kind, &prompt_args).await?;
        println!("{result}");
    }

    let kind = args.prompt_type.unwrap_or(PromptType::ChainOfThought);
    println!("\n=== Try it yourself ({kind}) ===");
    Repl::stdin("Input: ")
        .run(|input| {
            let llm = &llm;
            async move {
                let result = execute_prompt(llm, kind, &user_args(kind, input)).await?;
                println!("{result}");
                Ok::<_, PromptingError>(())
            }
        })
        .await?;
    Ok(())
}
