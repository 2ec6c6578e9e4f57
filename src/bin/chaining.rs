//! Product review analysis, as one prompt or as three prompts run in parallel.
//! The built-in reviews run first, then reviews are read from stdin.

use std::sync::Arc;

use clap::Parser;
use rigbook::{
    agent::Agent,
    chain::{ChainError, Runnable, review_analysis_chain, review_parallel_chain, variables},
    config::Settings,
    llm_provider::{GEMINI_CHAT_MODEL, LLMProvider},
    repl::Repl,
    rig_agent::RigAgent,
    telemetry::init_tracing,
};

const REVIEWS: [&str; 2] = [
    "I love this smartphone! The camera quality is exceptional and the battery lasts all day. The only downside is that it heats up a bit during gaming.",
    "This laptop is terrible. It's slow, crashes frequently, and the keyboard stopped working after just two months. Customer service was unhelpful.",
];

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Ask for sentiment, features and summary as three concurrent prompts
    #[arg(short, long)]
    parallel: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = Settings::load();

    let provider = LLMProvider::gemini(GEMINI_CHAT_MODEL).with_api_key(settings.google_api_key()?);
    let llm: Arc<dyn Agent> = Arc::new(
        RigAgent::gemini_builder()
            .provider(provider)?
            .agent_name("ReviewAnalyst")
            .build()?,
    );

    let chain: Box<dyn Runnable> = if args.parallel {
        Box::new(review_parallel_chain(llm)?)
    } else {
        Box::new(review_analysis_chain(llm)?)
    };

    for review in REVIEWS {
        analyze(chain.as_ref(), review).await?;
    }

    println!("Enter a product review to analyze ('quit' to exit).");
    Repl::stdin("Review: ")
        .run(|review| analyze(chain.as_ref(), review))
        .await?;
    Ok(())
}

async fn analyze(chain: &dyn Runnable, review: impl AsRef<str>) -> Result<(), ChainError> {
    let result = chain
        .invoke(&variables([("review", review.as_ref())]))
        .await?;
    println!("{result}");
    println!("{}", "-".repeat(40));
    Ok(())
}
