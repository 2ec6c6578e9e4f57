//! Interactive ReAct agent with weather and time tools and per-session memory.

use std::{convert::Infallible, process::ExitCode};

use clap::Parser;
use rigbook::{
    config::Settings,
    react::{DEFAULT_THREAD_ID, ReactAgent},
    repl::Repl,
    telemetry::init_tracing,
    tools::{ReportStyle, WeatherTool},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Conversation thread whose history the agent keeps
    #[arg(long, default_value = DEFAULT_THREAD_ID)]
    thread_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let args = Args::parse();
    let settings = Settings::load();

    let Ok(api_key) = settings.openai_api_key() else {
        println!("❌ Error: OPENAI_API_KEY not found in environment variables.");
        println!("Please create a .env file with your OpenAI API key.");
        return Ok(ExitCode::FAILURE);
    };

    println!("🤖 Rig ReAct Agent");
    println!("{}", "=".repeat(60));
    println!("This agent reasons step by step and calls tools when it needs them.");
    println!("It can help you with:");
    println!("• Weather information (e.g., 'What's the weather in London?')");
    println!("• Current time (e.g., 'What time is it?')");
    println!("• Type 'quit' to exit");
    println!("{}", "=".repeat(60));

    let weather = WeatherTool::new(
        settings.weather_api_key.clone(),
        settings.weather_api_url.clone(),
        ReportStyle::Brief,
    );
    let provider = ReactAgent::default_provider().with_api_key(api_key);
    let agent = ReactAgent::openai(&provider, weather)?;

    Repl::stdin("\n💬 You: ")
        .goodbye("👋 Goodbye!")
        .run(|input| {
            let agent = &agent;
            let thread_id = args.thread_id.as_str();
            async move {
                println!("\n🤔 Agent is thinking...");
                match agent.invoke(thread_id, &input).await {
                    Ok(reply) => println!("\n🤖 Agent: {reply}"),
                    Err(err) => {
                        println!("\n❌ Error: {err}");
                        println!("Please try again.");
                    }
                }
                Ok::<(), Infallible>(())
            }
        })
        .await?;
    Ok(ExitCode::SUCCESS)
}
