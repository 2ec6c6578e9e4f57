//! Interactive tool-calling assistant built on the agent executor.

use std::{convert::Infallible, process::ExitCode};

use rigbook::{
    config::Settings,
    executor::ToolCallingAgent,
    repl::Repl,
    telemetry::init_tracing,
    tools::{ReportStyle, WeatherTool},
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let settings = Settings::load();

    println!("🚀 Rig Tool Calling Agent - AI Assistant with Real-time Tools");
    println!("🔗 Powered by rig + OpenAI API");
    println!("{}", "=".repeat(70));

    let Ok(api_key) = settings.openai_api_key() else {
        println!("❌ Error: OPENAI_API_KEY not found in environment variables");
        println!("Please add your OpenAI API key to a .env file");
        return Ok(ExitCode::FAILURE);
    };
    if settings.weather_api_key.is_none() {
        println!("⚠️  Warning: WEATHER_API_KEY not found. Weather functionality will be limited.");
        println!("Get a free API key from: https://openweathermap.org/api");
    }

    let weather = WeatherTool::new(
        settings.weather_api_key.clone(),
        settings.weather_api_url.clone(),
        ReportStyle::Detailed,
    );
    let provider = ToolCallingAgent::default_provider().with_api_key(api_key);
    let agent = match ToolCallingAgent::new(&provider, weather) {
        Ok(agent) => {
            println!("✅ Agent initialized successfully!");
            agent
        }
        Err(err) => {
            println!("❌ Failed to initialize agent: {err}");
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("\n🎯 Example queries to try:");
    println!("- 'What is the weather in New York?'");
    println!("- 'What time is it?'");
    println!("- 'Tell me about the weather in London and what time it is'");

    Repl::stdin("🗣️  You: ")
        .goodbye("👋 Goodbye!")
        .run(|input| {
            let agent = &agent;
            async move {
                let response = agent.process_query(&input).await;
                println!("\n🤖 Assistant: {response}\n");
                println!("{}", "-".repeat(70));
                Ok::<(), Infallible>(())
            }
        })
        .await?;
    Ok(ExitCode::SUCCESS)
}
