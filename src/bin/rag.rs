//! Menu-driven console: load PDFs into the vector index and ask questions about them.

use clap::Parser;
use rigbook::{
    config::Settings,
    rag::{Answer, RagApplication},
    repl::Repl,
    telemetry::init_tracing,
};

const RULE_WIDTH: usize = 60;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Load this PDF before showing the menu
    #[arg(short, long)]
    pdf: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = Settings::load();

    println!("🚀 Welcome to the RAG Application!");
    println!("This application allows you to load PDF documents and ask questions about them.");
    println!("{}", "=".repeat(RULE_WIDTH));

    if settings.openai_api_key().is_err() {
        println!("❌ Error: OPENAI_API_KEY not found in environment variables.");
        println!("Please set your OpenAI API key in a .env file or environment variable.");
        return Ok(());
    }

    let mut app = match RagApplication::new(&settings).await {
        Ok(app) => app,
        Err(err) => {
            println!("❌ Error initializing RAG application: {err}");
            return Ok(());
        }
    };
    if app.has_vectorstore() {
        println!("✅ Loaded existing vector store from {}", settings.vector_dir.display());
    } else {
        println!("📂 No existing vector store found. Load a PDF to create one.");
    }
    println!("📊 {}", app.vectorstore_info());

    if let Some(pdf) = args.pdf {
        load_into(&mut app, &pdf.to_string_lossy()).await;
    }

    let mut console = Repl::stdin("");
    loop {
        println!("\n{}", "=".repeat(RULE_WIDTH));
        println!("Choose an option:");
        println!("1. Load a PDF file");
        println!("2. Ask a question");
        println!("3. Show vectorstore info");
        println!("4. Exit");

        let Some(choice) = console.read_line("\nEnter your choice (1-4): ").await? else {
            println!("👋 Goodbye!");
            break;
        };

        match choice.as_str() {
            "1" => {
                let Some(path) = console.read_line("Enter the path to your PDF file: ").await?
                else {
                    continue;
                };
                load_into(&mut app, &path).await;
            }
            "2" => {
                if !app.has_vectorstore() {
                    println!("⚠️  No documents loaded yet. Please load a PDF first.");
                    continue;
                }
                let question = console
                    .read_line("Enter your question: ")
                    .await?
                    .unwrap_or_default();
                if question.is_empty() {
                    println!("⚠️  Please enter a valid question.");
                    continue;
                }
                println!("❓ Question: {question}");
                println!("🤔 Thinking...");
                match app.ask_question(&question).await {
                    Ok(answer) => print_answer(&answer),
                    Err(err) => println!("❌ Error answering question: {err}"),
                }
            }
            "3" => println!("📊 {}", app.vectorstore_info()),
            "4" => {
                println!("👋 Goodbye!");
                break;
            }
            _ => println!("⚠️  Invalid choice. Please enter 1, 2, 3, or 4."),
        }
    }
    Ok(())
}

async fn load_into(app: &mut RagApplication, path: &str) {
    println!("📄 Loading PDF: {path}");
    let existed = app.has_vectorstore();
    let result = match app.load_pdf(path).await {
        Ok(chunks) => {
            println!("📝 Split PDF into {} chunks", chunks.len());
            app.add_documents(chunks).await
        }
        Err(err) => Err(err),
    };
    match result {
        Ok(added) => {
            if existed {
                println!("➕ Added {added} new chunks to the existing vector store");
            } else {
                println!("🆕 Created new vector store with {added} chunks");
            }
            println!("✅ PDF successfully loaded and stored in the vector store!");
        }
        Err(err) => println!("❌ Error loading PDF: {err}"),
    }
}

fn print_answer(answer: &Answer) {
    println!("💡 Answer: {}", answer.answer);
    println!("\n📚 Sources ({} documents):", answer.sources.len());
    for (i, source) in answer.sources.iter().enumerate() {
        println!(
            "  {}. {} (Page {})",
            i + 1,
            source.metadata.source,
            source.metadata.page
        );
    }
}
