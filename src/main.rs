use anyhow::Context;
use clap::{Parser, Subcommand};
use docqa::provider::{HttpEmbedder, HttpGenerator};
use docqa::{Engine, IndexHandle, Settings};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default location for the persisted index.
const DEFAULT_INDEX_PATH: &str = ".docqa/index.json";

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Grounded question answering over a single document")]
struct Cli {
    /// Path to a TOML settings file (defaults to docqa.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the vector index for a document and save it
    Index {
        /// Document to ingest (UTF-8 text; form feeds separate pages)
        file: PathBuf,

        /// Where to write the index
        #[arg(short, long, default_value = DEFAULT_INDEX_PATH)]
        output: PathBuf,
    },

    /// Ask a single question against a saved index
    Ask {
        /// The question to answer
        question: String,

        /// Index to load
        #[arg(short, long, default_value = DEFAULT_INDEX_PATH)]
        index: PathBuf,

        /// Number of passages to retrieve (overrides config)
        #[arg(short)]
        k: Option<usize>,

        /// Minimum similarity score (overrides config)
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Ingest a document and answer questions interactively
    Chat {
        /// Document to ingest
        file: PathBuf,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    docqa::logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Index { file, output } => cmd_index(&settings, &file, &output).await,
        Commands::Ask {
            question,
            index,
            k,
            threshold,
        } => cmd_ask(&settings, &question, &index, k, threshold).await,
        Commands::Chat { file } => cmd_chat(&settings, &file).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

fn build_engine(settings: &Settings) -> Engine {
    let embedder = Arc::new(HttpEmbedder::new(&settings.provider));
    let generator = Arc::new(HttpGenerator::new(&settings.provider));
    Engine::new(embedder, generator, settings.clone())
}

async fn cmd_index(settings: &Settings, file: &Path, output: &Path) -> anyhow::Result<()> {
    let engine = build_engine(settings);
    let document = docqa::loader::load(file)
        .with_context(|| format!("failed to load {}", file.display()))?;

    println!("Building index for {}...", document.id);
    let handle = engine.build_index(document).await?;
    docqa::index::save(&handle, output)?;
    println!(
        "Indexed {} chunks. Saved to {}",
        handle.len(),
        output.display()
    );
    Ok(())
}

async fn cmd_ask(
    settings: &Settings,
    question: &str,
    index_path: &Path,
    k: Option<usize>,
    threshold: Option<f32>,
) -> anyhow::Result<()> {
    let engine = build_engine(settings);
    let index = docqa::index::load(index_path, &settings.provider.embedding_model)
        .with_context(|| format!("failed to load index from {}", index_path.display()))?;
    let handle = engine.install_index(index).await;

    let answer = engine
        .ask(
            &handle,
            question,
            k.unwrap_or(settings.retrieval.k),
            threshold.unwrap_or(settings.retrieval.score_threshold),
        )
        .await?;

    print_answer(&answer);
    Ok(())
}

async fn cmd_chat(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    let engine = build_engine(settings);
    let document = docqa::loader::load(file)
        .with_context(|| format!("failed to load {}", file.display()))?;

    println!("Building index for {}...", document.id);
    let handle: IndexHandle = engine.build_index(document).await?;
    println!("Ready. Ask questions!\n");

    let stdin = std::io::stdin();
    loop {
        print!("Ask a question (or type 'exit'): ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            break;
        }

        match engine.ask_with_defaults(&handle, question).await {
            Ok(answer) => {
                print_answer(&answer);
                println!("{}", "-".repeat(60));
            }
            Err(err) => eprintln!("error: {err}"),
        }
    }

    Ok(())
}

fn print_answer(answer: &docqa::Answer) {
    println!("\nAnswer:\n{}", answer.text);
    if answer.grounded && !answer.citations.is_empty() {
        let cited: Vec<String> = answer.citations.iter().map(|c| c.to_string()).collect();
        println!("(grounded in passages {})", cited.join(", "));
    }
}
