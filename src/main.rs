use docent::api::{ApiState, start_http_server};
use docent::config::{Config, LlmConfig};
use docent::embedding::{Embedder, EmbeddingModel};
use docent::error::{ConfigError, LlmError};
use docent::ingest::{Ingestor, TextSplitter};
use docent::llm::{LanguageModel, RigLanguageModel};
use docent::query::{ConversationTurn, QueryOptions, QueryPipeline};
use docent::vector::LanceIndex;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use rig::client::{CompletionClient, ProviderClient};
use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "docent", version, about = "Ask questions about your documents")]
struct Cli {
    /// Path to a config file (defaults to ./docent.toml if present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the vector index.
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split, embed, and index a text file.
    Ingest {
        /// Text file to ingest.
        source: PathBuf,
        /// Maximum characters per chunk.
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Characters shared between consecutive chunks.
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Ask a single question with no prior conversation.
    Ask {
        question: String,
    },
    /// Interactive conversation in the terminal.
    Chat,
    /// Serve the chat API over HTTP.
    Serve {
        /// Address to listen on.
        #[arg(long)]
        bind: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    if let Some(threads) = default_omp_threads(std::env::var_os("OMP_NUM_THREADS")) {
        // SAFETY: no other threads exist yet; the logger and tokio runtime
        // are started below.
        unsafe { std::env::set_var("OMP_NUM_THREADS", threads) };
    }

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(index_dir) = &cli.index_dir {
        config.index.directory = index_dir.clone();
    }

    let _log_guard = docent::logging::init(&config.logging, cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(run(cli.command, config))
}

/// Cap ONNX Runtime threads to limit memory pressure, unless the user
/// already chose a value.
fn default_omp_threads(current: Option<OsString>) -> Option<&'static str> {
    current.is_none().then_some("2")
}

async fn run(command: Command, mut config: Config) -> anyhow::Result<()> {
    match command {
        Command::Ingest {
            source,
            chunk_size,
            chunk_overlap,
        } => {
            if let Some(chunk_size) = chunk_size {
                config.ingest.chunk_size = chunk_size;
            }
            if let Some(chunk_overlap) = chunk_overlap {
                config.ingest.chunk_overlap = chunk_overlap;
            }
            config.validate()?;
            ingest(&config, &source).await
        }
        Command::Ask { question } => {
            let pipeline = build_pipeline(&config).await?;
            let answer = pipeline.respond(&question, &[]).await?;
            println!("{answer}");
            Ok(())
        }
        Command::Chat => {
            let pipeline = build_pipeline(&config).await?;
            chat_loop(&pipeline).await
        }
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            serve(&config).await
        }
    }
}

async fn ingest(config: &Config, source: &std::path::Path) -> anyhow::Result<()> {
    let embedder = load_embedder(config)?;
    let index = Arc::new(LanceIndex::open(&config.index.directory, config.embedding.dimensions).await?);

    let splitter = TextSplitter::new(config.ingest.chunk_size, config.ingest.chunk_overlap)?;
    let ingestor = Ingestor::new(
        splitter,
        embedder,
        index.clone(),
        config.embedding.batch_size,
    );

    let stats = ingestor
        .ingest_path(source)
        .await
        .with_context(|| format!("failed to ingest {}", source.display()))?;

    index.create_indexes().await?;
    index.optimize().await?;

    tracing::info!(
        source = %source.display(),
        index = %config.index.directory.display(),
        chunks = stats.chunks,
        indexed = stats.indexed,
        "index updated"
    );
    Ok(())
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    let bind: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind))?;

    let pipeline = Arc::new(build_pipeline(config).await?);
    let state = Arc::new(ApiState::new(pipeline));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = start_http_server(bind, state, shutdown_rx).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
    handle.await.context("HTTP server task panicked")?;
    Ok(())
}

/// Terminal conversation. History lives here, in the session, and is handed
/// to the pipeline on every turn.
async fn chat_loop(pipeline: &QueryPipeline) -> anyhow::Result<()> {
    let mut history: Vec<ConversationTurn> = Vec::new();
    println!("Ask a question. /reset clears the conversation, /quit or an empty line exits.");

    loop {
        let line = tokio::task::spawn_blocking(|| {
            dialoguer::Input::<String>::new()
                .with_prompt("you")
                .allow_empty(true)
                .interact_text()
        })
        .await
        .context("input task failed")?
        .context("failed to read input")?;

        let message = line.trim();
        match message {
            "" | "/quit" => break,
            "/reset" => {
                history.clear();
                println!("(conversation cleared)");
                continue;
            }
            _ => {}
        }

        match pipeline.respond(message, &history).await {
            Ok(answer) => {
                println!("docent: {answer}");
                history.push(ConversationTurn::new(message, answer));
            }
            Err(error) => {
                tracing::warn!(%error, "failed to answer");
                eprintln!("error: {error}");
            }
        }
    }

    Ok(())
}

async fn build_pipeline(config: &Config) -> anyhow::Result<QueryPipeline> {
    let embedder = load_embedder(config)?;
    let index = Arc::new(LanceIndex::open(&config.index.directory, config.embedding.dimensions).await?);
    let llm = openai_model(&config.llm)?;

    let options = QueryOptions {
        top_k: config.retrieval.top_k,
        max_history_turns: config.retrieval.max_history_turns,
    };
    Ok(QueryPipeline::new(llm, embedder, index, options)?)
}

fn load_embedder(config: &Config) -> anyhow::Result<Arc<dyn Embedder>> {
    let model = EmbeddingModel::new(&config.embedding.cache_dir)?;
    if model.dimensions() != config.embedding.dimensions {
        return Err(ConfigError::Invalid(format!(
            "embedding.dimensions is {} but the embedding model produces {}",
            config.embedding.dimensions,
            model.dimensions()
        ))
        .into());
    }
    Ok(Arc::new(model))
}

fn openai_model(config: &LlmConfig) -> anyhow::Result<Arc<dyn LanguageModel>> {
    // from_env panics on a missing key; fail with a readable error instead.
    if std::env::var("OPENAI_API_KEY").is_err() {
        return Err(LlmError::MissingCredentials("OPENAI_API_KEY").into());
    }

    let client = rig::providers::openai::Client::from_env();
    let model = client.completion_model(&config.model);
    Ok(Arc::new(RigLanguageModel::new(model, config.temperature)))
}
