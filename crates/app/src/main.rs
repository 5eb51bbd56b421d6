mod repl;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_chat_core::config::{
    DEFAULT_CHAT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_ENDPOINT,
    DEFAULT_EMBEDDING_MODEL, MINILM_DIMENSIONS,
};
use pdf_chat_core::{
    read_uploads, CharacterNgramEmbedder, ChatModelConfig, ChunkingConfig, ConversationEngine,
    Embedder, EmbeddingConfig, EngineConfig, HuggingFaceEmbedder, InMemorySessionStore,
    OpenAiCompatibleChatModel, RetryPolicy, DEFAULT_SESSION_ID, DEFAULT_TOP_K,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Groq API key for the chat model
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Conversation session id
    #[arg(long, env = "PDF_CHAT_SESSION", default_value = DEFAULT_SESSION_ID)]
    session: String,

    /// OpenAI-compatible chat API base URL
    #[arg(long, env = "PDF_CHAT_LLM_URL", default_value = DEFAULT_CHAT_BASE_URL)]
    llm_url: String,

    /// Chat model name
    #[arg(long, env = "PDF_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    model: String,

    /// Sampling temperature (provider default when unset)
    #[arg(long)]
    temperature: Option<f32>,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = EmbeddingProvider::Huggingface)]
    embedding_provider: EmbeddingProvider,

    /// Hugging Face token for the embedding endpoint
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    hf_token: Option<String>,

    /// Feature-extraction endpoint URL
    #[arg(long, env = "PDF_CHAT_EMBEDDING_URL", default_value = DEFAULT_EMBEDDING_ENDPOINT)]
    embedding_url: String,

    /// Embedding model name (informational)
    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Embedding vector dimension
    #[arg(long, default_value_t = MINILM_DIMENSIONS)]
    embedding_dims: usize,

    /// Maximum segment length in characters
    #[arg(long, default_value_t = ChunkingConfig::default().max_chars)]
    chunk_size: usize,

    /// Characters shared by neighbouring segments
    #[arg(long, default_value_t = ChunkingConfig::default().overlap_chars)]
    chunk_overlap: usize,

    /// Segments retrieved per question
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Timeout for each provider request
    #[arg(long, default_value = "60")]
    timeout_secs: u64,

    /// Retries for rate-limited or failed provider requests
    #[arg(long, default_value = "3")]
    max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmbeddingProvider {
    /// Hosted sentence-transformers model (needs HF_TOKEN).
    Huggingface,
    /// Local character-trigram hashing, no network.
    Ngram,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat: upload PDFs and ask questions.
    Chat {
        /// PDFs or folders to upload before the first prompt.
        #[arg(long)]
        pdf: Vec<PathBuf>,
    },
    /// Upload PDFs once and ask one or more questions in order.
    Ask {
        /// PDFs or folders to upload.
        #[arg(long, required = true)]
        pdf: Vec<PathBuf>,
        /// Questions, asked in the given order.
        #[arg(long, required = true)]
        question: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv()?;

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let retry = RetryPolicy {
        max_retries: cli.max_retries,
        ..RetryPolicy::default()
    };

    let embedder = build_embedder(&cli, retry)?;

    let Some(api_key) = cli.api_key.clone().filter(|key| !key.trim().is_empty()) else {
        warn!("no chat api key configured");
        eprintln!("Please enter the Groq API key (--api-key or GROQ_API_KEY).");
        return Ok(());
    };

    let model = OpenAiCompatibleChatModel::new(ChatModelConfig {
        base_url: cli.llm_url.clone(),
        model: cli.model.clone(),
        api_key,
        temperature: cli.temperature,
        timeout_secs: cli.timeout_secs,
        retry,
    })?;

    let config = EngineConfig {
        chunking: ChunkingConfig {
            max_chars: cli.chunk_size,
            overlap_chars: cli.chunk_overlap,
        },
        top_k: cli.top_k,
    };
    config.chunking.validate()?;

    let engine = ConversationEngine::new(embedder, model, InMemorySessionStore::new(), config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        session = %cli.session,
        "pdf-chat boot"
    );

    match cli.command {
        Command::Chat { pdf } => repl::run(&engine, cli.session, pdf).await,
        Command::Ask { pdf, question } => {
            let uploads = read_uploads(&pdf)?;
            let report = engine.index_uploads(&cli.session, uploads).await?;
            println!(
                "indexed {} page(s) into {} segment(s)",
                report.documents, report.segments
            );

            for question in question {
                let answer = engine.ask(&cli.session, &question).await?;
                println!("Assistant: {}", answer.answer);
            }

            repl::print_transcript(&engine.transcript(&cli.session).await);
            Ok(())
        }
    }
}

fn load_dotenv() -> anyhow::Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(error) if error.not_found() => Ok(()),
        Err(error) => Err(error).context("failed to load .env"),
    }
}

fn build_embedder(cli: &Cli, retry: RetryPolicy) -> anyhow::Result<Box<dyn Embedder>> {
    match cli.embedding_provider {
        EmbeddingProvider::Ngram => Ok(Box::new(CharacterNgramEmbedder::default())),
        EmbeddingProvider::Huggingface => {
            let Some(token) = cli.hf_token.clone().filter(|token| !token.trim().is_empty())
            else {
                bail!("HF_TOKEN must be set in the environment or a .env file");
            };

            let embedder = HuggingFaceEmbedder::new(EmbeddingConfig {
                endpoint: cli.embedding_url.clone(),
                model: cli.embedding_model.clone(),
                dimensions: cli.embedding_dims,
                timeout_secs: cli.timeout_secs,
                retry,
                ..EmbeddingConfig::new(token)
            })?;
            Ok(Box::new(embedder))
        }
    }
}
