use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use rules_rag_core::config::{
    DEFAULT_CHAT_MODEL, DEFAULT_COLLECTION, DEFAULT_EMBED_MODEL, DEFAULT_HISTORY_MAX_TURNS,
    DEFAULT_OPENAI_BASE_URL, DEFAULT_QDRANT_URL, DEFAULT_TOP_K,
};
use rules_rag_core::{
    ingest_folder, BackendError, CharacterNgramEmbedder, ChatModel, Embedder, InMemoryStore,
    IngestionOptions, LopdfExtractor, OpenAiChatModel, OpenAiEmbedder, QdrantStore,
    QuerySession, Settings, VectorIndex, LOCAL_NGRAM_MODEL,
};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rules-rag", version, about = "Grounded answers from board-game rulebooks")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: SettingsArgs,
}

#[derive(Args)]
struct SettingsArgs {
    /// Qdrant base URL
    #[arg(long, global = true, env = "QDRANT_URL", default_value = DEFAULT_QDRANT_URL)]
    qdrant_url: String,

    /// Qdrant API key
    #[arg(long, global = true, env = "QDRANT_API_KEY", hide_env_values = true)]
    qdrant_api_key: Option<String>,

    /// Qdrant collection
    #[arg(long, global = true, env = "COLLECTION", default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Embedding model; `local-ngram` embeds offline
    #[arg(long, global = true, env = "EMBED_MODEL", default_value = DEFAULT_EMBED_MODEL)]
    embed_model: String,

    /// Chat model used for answers
    #[arg(long, global = true, env = "CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Number of excerpts retrieved per question
    #[arg(long, global = true, env = "TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// OpenAI-compatible API base URL
    #[arg(long, global = true, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    openai_base_url: String,

    /// OpenAI API key
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Carry earlier turns of the session into each prompt
    #[arg(long, global = true, env = "HISTORY", default_value_t = false)]
    history: bool,

    /// Oldest turns are dropped beyond this many
    #[arg(long, global = true, env = "HISTORY_MAX_TURNS", default_value_t = DEFAULT_HISTORY_MAX_TURNS)]
    history_max_turns: usize,
}

impl From<SettingsArgs> for Settings {
    fn from(args: SettingsArgs) -> Self {
        Self {
            qdrant_url: args.qdrant_url,
            qdrant_api_key: args.qdrant_api_key,
            collection: args.collection,
            embed_model: args.embed_model,
            chat_model: args.chat_model,
            top_k: args.top_k,
            openai_base_url: args.openai_base_url,
            openai_api_key: args.openai_api_key,
            history: args.history,
            history_max_turns: args.history_max_turns,
        }
    }
}

#[derive(Args)]
struct ChunkArgs {
    /// Folder that contains the rulebook PDFs.
    #[arg(long, default_value = "data/rules")]
    folder: PathBuf,

    /// Target chunk size in characters.
    #[arg(long, default_value_t = 1_200)]
    chunk_size: usize,

    /// Characters shared between neighbouring chunks.
    #[arg(long, default_value_t = 150)]
    chunk_overlap: usize,
}

impl ChunkArgs {
    fn options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Re-ingest every PDF in a folder into the collection.
    Ingest {
        #[command(flatten)]
        chunks: ChunkArgs,
    },
    /// Ask rules questions interactively; an empty line quits.
    Ask {
        /// Ingest `--folder` into an in-memory index instead of using Qdrant.
        #[arg(long, default_value_t = false)]
        in_memory: bool,

        #[command(flatten)]
        chunks: ChunkArgs,
    },
    /// List the collections on the Qdrant server.
    Collections,
}

fn build_embedder(settings: &Settings) -> Result<Box<dyn Embedder>, BackendError> {
    if settings.embed_model == LOCAL_NGRAM_MODEL {
        return Ok(Box::new(CharacterNgramEmbedder::default()));
    }
    let api_key = settings
        .openai_api_key
        .clone()
        .ok_or_else(|| BackendError::MissingCredentials("embeddings (OPENAI_API_KEY)".to_string()))?;
    Ok(Box::new(OpenAiEmbedder::new(
        &settings.openai_base_url,
        api_key,
        &settings.embed_model,
    )))
}

fn build_chat(settings: &Settings) -> Result<OpenAiChatModel, BackendError> {
    let api_key = settings
        .openai_api_key
        .clone()
        .ok_or_else(|| BackendError::MissingCredentials("chat (OPENAI_API_KEY)".to_string()))?;
    Ok(OpenAiChatModel::new(
        &settings.openai_base_url,
        api_key,
        &settings.chat_model,
    ))
}

fn qdrant(settings: &Settings) -> QdrantStore {
    QdrantStore::new(
        &settings.qdrant_url,
        &settings.collection,
        settings.qdrant_api_key.clone(),
    )
}

async fn ask<V>(
    settings: &Settings,
    embedder: &dyn Embedder,
    index: &V,
    chat: &dyn ChatModel,
) -> anyhow::Result<()>
where
    V: VectorIndex + ?Sized,
{
    let mut session = QuerySession::new(settings, embedder, index, chat);
    let mut stdout = std::io::stdout();
    let answered = session
        .run(BufReader::new(tokio::io::stdin()), &mut stdout)
        .await
        .context("question loop failed")?;
    info!(answered, "session stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::from(cli.settings)
        .validate()
        .context("invalid configuration")?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "rules-rag boot"
    );
    info!(settings = %settings.redacted(), "settings resolved");

    match cli.command {
        Command::Ingest { chunks } => {
            let embedder = build_embedder(&settings)?;
            let store = qdrant(&settings);
            let report = ingest_folder(
                &chunks.folder,
                &chunks.options(),
                &LopdfExtractor,
                embedder.as_ref(),
                &store,
            )
            .await
            .with_context(|| format!("ingestion of {} failed", chunks.folder.display()))?;

            println!(
                "Ingested {} chunks into Qdrant collection '{}'",
                report.chunks,
                store.collection()
            );
        }
        Command::Ask { in_memory, chunks } => {
            let embedder = build_embedder(&settings)?;
            let chat = build_chat(&settings)?;

            if in_memory {
                let store = InMemoryStore::new();
                let report = ingest_folder(
                    &chunks.folder,
                    &chunks.options(),
                    &LopdfExtractor,
                    embedder.as_ref(),
                    &store,
                )
                .await
                .with_context(|| format!("ingestion of {} failed", chunks.folder.display()))?;
                info!(chunks = report.chunks, "in-memory index ready");
                ask(&settings, embedder.as_ref(), &store, &chat).await?;
            } else {
                ask(&settings, embedder.as_ref(), &qdrant(&settings), &chat).await?;
            }
        }
        Command::Collections => {
            let names = qdrant(&settings)
                .list_collections()
                .await
                .context("listing collections failed")?;
            for name in names {
                println!("{name}");
            }
        }
    }

    Ok(())
}
