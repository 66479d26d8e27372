pub mod chat;
pub mod chunking;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod history;
pub mod ingest;
pub mod models;
pub mod prompt;
pub mod session;
pub mod stores;
pub mod traits;

pub use chat::{ChatModel, OpenAiChatModel};
pub use chunking::{build_chunks, split_text, ChunkingConfig};
pub use config::Settings;
pub use context::{format_context, page_label, source_label};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    LOCAL_NGRAM_MODEL,
};
pub use error::{BackendError, ConfigError, IngestError, SessionError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use history::ConversationHistory;
pub use ingest::{chunk_folder, discover_pdf_files, ingest_folder, load_documents};
pub use models::{
    Answer, ChatMessage, IngestionOptions, IngestionReport, PageDocument, RetrievedChunk, Role,
    RuleChunk,
};
pub use prompt::{build_messages, SYSTEM_INSTRUCTIONS};
pub use session::{QuerySession, SessionState};
pub use stores::{InMemoryStore, QdrantStore};
pub use traits::VectorIndex;
