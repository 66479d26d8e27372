use crate::error::IngestError;
use crate::models::{IngestionOptions, PageDocument, RuleChunk};
use sha2::{Digest, Sha256};
use text_splitter::{Characters, ChunkConfig, TextSplitter};

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    pub fn validate(self) -> Result<Self, IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(self)
    }

    /// Character-sized splitter: paragraph, line, sentence and word
    /// boundaries are tried before falling back to single characters.
    pub fn splitter(self) -> Result<TextSplitter<Characters>, IngestError> {
        let config = ChunkConfig::new(self.chunk_size)
            .with_overlap(self.chunk_overlap)
            .map_err(|error| IngestError::InvalidChunkConfig(error.to_string()))?;
        Ok(TextSplitter::new(config))
    }
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
            chunk_overlap: value.chunk_overlap,
        }
    }
}

/// Splits `text` into trimmed pieces of at most `chunk_size` characters,
/// neighbours sharing up to `chunk_overlap` characters.
pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    let splitter = config.validate()?.splitter()?;
    Ok(splitter.chunks(text).map(str::to_string).collect())
}

/// Chunks every page in order; each chunk inherits its page's source and page
/// number. `global_index` continues the running chunk counter across calls.
pub fn build_chunks(
    pages: &[PageDocument],
    options: &IngestionOptions,
    global_index: u64,
) -> Result<(Vec<RuleChunk>, u64), IngestError> {
    let splitter = ChunkingConfig::from(options).validate()?.splitter()?;
    let mut chunks = Vec::new();
    let mut cursor = global_index;

    for page in pages {
        if page.source_name.trim().is_empty() {
            return Err(IngestError::MissingFileName(page.source_path.clone()));
        }

        for text in splitter.chunks(&page.text).map(str::to_string) {
            chunks.push(RuleChunk {
                chunk_id: make_chunk_id(&page.source_name, page.page, cursor, &text),
                chunk_index: cursor,
                source_name: page.source_name.clone(),
                source_path: page.source_path.clone(),
                page: Some(page.page),
                text,
            });
            cursor = cursor.saturating_add(1);
        }
    }

    Ok((chunks, cursor))
}

fn make_chunk_id(source_name: &str, page: u32, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_name.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
