use serde::{Deserialize, Serialize};

/// Text of one PDF page, stamped with the file it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageDocument {
    pub source_name: String,
    pub source_path: String,
    /// Zero-indexed page number.
    pub page: u32,
    pub text: String,
}

/// A slice of page text as it is embedded and persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleChunk {
    pub chunk_id: String,
    pub chunk_index: u64,
    pub source_name: String,
    pub source_path: String,
    pub page: Option<u32>,
    pub text: String,
}

/// A chunk reconstructed from vector-store metadata for one answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub source_name: String,
    pub page: Option<u32>,
    pub score: f64,
}

impl RetrievedChunk {
    pub fn new(text: impl Into<String>, source_name: impl Into<String>, page: Option<u32>) -> Self {
        Self {
            text: text.into(),
            source_name: source_name.into(),
            page,
            score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_200,
            chunk_overlap: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub files: usize,
    pub pages: usize,
    pub chunks: usize,
}

/// One answered question with the excerpts it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub text: String,
    pub sources: Vec<RetrievedChunk>,
}
