//! Shapes retrieved chunks into the numbered, citable block handed to the
//! chat model.

use crate::models::RetrievedChunk;
use serde_json::Value;

pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Stored pages are zero-indexed; readers expect one-indexed.
pub fn page_label(page: Option<u32>) -> String {
    match page {
        Some(page) => (u64::from(page) + 1).to_string(),
        None => "?".to_string(),
    }
}

/// `source_name`, then `source`, then `unknown`. Only absent or empty
/// values fall through; whitespace is kept as stored.
pub fn source_label(metadata: &Value) -> String {
    ["source_name", "source"]
        .iter()
        .filter_map(|key| metadata.get(key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Reads an optional non-negative page number from chunk metadata.
pub fn page_from_metadata(metadata: &Value) -> Option<u32> {
    metadata
        .get("page")
        .and_then(Value::as_u64)
        .and_then(|page| u32::try_from(page).ok())
}

pub fn citation(index: usize, chunk: &RetrievedChunk) -> String {
    format!(
        "[{index}] Source: {} (p. {})",
        chunk.source_name,
        page_label(chunk.page)
    )
}

/// Keeps retriever order; citation numbers start at 1.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(position, chunk)| format!("{}\n{}", citation(position + 1, chunk), chunk.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}
