use crate::chunking::build_chunks;
use crate::embeddings::Embedder;
use crate::extractor::PdfExtractor;
use crate::traits::VectorIndex;
use crate::{IngestError, IngestionOptions, IngestionReport, PageDocument, RuleChunk};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// PDFs directly inside `folder`, sorted by path. Symlinked PDFs count; a
/// missing folder simply holds none.
pub fn discover_pdf_files(folder: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !folder.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();

    for item in WalkDir::new(folder)
        .follow_links(true)
        .min_depth(1)
        .max_depth(1)
    {
        let entry = item.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    Ok(files)
}

/// One document per page across every PDF in `folder`, in file order then
/// page order. Fails with [`IngestError::NoPdfFiles`] when there are none.
pub fn load_documents(
    folder: &Path,
    extractor: &dyn PdfExtractor,
) -> Result<(usize, Vec<PageDocument>), IngestError> {
    let files = discover_pdf_files(folder)?;

    if files.is_empty() {
        return Err(IngestError::NoPdfFiles(folder.to_path_buf()));
    }

    let mut documents = Vec::new();
    for path in &files {
        let source_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?
            .to_string();

        let pages = extractor.extract_pages(path)?;
        debug!(file = %source_name, pages = pages.len(), "extracted pdf");

        documents.extend(pages.into_iter().map(|page| PageDocument {
            source_name: source_name.clone(),
            source_path: path.to_string_lossy().to_string(),
            page: page.index,
            text: page.text,
        }));
    }

    Ok((files.len(), documents))
}

/// Loads and chunks every PDF in `folder` without touching any store.
pub fn chunk_folder(
    folder: &Path,
    options: &IngestionOptions,
    extractor: &dyn PdfExtractor,
) -> Result<(usize, usize, Vec<RuleChunk>), IngestError> {
    let (files, documents) = load_documents(folder, extractor)?;
    let (chunks, _) = build_chunks(&documents, options, 0)?;
    Ok((files, documents.len(), chunks))
}

/// Full re-ingest of `folder`: extract, chunk, embed, then upsert into the
/// collection (created on demand). Nothing is written if any earlier step
/// fails.
pub async fn ingest_folder<E, V>(
    folder: &Path,
    options: &IngestionOptions,
    extractor: &dyn PdfExtractor,
    embedder: &E,
    index: &V,
) -> Result<IngestionReport, IngestError>
where
    E: Embedder + ?Sized,
    V: VectorIndex + ?Sized,
{
    let (files, pages, chunks) = chunk_folder(folder, options, extractor)?;
    info!(folder = %folder.display(), files, pages, chunk_count = chunks.len(), "chunked pdfs");
    if chunks.is_empty() {
        warn!(folder = %folder.display(), files, "pdfs have no extractable text; nothing to index");
        return Ok(IngestionReport {
            files,
            pages,
            chunks: 0,
        });
    }

    let texts = chunks
        .iter()
        .map(|chunk| chunk.text.clone())
        .collect::<Vec<_>>();
    let embeddings = embedder.embed_batch(&texts).await?;
    info!(model = embedder.model_name(), vectors = embeddings.len(), "embedded chunks");

    if let Some(first) = embeddings.first() {
        index.ensure_collection(first.len()).await?;
        index.upsert_chunks(&chunks, &embeddings).await?;
    }

    Ok(IngestionReport {
        files,
        pages,
        chunks: chunks.len(),
    })
}
