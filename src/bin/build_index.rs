//! Offline index builder.
//!
//! Reads product sheets (`.txt` / `.md`) from the documents directory,
//! chunks them, embeds every chunk through the configured provider and
//! rebuilds the SQLite vector index from scratch. Run this before starting
//! the server; the server itself never writes the index.

use std::fs;

use anyhow::{bail, Context};

use vetassist_backend::core::config::{AppPaths, Settings};
use vetassist_backend::llm::{LlmProvider, OpenAiCompatProvider};
use vetassist_backend::rag::{Chunker, DocumentChunk, SqliteIndex, VectorIndex};

const EMBED_BATCH: usize = 32;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let paths = AppPaths::new();
    let settings = Settings::load(&paths).context("loading configuration")?;

    let docs_dir = settings.resolved_docs_dir(&paths);
    if !docs_dir.is_dir() {
        bail!("documents directory {} does not exist", docs_dir.display());
    }

    let chunker = Chunker::default();
    let mut chunks: Vec<DocumentChunk> = Vec::new();

    let mut entries: Vec<_> = fs::read_dir(&docs_dir)
        .with_context(|| format!("reading {}", docs_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("txt") | Some("md")
            )
        })
        .collect();
    entries.sort();

    for path in &entries {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("documento");
        let product = stem.replace(['_', '-'], " ");

        let pieces = chunker.split(&text);
        tracing::info!(source = %path.display(), chunks = pieces.len(), "chunked");

        for (i, content) in pieces.into_iter().enumerate() {
            chunks.push(DocumentChunk {
                chunk_id: format!("{stem}-{i:04}"),
                content,
                product: product.clone(),
            });
        }
    }

    if chunks.is_empty() {
        bail!(
            "no chunks produced from {}; every source file must yield at least one",
            docs_dir.display()
        );
    }

    let provider = OpenAiCompatProvider::new(settings.base_url.clone(), settings.resolved_api_key());

    let index_path = settings.resolved_index_path(&paths);
    let index = SqliteIndex::create(index_path.clone())
        .await
        .map_err(|e| anyhow::anyhow!("opening index: {e}"))?;

    let removed = index
        .clear()
        .await
        .map_err(|e| anyhow::anyhow!("clearing index: {e}"))?;
    if removed > 0 {
        tracing::info!(removed, "dropped previous index contents");
    }

    let mut indexed = 0usize;
    for batch in chunks.chunks(EMBED_BATCH) {
        let inputs: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let embeddings = provider
            .embed(&inputs, &settings.embedding_model)
            .await
            .map_err(|e| anyhow::anyhow!("embedding batch: {e}"))?;

        let items: Vec<(DocumentChunk, Vec<f32>)> =
            batch.iter().cloned().zip(embeddings).collect();
        index
            .insert_batch(items)
            .await
            .map_err(|e| anyhow::anyhow!("writing index: {e}"))?;

        indexed += batch.len();
        tracing::info!(indexed, total = chunks.len(), "progress");
    }

    tracing::info!(
        chunks = indexed,
        sources = entries.len(),
        index = %index_path.display(),
        "index build complete"
    );

    Ok(())
}
