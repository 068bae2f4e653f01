//! Turn a document file into a ready-to-store [`Context`].
//!
//! Pipeline: extract text → chunk → embed every span in one batch → build
//! the similarity index. Nothing is written to the database here.

use anyhow::{bail, Context as _, Result};
use std::path::Path;
use tracing::info;

use context_assistant_core::capability::{DocumentChunker, Embedder};
use context_assistant_core::context::Context;
use context_assistant_core::models::chunks_from_pairs;

use crate::extract;

/// Default context name for a document: its file stem.
pub fn context_name_for(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string()
}

/// Build a context from already extracted `text`.
pub async fn context_from_text(
    embedder: &dyn Embedder,
    chunker: &dyn DocumentChunker,
    name: &str,
    doc_name: &str,
    embedding_model: &str,
    text: &str,
) -> Result<Context> {
    let spans = chunker.chunk(text);
    if spans.is_empty() {
        bail!("document '{}' contains no text", doc_name);
    }

    let vectors = embedder
        .embed_batch(embedding_model, &spans)
        .await
        .with_context(|| format!("Failed to embed chunks of '{}'", doc_name))?;
    if vectors.len() != spans.len() {
        bail!(
            "embedder returned {} vectors for {} chunks",
            vectors.len(),
            spans.len()
        );
    }

    let context = Context::with_chunks(
        name,
        doc_name,
        embedding_model,
        chunks_from_pairs(spans.into_iter().zip(vectors)),
    )?;
    info!(context = %name, doc = %doc_name, chunks = context.chunks().len(), "built context");
    Ok(context)
}

/// Extract, chunk and embed the document at `path`.
///
/// `name` defaults to the file stem; the associated document name is the
/// path as given.
pub async fn context_from_file(
    embedder: &dyn Embedder,
    chunker: &dyn DocumentChunker,
    path: &Path,
    name: Option<&str>,
    embedding_model: &str,
) -> Result<Context> {
    let text = extract::extract_file(path)
        .with_context(|| format!("Failed to extract text from {}", path.display()))?;
    let name = name
        .map(str::to_string)
        .unwrap_or_else(|| context_name_for(path));
    context_from_text(
        embedder,
        chunker,
        &name,
        &path.display().to_string(),
        &embedding_model.to_lowercase(),
        &text,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use context_assistant_core::chunk::ParagraphChunker;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, _model: &str, text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    #[test]
    fn test_context_name_is_file_stem() {
        assert_eq!(
            context_name_for(Path::new("/docs/curtainwall101.docx")),
            "curtainwall101"
        );
    }

    #[tokio::test]
    async fn test_context_from_text() {
        let chunker = ParagraphChunker::new(2);
        let ctx = context_from_text(
            &LengthEmbedder,
            &chunker,
            "notes",
            "notes.txt",
            "text-embedding-3-small",
            "first para\n\nsecond para",
        )
        .await
        .unwrap();
        assert_eq!(ctx.chunks().len(), 2);
        assert_eq!(ctx.chunks()[1].text, "second para");
        assert!(ctx.is_ready());
        ctx.ensure_complete().unwrap();
    }

    #[tokio::test]
    async fn test_empty_document_rejected() {
        let chunker = ParagraphChunker::new(100);
        let err = context_from_text(&LengthEmbedder, &chunker, "e", "e.txt", "m", "   ")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no text"));
    }

    #[tokio::test]
    async fn test_context_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("manual.md");
        std::fs::write(&path, "Glazing.\n\nSealant.").unwrap();

        let ctx = context_from_file(
            &LengthEmbedder,
            &ParagraphChunker::new(500),
            &path,
            None,
            "Text-Embedding-3-Small",
        )
        .await
        .unwrap();
        assert_eq!(ctx.name, "manual");
        assert_eq!(ctx.embedding_model, "text-embedding-3-small");
        assert_eq!(ctx.associated_doc_name.as_deref(), Some(path.display().to_string().as_str()));
    }
}
