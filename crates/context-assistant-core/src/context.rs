//! Named contexts: metadata plus an [`EmbeddingIndex`].

use std::fmt;

use crate::error::{Error, Result};
use crate::index::{EmbeddingIndex, FlatIndex};
use crate::models::{Chunk, ScoredChunk};

/// Embedding model assumed when none is given.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// A named, ordered collection of chunks with a similarity index.
///
/// Once written to a store a context is treated as immutable; changing its
/// content means writing a new context under another name.
#[derive(Debug, Clone)]
pub struct Context {
    pub name: String,
    pub associated_doc_name: Option<String>,
    pub embedding_model: String,
    index: EmbeddingIndex,
}

impl Context {
    /// A context with no chunks and no index yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            associated_doc_name: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            index: EmbeddingIndex::new(),
        }
    }

    /// Create a context and build its index from `chunks`.
    pub fn with_chunks(
        name: impl Into<String>,
        associated_doc_name: impl Into<String>,
        embedding_model: impl Into<String>,
        chunks: Vec<Chunk>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            associated_doc_name: Some(associated_doc_name.into()),
            embedding_model: embedding_model.into(),
            index: EmbeddingIndex::from_chunks(chunks)?,
        })
    }

    /// Reassemble a context from stored parts: chunk rows plus a previously
    /// serialized index. The index is attached as-is, not recomputed.
    pub fn from_stored(
        name: impl Into<String>,
        associated_doc_name: impl Into<String>,
        embedding_model: impl Into<String>,
        chunks: Vec<Chunk>,
        index: FlatIndex,
    ) -> Result<Self> {
        let mut embedding_index = EmbeddingIndex::new();
        embedding_index.replace_chunks(chunks)?;
        embedding_index.attach_index(index);
        Ok(Self {
            name: name.into(),
            associated_doc_name: Some(associated_doc_name.into()),
            embedding_model: embedding_model.into(),
            index: embedding_index,
        })
    }

    /// Build (or rebuild) the index from a new chunk sequence.
    pub fn build(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        self.index.build(chunks)
    }

    /// The `k` chunks most similar to `vector`, nearest first.
    pub fn query_similar(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.index.query(vector, k)
    }

    pub fn set_associated_doc_name(&mut self, name: impl Into<String>) {
        self.associated_doc_name = Some(name.into());
    }

    pub fn set_embedding_model(&mut self, model: impl Into<String>) {
        self.embedding_model = model.into();
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut EmbeddingIndex {
        &mut self.index
    }

    pub fn chunks(&self) -> &[Chunk] {
        self.index.chunks()
    }

    /// True when a similarity index is available for querying.
    pub fn is_ready(&self) -> bool {
        self.index.is_built()
    }

    /// Check that the context carries everything a store needs to persist it.
    pub fn ensure_complete(&self) -> Result<()> {
        let missing = if self.index.is_empty() {
            Some("chunks")
        } else if !self.index.is_built() {
            Some("similarity index")
        } else if self.associated_doc_name.is_none() {
            Some("associated document name")
        } else {
            None
        };

        match missing {
            Some(missing) => Err(Error::IncompleteContext {
                name: self.name.clone(),
                missing,
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Context name: {}", self.name)?;
        writeln!(
            f,
            "Associated doc name: {}",
            self.associated_doc_name.as_deref().unwrap_or("(none)")
        )?;
        writeln!(f, "Embedding model: {}", self.embedding_model)?;
        write!(f, "No. chunks: {}", self.index.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chunks_from_pairs;

    #[test]
    fn test_new_context_is_incomplete() {
        let ctx = Context::new("empty");
        assert!(!ctx.is_ready());
        let err = ctx.ensure_complete().unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteContext {
                missing: "chunks",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_doc_name_is_incomplete() {
        let mut ctx = Context::new("nodoc");
        ctx.build(chunks_from_pairs(vec![("a", vec![1.0])])).unwrap();
        let err = ctx.ensure_complete().unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteContext {
                missing: "associated document name",
                ..
            }
        ));
        ctx.set_associated_doc_name("a.docx");
        ctx.ensure_complete().unwrap();
    }

    #[test]
    fn test_with_chunks_is_ready() {
        let ctx = Context::with_chunks(
            "doc1",
            "doc1.docx",
            DEFAULT_EMBEDDING_MODEL,
            chunks_from_pairs(vec![("alpha", vec![1.0, 0.0]), ("beta", vec![0.0, 1.0])]),
        )
        .unwrap();
        assert!(ctx.is_ready());
        ctx.ensure_complete().unwrap();
        let top = ctx.query_similar(&[0.0, 1.0], 1).unwrap();
        assert_eq!(top[0].text, "beta");
    }

    #[test]
    fn test_display_summarises() {
        let ctx = Context::with_chunks(
            "doc1",
            "doc1.docx",
            "m",
            chunks_from_pairs(vec![("alpha", vec![1.0])]),
        )
        .unwrap();
        let s = ctx.to_string();
        assert!(s.contains("Context name: doc1"));
        assert!(s.contains("No. chunks: 1"));
    }
}
