//! Capability traits for the external collaborators.
//!
//! The core never talks to an embedding model, a chat model or a document
//! parser directly. The application supplies implementations of these
//! traits (an OpenAI-compatible HTTP client, a paragraph chunker, test
//! fakes) and the orchestrator holds them by composition.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ChatMessage;

/// Turns text into a fixed-dimension vector.
///
/// The dimension is constant for a given `model`.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving input order.
    ///
    /// The default implementation calls [`embed`](Embedder::embed) once per
    /// text; HTTP backends override it to batch.
    async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(model, text).await?);
        }
        Ok(out)
    }
}

/// Produces one reply message for an ordered conversation.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<ChatMessage>;
}

/// Splits a document into ordered text spans bounded by a size budget.
pub trait DocumentChunker: Send + Sync {
    fn chunk(&self, document: &str) -> Vec<String>;
}
