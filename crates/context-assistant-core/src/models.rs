//! Core data models shared by the index, store and orchestrator.

use serde::{Deserialize, Serialize};

/// One text span of a context plus its embedding vector.
///
/// `chunk_index` is the position within the owning context. Indices are
/// contiguous from 0 and reconstruction must preserve their order.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub chunk_index: usize,
    pub text: String,
    pub vector: Vec<f32>,
}

impl Chunk {
    pub fn new(chunk_index: usize, text: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            chunk_index,
            text: text.into(),
            vector,
        }
    }
}

/// Build contiguously indexed chunks from `(text, vector)` pairs.
pub fn chunks_from_pairs<I, S>(pairs: I) -> Vec<Chunk>
where
    I: IntoIterator<Item = (S, Vec<f32>)>,
    S: Into<String>,
{
    pairs
        .into_iter()
        .enumerate()
        .map(|(i, (text, vector))| Chunk::new(i, text, vector))
        .collect()
}

/// A chunk returned by a similarity query, with its L2 distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk_index: usize,
    pub text: String,
    pub distance: f32,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged chat message in the OpenAI wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
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

/// Lightweight profile listing entry; does not load contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub name: String,
    pub model: String,
}

/// Lightweight context listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSummary {
    pub id: i64,
    pub name: String,
    pub origin_filename: String,
    pub embedding_model: String,
    pub chunk_count: i64,
}
