//! Retrieval orchestration for assistant profiles.
//!
//! # Query flow (augmented mode)
//!
//! 1. Check every attached context has a built index (`ContextNotReady`).
//! 2. Embed the query once with the profile's embedding model.
//! 3. For each context, in attachment order, take the top-k chunks and label
//!    them with the context name.
//! 4. Build one ephemeral user message from `initial_context`, the combined
//!    block and the raw query.
//! 5. Send a copy of the transcript plus that message to the chat completer.
//! 6. On success, append only the raw query and the reply to the transcript.
//!
//! The augmented block never enters the stored transcript, so history stays
//! small while every completion still sees fresh context.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, info};

use crate::capability::{ChatCompleter, Embedder};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::models::{ChatMessage, ScoredChunk};
use crate::profile::AssistantProfile;

/// Chunks retrieved per context when not configured otherwise.
pub const DEFAULT_TOP_K: usize = 10;

/// Whether a query is augmented with retrieved context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// Retrieve from attached contexts and send an ephemeral augmented prompt.
    #[default]
    Augmented,
    /// Send `initial_context` and the query as-is, storing them in history.
    Plain,
}

impl QueryMode {
    pub fn from_augment_flag(augment: bool) -> Self {
        if augment {
            QueryMode::Augmented
        } else {
            QueryMode::Plain
        }
    }
}

/// Runs queries against profiles using injected collaborators.
#[derive(Clone)]
pub struct RetrievalOrchestrator {
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn ChatCompleter>,
    top_k: usize,
}

impl RetrievalOrchestrator {
    pub fn new(embedder: Arc<dyn Embedder>, completer: Arc<dyn ChatCompleter>) -> Self {
        Self {
            embedder,
            completer,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Answer `query` for `profile` and return the reply text.
    ///
    /// The transcript is only extended once the completion has succeeded.
    pub async fn query(
        &self,
        profile: &mut AssistantProfile,
        query: &str,
        mode: QueryMode,
    ) -> Result<String> {
        match mode {
            QueryMode::Augmented => self.query_augmented(profile, query).await,
            QueryMode::Plain => self.query_plain(profile, query).await,
        }
    }

    async fn query_augmented(&self, profile: &mut AssistantProfile, query: &str) -> Result<String> {
        if let Some(ctx) = profile.contexts().iter().find(|c| !c.is_ready()) {
            return Err(Error::ContextNotReady(ctx.name.clone()));
        }

        let query_vec = self
            .embedder
            .embed(&profile.context_embedding_model, query)
            .await?;

        let block = self.retrieve(profile.contexts(), &query_vec)?;
        let prompt = augmented_prompt(&profile.initial_context, &block, query);

        let mut messages = profile.history().to_vec();
        messages.push(ChatMessage::user(prompt));

        debug!(
            profile = %profile.name,
            contexts = profile.contexts().len(),
            messages = messages.len(),
            "sending augmented completion"
        );
        let reply = self.completer.complete(&profile.model, &messages).await?;
        let content = reply.content.clone();

        profile.append_history([ChatMessage::user(query), reply]);
        info!(profile = %profile.name, history = profile.history().len(), "query answered");
        Ok(content)
    }

    async fn query_plain(&self, profile: &mut AssistantProfile, query: &str) -> Result<String> {
        let user = ChatMessage::user(format!("{}\n{}", profile.initial_context, query));

        let mut messages = profile.history().to_vec();
        messages.push(user.clone());

        debug!(profile = %profile.name, messages = messages.len(), "sending plain completion");
        let reply = self.completer.complete(&profile.model, &messages).await?;
        let content = reply.content.clone();

        profile.append_history([user, reply]);
        Ok(content)
    }

    /// Retrieve and label the top chunks of every context.
    ///
    /// Contexts smaller than `top_k` contribute all their chunks.
    fn retrieve(&self, contexts: &[Context], query_vec: &[f32]) -> Result<String> {
        let mut block = String::new();
        for ctx in contexts {
            let k = self.top_k.min(ctx.index().len());
            let hits = ctx.query_similar(query_vec, k)?;
            debug!(context = %ctx.name, hits = hits.len(), "retrieved chunks");
            append_context_section(&mut block, &ctx.name, &hits);
        }
        Ok(block)
    }
}

fn append_context_section(block: &mut String, context_name: &str, hits: &[ScoredChunk]) {
    let _ = writeln!(block, "[context: {}]", context_name);
    for hit in hits {
        let _ = writeln!(block, "- (chunk {}) {}", hit.chunk_index, hit.text);
    }
    block.push('\n');
}

/// The ephemeral user message sent in augmented mode.
pub fn augmented_prompt(initial_context: &str, block: &str, query: &str) -> String {
    format!(
        "Using this initial context: {}\nAnd the following additional context:\n{}\nAnswer the following: {}",
        initial_context, block, query
    )
}
