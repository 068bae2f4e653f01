//! Assistant profiles: a chat persona, its attached contexts and transcript.
//!
//! A profile is plain data. Querying it goes through a
//! [`RetrievalOrchestrator`](crate::retrieval::RetrievalOrchestrator), which
//! holds the embedder and chat completer.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::models::ChatMessage;

/// A configured chat persona with attached contexts and a transcript.
///
/// The transcript always starts with exactly one system message carrying
/// `initial_role`. It only grows, except for [`clear_history`](Self::clear_history),
/// which restores it to that single message.
#[derive(Debug, Clone)]
pub struct AssistantProfile {
    pub name: String,
    pub model: String,
    pub context_embedding_model: String,
    pub initial_role: String,
    pub initial_context: String,
    contexts: Vec<Context>,
    history: Vec<ChatMessage>,
}

impl AssistantProfile {
    /// Create a profile with an empty context list and a fresh transcript.
    ///
    /// The embedding model identifier is lower-cased.
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        context_embedding_model: impl Into<String>,
        initial_role: impl Into<String>,
        initial_context: impl Into<String>,
    ) -> Self {
        let initial_role = initial_role.into();
        Self {
            name: name.into(),
            model: model.into(),
            context_embedding_model: context_embedding_model.into().to_lowercase(),
            history: vec![ChatMessage::system(initial_role.clone())],
            initial_role,
            initial_context: initial_context.into(),
            contexts: Vec::new(),
        }
    }

    /// Attach a context. Names are unique within a profile.
    pub fn add_context(&mut self, context: Context) -> Result<()> {
        if self.context(&context.name).is_some() {
            return Err(Error::DuplicateContext(context.name));
        }
        self.contexts.push(context);
        Ok(())
    }

    /// Detach and return the context called `name`.
    pub fn remove_context(&mut self, name: &str) -> Result<Context> {
        let pos = self
            .contexts
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::UnknownContext(name.to_string()))?;
        Ok(self.contexts.remove(pos))
    }

    /// Detach every context. The transcript is left alone.
    pub fn clear_contexts(&mut self) {
        self.contexts.clear();
    }

    /// Attached contexts in attachment order.
    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut [Context] {
        &mut self.contexts
    }

    pub fn context(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name == name)
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Reset the transcript to the initial system message.
    pub fn clear_history(&mut self) {
        self.history.truncate(1);
    }

    /// Append messages to the transcript. Crate-private so the
    /// system-message invariant cannot be broken from outside.
    pub(crate) fn append_history<I>(&mut self, messages: I)
    where
        I: IntoIterator<Item = ChatMessage>,
    {
        self.history.extend(messages);
    }
}
