//! Storage abstraction for contexts and assistant profiles.
//!
//! The [`ContextStore`] trait is what the CLI, the HTTP server and the
//! bootstrap routine program against. The SQLite implementation lives in the
//! `context-assistant` app crate.
//!
//! The name-collision rules used when a profile is written are pure and live
//! here as [`plan_context_write`] so every backend resolves them identically.

use async_trait::async_trait;

use crate::context::Context;
use crate::equivalence::equivalent;
use crate::error::Result;
use crate::models::{ContextSummary, ProfileSummary};
use crate::profile::AssistantProfile;

/// Abstract persistence backend.
///
/// Every call is self-contained: it acquires its own connection and
/// transaction and holds nothing across calls. Lookups that miss return
/// `Ok(None)`; deletes report whether a row was removed.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`write_context`](ContextStore::write_context) | Persist a complete context, returns its id |
/// | [`read_context_by_id`](ContextStore::read_context_by_id) / [`read_context_by_name`](ContextStore::read_context_by_name) | Rebuild a context from rows and its index artifact |
/// | [`delete_context_by_id`](ContextStore::delete_context_by_id) / [`delete_context_by_name`](ContextStore::delete_context_by_name) | Remove a context, its chunks and associations |
/// | [`write_assistant_profile`](ContextStore::write_assistant_profile) | Persist a profile with dedup-aware context writes |
/// | [`read_assistant_profile_by_name`](ContextStore::read_assistant_profile_by_name) | Rebuild a profile and its contexts |
/// | [`get_all_profile_summaries`](ContextStore::get_all_profile_summaries) | `(name, model)` listing |
/// | [`initialize_schema`](ContextStore::initialize_schema) | Destructive drop-and-recreate |
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn write_context(&self, context: &Context) -> Result<i64>;

    async fn read_context_by_id(&self, id: i64) -> Result<Option<Context>>;

    async fn read_context_by_name(&self, name: &str) -> Result<Option<Context>>;

    async fn delete_context_by_id(&self, id: i64) -> Result<bool>;

    async fn delete_context_by_name(&self, name: &str) -> Result<bool>;

    async fn list_contexts(&self) -> Result<Vec<ContextSummary>>;

    /// Persist `profile` and its contexts in one transaction.
    ///
    /// Contexts renamed to avoid a collision are renamed on `profile` itself
    /// once the transaction has committed.
    async fn write_assistant_profile(&self, profile: &mut AssistantProfile) -> Result<i64>;

    async fn read_assistant_profile_by_id(&self, id: i64) -> Result<Option<AssistantProfile>>;

    async fn read_assistant_profile_by_name(&self, name: &str)
        -> Result<Option<AssistantProfile>>;

    async fn delete_assistant_profile_by_id(&self, id: i64) -> Result<bool>;

    async fn delete_assistant_profile_by_name(&self, name: &str) -> Result<bool>;

    async fn get_all_profile_summaries(&self) -> Result<Vec<ProfileSummary>>;

    /// Drop and recreate every table. Destroys all stored data.
    async fn initialize_schema(&self) -> Result<()>;
}

/// What to do with one attached context when its profile is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextWrite {
    /// An equivalent context is already stored under this id.
    Reuse(i64),
    /// No context with this name is stored; insert it as-is.
    Insert,
    /// A different context owns the name; insert under `name` instead.
    InsertRenamed { name: String },
}

/// Name used for a context whose name is taken by a non-equivalent context.
pub fn disambiguated_name(context_name: &str, profile_name: &str) -> String {
    format!("{}_{}", context_name, profile_name)
}

/// Decide how to persist `candidate` given the context stored under its name.
///
/// `stored` is `(id, context)` for the row that currently owns
/// `candidate.name`, if any.
pub fn plan_context_write(
    candidate: &Context,
    stored: Option<(i64, &Context)>,
    profile_name: &str,
) -> ContextWrite {
    match stored {
        None => ContextWrite::Insert,
        Some((id, existing)) if equivalent(existing, candidate) => ContextWrite::Reuse(id),
        Some(_) => ContextWrite::InsertRenamed {
            name: disambiguated_name(&candidate.name, profile_name),
        },
    }
}
