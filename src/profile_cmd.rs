//! `cassist profile ...` commands.

use anyhow::{bail, Result};

use context_assistant_core::profile::AssistantProfile;
use context_assistant_core::store::ContextStore;

use crate::config::Config;
use crate::sqlite_store::SqliteContextStore;

pub async fn run_profile_list(config: &Config) -> Result<()> {
    let store = SqliteContextStore::open(config).await?;
    let summaries = store.get_all_profile_summaries().await?;
    store.close().await;

    if summaries.is_empty() {
        println!("No profiles stored.");
        return Ok(());
    }

    println!("{:<28} {}", "NAME", "MODEL");
    for s in summaries {
        println!("{:<28} {}", s.name, s.model);
    }
    Ok(())
}

pub async fn run_profile_show(config: &Config, name: &str) -> Result<()> {
    let store = SqliteContextStore::open(config).await?;
    let profile = store.read_assistant_profile_by_name(name).await?;
    store.close().await;

    let Some(profile) = profile else {
        bail!("no profile named: {}", name);
    };

    println!("Name:            {}", profile.name);
    println!("Model:           {}", profile.model);
    println!("Embedding model: {}", profile.context_embedding_model);
    println!("Initial role:    {}", profile.initial_role.trim());
    println!("Initial context: {}", profile.initial_context.trim());
    println!("Contexts:");
    if profile.contexts().is_empty() {
        println!("  (none)");
    }
    for ctx in profile.contexts() {
        println!(
            "  {} ({} chunks, {})",
            ctx.name,
            ctx.chunks().len(),
            ctx.associated_doc_name.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

/// Fields for `cassist profile create`.
pub struct NewProfile<'a> {
    pub name: &'a str,
    pub model: &'a str,
    pub embedding_model: &'a str,
    pub initial_role: &'a str,
    pub initial_context: &'a str,
    pub contexts: &'a [String],
}

/// Create a profile from contexts that are already stored.
pub async fn run_profile_create(config: &Config, new: NewProfile<'_>) -> Result<()> {
    let store = SqliteContextStore::open(config).await?;

    let mut profile = AssistantProfile::new(
        new.name,
        new.model,
        new.embedding_model,
        new.initial_role,
        new.initial_context,
    );
    for name in new.contexts {
        let Some(context) = store.read_context_by_name(name).await? else {
            store.close().await;
            bail!("no context named: {}", name);
        };
        profile.add_context(context)?;
    }

    let id = store.write_assistant_profile(&mut profile).await?;
    store.close().await;

    println!(
        "Created profile '{}' (id {}) with {} contexts",
        profile.name,
        id,
        profile.contexts().len()
    );
    Ok(())
}

pub async fn run_profile_delete(config: &Config, name: &str) -> Result<()> {
    let store = SqliteContextStore::open(config).await?;
    let deleted = store.delete_assistant_profile_by_name(name).await?;
    store.close().await;

    if !deleted {
        bail!("no profile named: {}", name);
    }
    println!("Deleted profile '{}'", name);
    Ok(())
}
