//! `cassist ask` and `cassist bootstrap`.

use anyhow::{bail, Result};
use std::path::Path;

use context_assistant_core::chunk::ParagraphChunker;
use context_assistant_core::retrieval::{QueryMode, RetrievalOrchestrator};
use context_assistant_core::store::ContextStore;

use crate::bootstrap;
use crate::config::Config;
use crate::openai;
use crate::sqlite_store::SqliteContextStore;

/// Ask `profile_name` one question and print the reply.
pub async fn run_ask(config: &Config, profile_name: &str, message: &str, augment: bool) -> Result<()> {
    if message.trim().is_empty() {
        bail!("message must not be empty");
    }

    let store = SqliteContextStore::open(config).await?;
    let profile = store.read_assistant_profile_by_name(profile_name).await?;
    store.close().await;

    let Some(mut profile) = profile else {
        bail!("no profile named: {}", profile_name);
    };

    let (embedder, completer) = openai::collaborators(&config.openai)?;
    let orchestrator =
        RetrievalOrchestrator::new(embedder, completer).with_top_k(config.retrieval.top_k);
    let reply = orchestrator
        .query(&mut profile, message, QueryMode::from_augment_flag(augment))
        .await?;

    println!("{}", reply);
    Ok(())
}

/// Create the `[[profiles]]` from the config file, optionally after a reset.
pub async fn run_bootstrap(config: &Config, config_path: &Path, reset: bool) -> Result<()> {
    if config.profiles.is_empty() {
        println!("No [[profiles]] configured; nothing to bootstrap.");
        return Ok(());
    }

    let (embedder, _) = openai::collaborators(&config.openai)?;
    let chunker = ParagraphChunker::new(config.chunking.max_tokens);
    let store = SqliteContextStore::open(config).await?;
    if reset {
        store.initialize_schema().await?;
    }

    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let report = bootstrap::bootstrap_profiles(
        &store,
        embedder.as_ref(),
        &chunker,
        &config.profiles,
        &base_dir,
    )
    .await;
    store.close().await;
    let report = report?;

    println!(
        "Bootstrap complete: {} created, {} skipped, {} failed",
        report.created.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for name in &report.failed {
        println!("  failed: {}", name);
    }
    Ok(())
}
