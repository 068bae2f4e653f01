//! `cassist context ...` commands.

use anyhow::{bail, Result};
use std::path::Path;

use context_assistant_core::chunk::ParagraphChunker;
use context_assistant_core::store::ContextStore;

use crate::config::Config;
use crate::ingest;
use crate::openai;
use crate::sqlite_store::SqliteContextStore;

/// Characters of chunk text shown per line by `context show`.
const PREVIEW_CHARS: usize = 80;

pub async fn run_context_add(
    config: &Config,
    path: &Path,
    name: Option<&str>,
    embedding_model: &str,
) -> Result<()> {
    if !path.exists() {
        bail!("document not found: {}", path.display());
    }

    let (embedder, _) = openai::collaborators(&config.openai)?;
    let chunker = ParagraphChunker::new(config.chunking.max_tokens);
    let context =
        ingest::context_from_file(embedder.as_ref(), &chunker, path, name, embedding_model)
            .await?;

    let store = SqliteContextStore::open(config).await?;
    let id = store.write_context(&context).await?;
    store.close().await;

    println!(
        "Added context '{}' (id {}) with {} chunks",
        context.name,
        id,
        context.chunks().len()
    );
    Ok(())
}

pub async fn run_context_show(config: &Config, name: &str, chunks: bool) -> Result<()> {
    let store = SqliteContextStore::open(config).await?;
    let context = store.read_context_by_name(name).await?;
    store.close().await;

    let Some(context) = context else {
        bail!("no context named: {}", name);
    };

    println!("{}", context);
    if let Some(index) = context.index().flat_index() {
        println!("Dimension: {}", index.dim());
    }
    if chunks {
        println!();
        for chunk in context.chunks() {
            println!("[{}] {}", chunk.chunk_index, preview(&chunk.text));
        }
    }
    Ok(())
}

pub async fn run_context_list(config: &Config) -> Result<()> {
    let store = SqliteContextStore::open(config).await?;
    let contexts = store.list_contexts().await?;
    store.close().await;

    if contexts.is_empty() {
        println!("No contexts stored.");
        return Ok(());
    }

    println!(
        "{:<6} {:<28} {:>7}  {:<24} {}",
        "ID", "NAME", "CHUNKS", "MODEL", "DOCUMENT"
    );
    for c in contexts {
        println!(
            "{:<6} {:<28} {:>7}  {:<24} {}",
            c.id, c.name, c.chunk_count, c.embedding_model, c.origin_filename
        );
    }
    Ok(())
}

pub async fn run_context_delete(config: &Config, name: &str) -> Result<()> {
    let store = SqliteContextStore::open(config).await?;
    let deleted = store.delete_context_by_name(name).await?;
    store.close().await;

    if !deleted {
        bail!("no context named: {}", name);
    }
    println!("Deleted context '{}'", name);
    Ok(())
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let head: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    }
}
