//! Create the default assistant profiles listed in `[[profiles]]`.
//!
//! Each document becomes one context named after its file stem. A context
//! already stored under that name is reused instead of re-embedding the
//! document. This is the one batch loop that tolerates per-item failures:
//! a document or profile that fails is logged and skipped, and the loop
//! moves on to the next one.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use context_assistant_core::capability::{DocumentChunker, Embedder};
use context_assistant_core::profile::AssistantProfile;
use context_assistant_core::store::ContextStore;

use crate::config::ProfileConfig;
use crate::ingest;

/// Outcome of one bootstrap run, by profile name.
#[derive(Debug, Default)]
pub struct BootstrapReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Relative document paths are resolved against `base_dir`.
pub async fn bootstrap_profiles(
    store: &dyn ContextStore,
    embedder: &dyn Embedder,
    chunker: &dyn DocumentChunker,
    profiles: &[ProfileConfig],
    base_dir: &Path,
) -> Result<BootstrapReport> {
    let mut report = BootstrapReport::default();

    for spec in profiles {
        match store.read_assistant_profile_by_name(&spec.name).await {
            Ok(Some(_)) => {
                info!(profile = %spec.name, "profile already exists; skipping");
                report.skipped.push(spec.name.clone());
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(profile = %spec.name, error = %e, "failed to read stored profile; skipping");
                report.failed.push(spec.name.clone());
                continue;
            }
        }

        let mut profile = AssistantProfile::new(
            &spec.name,
            &spec.model,
            &spec.context_embedding_model,
            &spec.initial_role,
            &spec.initial_context,
        );

        for doc in &spec.documents {
            let path = resolve(base_dir, doc);
            let name = ingest::context_name_for(&path);

            let context = match store.read_context_by_name(&name).await {
                Ok(Some(stored)) => {
                    info!(context = %name, "reusing stored context");
                    stored
                }
                Ok(None) => match ingest::context_from_file(
                    embedder,
                    chunker,
                    &path,
                    Some(&name),
                    &profile.context_embedding_model,
                )
                .await
                {
                    Ok(context) => context,
                    Err(e) => {
                        warn!(profile = %spec.name, document = %path.display(), error = %format!("{:#}", e), "skipping document");
                        continue;
                    }
                },
                Err(e) => {
                    warn!(profile = %spec.name, context = %name, error = %e, "failed to read stored context; skipping document");
                    continue;
                }
            };

            if let Err(e) = profile.add_context(context) {
                warn!(profile = %spec.name, error = %e, "skipping document");
            }
        }

        match store.write_assistant_profile(&mut profile).await {
            Ok(id) => {
                info!(profile = %spec.name, id, contexts = profile.contexts().len(), "created profile");
                report.created.push(spec.name.clone());
            }
            Err(e) => {
                warn!(profile = %spec.name, error = %e, "profile was not created");
                report.failed.push(spec.name.clone());
            }
        }
    }

    Ok(report)
}

fn resolve(base_dir: &Path, doc: &Path) -> PathBuf {
    if doc.is_absolute() {
        doc.to_path_buf()
    } else {
        base_dir.join(doc)
    }
}
