//! Service-scoped cache of loaded assistant profiles.
//!
//! Each cached profile sits behind its own [`tokio::sync::Mutex`], so
//! queries against one profile are serialised (its transcript is mutated
//! by every query) while different profiles proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use context_assistant_core::error::Result;
use context_assistant_core::profile::AssistantProfile;
use context_assistant_core::store::ContextStore;

pub type SharedProfile = Arc<tokio::sync::Mutex<AssistantProfile>>;

pub struct ProfileCache {
    store: Arc<dyn ContextStore>,
    entries: Mutex<HashMap<String, SharedProfile>>,
}

impl ProfileCache {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, SharedProfile>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the cached profile, loading it from the store on first use.
    /// `Ok(None)` when no profile with that name is stored.
    pub async fn get_or_load(&self, name: &str) -> Result<Option<SharedProfile>> {
        let cached = self.entries().get(name).cloned();
        if cached.is_some() {
            return Ok(cached);
        }

        let Some(profile) = self.store.read_assistant_profile_by_name(name).await? else {
            return Ok(None);
        };
        debug!(profile = %name, contexts = profile.contexts().len(), "loaded profile into cache");

        // Another caller may have loaded the same profile meanwhile; keep
        // whichever got in first so both share one lock.
        let shared = self
            .entries()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(profile)))
            .clone();
        Ok(Some(shared))
    }

    /// Drop one profile; the next lookup reloads it from the store.
    pub fn evict(&self, name: &str) -> bool {
        self.entries().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.store
    }
}
