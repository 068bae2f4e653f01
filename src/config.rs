use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use context_assistant_core::context::DEFAULT_EMBEDDING_MODEL;
use context_assistant_core::retrieval::DEFAULT_TOP_K;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub openai: OpenAIConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Default profiles created by `cassist bootstrap`.
    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Directory for serialized index artifacts. Defaults to `indexes/`
    /// next to the database file.
    #[serde(default)]
    pub artifact_dir: Option<PathBuf>,
}

impl DbConfig {
    pub fn artifact_dir(&self) -> PathBuf {
        match &self.artifact_dir {
            Some(dir) => dir.clone(),
            None => self
                .path
                .parent()
                .map(|p| p.join("indexes"))
                .unwrap_or_else(|| PathBuf::from("indexes")),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAIConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProfileConfig {
    pub name: String,
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub context_embedding_model: String,
    pub initial_role: String,
    #[serde(default)]
    pub initial_context: String,
    /// Documents turned into contexts, one context per document.
    #[serde(default)]
    pub documents: Vec<PathBuf>,
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.openai.base_url.trim().is_empty() {
        anyhow::bail!("openai.base_url must not be empty");
    }

    let mut seen = std::collections::HashSet::new();
    for profile in &config.profiles {
        if profile.name.trim().is_empty() {
            anyhow::bail!("profiles[].name must not be empty");
        }
        if !seen.insert(profile.name.as_str()) {
            anyhow::bail!("duplicate profile name in config: '{}'", profile.name);
        }
    }

    Ok(())
}
