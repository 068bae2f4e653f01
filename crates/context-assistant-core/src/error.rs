//! Error taxonomy shared by the index, the store and the orchestrator.
//!
//! Lookups that miss are not errors: read operations return `Ok(None)`.
//! Persistence operations are all-or-nothing, so any error surfaced from a
//! store call means nothing from that call was committed.

use thiserror::Error;

/// Boxed original cause carried by [`Error::PersistenceFailure`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by Context Assistant core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A row with the same unique name already exists.
    #[error("{entity} named '{name}' already exists")]
    UniqueConstraintViolation { entity: &'static str, name: String },

    /// An index was requested over zero chunks.
    #[error("cannot build an index from an empty chunk set")]
    EmptyChunkSet,

    /// A query was issued before the index was built or loaded.
    #[error("similarity index has not been built")]
    IndexNotBuilt,

    /// `k` exceeds the number of indexed chunks.
    #[error("requested {requested} chunks but only {available} are indexed")]
    InsufficientChunks { requested: usize, available: usize },

    /// Vectors of different lengths were mixed in one index or query.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding vectors must have at least one component.
    #[error("embedding vectors must have at least one dimension")]
    ZeroDimension,

    /// The backing chunks were replaced and no longer line up with the index.
    #[error("index holds {indexed} vectors but {chunks} chunks are attached; rebuild first")]
    IndexOutOfSync { indexed: usize, chunks: usize },

    /// A serialized index artifact could not be decoded.
    #[error("corrupt index artifact: {0}")]
    CorruptArtifact(String),

    /// A context is missing chunks, an index or a document name.
    #[error("context '{name}' is incomplete: missing {missing}")]
    IncompleteContext { name: String, missing: &'static str },

    /// A profile was queried while an attached context has no index.
    #[error("context '{0}' is not ready: no similarity index built")]
    ContextNotReady(String),

    /// A context with this name is already attached to the profile.
    #[error("context '{0}' is already attached to this profile")]
    DuplicateContext(String),

    /// No context with this name is attached to the profile.
    #[error("context '{0}' is not attached to this profile")]
    UnknownContext(String),

    /// The embedder or chat completer failed.
    #[error("collaborator call failed: {0:#}")]
    Collaborator(#[from] anyhow::Error),

    /// A transaction was rolled back; `source` is the original cause.
    #[error("persistence failure: {source}")]
    PersistenceFailure {
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Wrap any error as a [`Error::PersistenceFailure`], keeping it as the source.
    pub fn persistence<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::PersistenceFailure { source: err.into() }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
