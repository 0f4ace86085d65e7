use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Index or metadata artifacts are malformed or disagree with each other.
    #[error("Load failed for '{collection}': {reason}")]
    Load { collection: String, reason: String },

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Embedding timed out after {0} ms")]
    EmbeddingTimeout(u64),

    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    /// A single index search died; the index is skipped for that call.
    #[error("Search failed on '{index}': {reason}")]
    SearchFailed { index: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn load(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load { collection: collection.into(), reason: reason.into() }
    }

    /// Errors that stop startup rather than a single query.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::InvalidConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
