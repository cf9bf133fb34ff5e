use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store not found: {0}")]
    StoreNotFound(String),

    #[error("invalid store name '{0}': must be a lowercase DNS label (a-z, 0-9, '-', max 63 chars)")]
    InvalidName(String),

    #[error("values file not found (tried: {tried})")]
    ValuesMissing { tried: String },

    /// A cluster command failed. Carries the tool's diagnostic text verbatim.
    #[error("{0}")]
    Backend(String),

    #[error("tool '{0}' not found on PATH")]
    ToolNotFound(String),

    #[error("readiness probe failed: {0}")]
    Probe(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Registry(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
