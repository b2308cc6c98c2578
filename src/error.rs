use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors produced by the fetch ports.
///
/// Caches absorb these into an error flag plus message; they never cross a
/// cache boundary. Adapters and the stock view return them directly.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server rejected request: {message}")]
    Server { message: String },

    #[error("ticker '{ticker}' not found")]
    NotFound { ticker: String },

    #[error("user identity no longer resolvable")]
    StaleAuth,
}

impl FetchError {
    /// True for errors that invalidate the whole navigation rather than
    /// a single data load.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Durable key-value storage errors.
///
/// A corrupt envelope is treated as a cache miss by callers, so these
/// surface only in logs.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to serialize cache envelope: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to deserialize cache envelope: {0}")]
    Deserialize(#[source] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;
