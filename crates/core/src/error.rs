//! Unified error types for comicslate.
//!
//! Every variant renders as `CODE: detail` so log lines stay greppable
//! regardless of which layer produced them.

/// Unified error types for the catalog and render engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty page id).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A page URL could not be built or parsed.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The content store could not be reached or returned garbage.
    #[error("RPC_FAILED: {0}")]
    Rpc(String),

    /// The content store answered with an explicit fault.
    #[error("RPC_FAULT: {code} {message}")]
    RpcFault { code: i64, message: String },

    /// The content store rejected our credentials.
    #[error("LOGIN_FAILED: {0}")]
    LoginFailed(String),

    /// The persisted catalog page is missing or unreadable.
    #[error("CACHE_CORRUPT: {0}")]
    CacheCorrupt(String),

    /// A comic has no numbered story strips.
    #[error("NO_STRIPS: {0}")]
    NoStrips(String),

    /// Rendering a page into an artifact failed.
    #[error("RENDER_FAILED: {0}")]
    RenderFailed(String),

    /// Local filesystem operation failed.
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CacheCorrupt(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

impl Error {
    /// Whether the error is worth retrying on the next refresh cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Rpc(_) | Error::Io(_) | Error::RenderFailed(_))
    }
}
