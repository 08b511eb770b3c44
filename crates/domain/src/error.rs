/// Shared error type used across all LexTutor crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("search: {0}")]
    Search(String),

    #[error("store: {0}")]
    Store(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Timeouts and transport failures are transient; provider errors are
    /// transient only when the upstream reported a 5xx or a rate limit.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout(_) | Error::Http(_) => true,
            Error::Provider { message, .. } => {
                message.starts_with("HTTP 5") || message.starts_with("HTTP 429")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
