use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication required: {0}")]
    Unauthorized(String),
    #[error("credential store error: {0}")]
    Credential(String),
    #[error("query cache error: {0}")]
    Cache(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Validation(String),
    #[error("timer error: {0}")]
    Timer(String),
}

impl InfraError {
    /// Whether sending the same request again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Message suitable for an inline banner: the server's `detail` when there is one.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { detail, .. } | Self::Unauthorized(detail) => detail.clone(),
            Self::Validation(message) => message.clone(),
            other => other.to_string(),
        }
    }
}
