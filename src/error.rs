use thiserror::Error;

#[derive(Error, Debug)]
pub enum TicketError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No wallet with id {0} is configured")]
    UnknownWallet(String),
    #[error("{0} not found")]
    NotFound(String),
}

impl TicketError {
    pub fn api(status: u16, detail: impl Into<String>) -> Self {
        Self::Api {
            status,
            detail: detail.into(),
        }
    }

    /// Whether a retry of the same request could reasonably succeed.
    ///
    /// Transport failures, rate limiting and server-side errors are transient;
    /// client errors (unknown ticket, bad key) and local failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            TicketError::Http(e) => !(e.is_builder() || e.is_decode()),
            TicketError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TicketError>;
