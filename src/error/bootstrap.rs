use std::path::PathBuf;
use thiserror::Error as ThisError;

use super::IsRetryable;
use super::driver::DriverError;

pub const INVALID_URL_MESSAGE: &str = "Invalid db.url parameter passed to the configuration. Expected not empty string or array of strings.";

#[derive(Debug, ThisError)]
pub enum BootstrapError {
    #[error("{msg}", msg = INVALID_URL_MESSAGE)]
    InvalidUrl,

    #[error("URL parse error for {url}: {source}")]
    UrlParse {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("DB URL has no host: {0}")]
    MissingHost(String),

    #[error("Failed to read TLS material from {}: {source}", .path.display())]
    TlsMaterial {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Client certificate configured without a client key")]
    MissingClientKey,

    #[error("No DB host responded")]
    NoRespondingHost,

    #[error("Failed to build DB host probe client: {0}")]
    ProbeClient(#[source] reqwest::Error),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Ractor error: {0}")]
    RactorError(String),
}

impl BootstrapError {
    /// Static configuration problems. These are surfaced to the caller of `init`
    /// and are never fed into the restart loop.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BootstrapError::InvalidUrl
                | BootstrapError::UrlParse { .. }
                | BootstrapError::MissingHost(_)
                | BootstrapError::TlsMaterial { .. }
                | BootstrapError::MissingClientKey
                | BootstrapError::ProbeClient(_)
        )
    }
}

impl IsRetryable for BootstrapError {
    fn is_retryable(&self) -> bool {
        match self {
            BootstrapError::Driver(e) => e.is_retryable(),
            BootstrapError::NoRespondingHost => true,
            _ => false,
        }
    }
}
