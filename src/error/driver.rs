use thiserror::Error as ThisError;

use super::IsRetryable;

/// Failures reported by a database client behind the [`crate::db::Connection`] seam.
#[derive(Debug, ThisError)]
pub enum DriverError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Connection is closed")]
    Closed,

    #[error("Driver error: {0}")]
    Other(String),
}

impl DriverError {
    /// True when the error means the link to the server is gone, as opposed to a
    /// statement-level failure on a healthy link.
    ///
    /// A lazy pool retries refused connects internally until the acquire timeout,
    /// so a dead server surfaces as `PoolTimedOut`.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            DriverError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::Protocol(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            DriverError::Closed => true,
            DriverError::Other(_) => false,
        }
    }
}

impl IsRetryable for DriverError {
    fn is_retryable(&self) -> bool {
        match self {
            DriverError::Database(sqlx::Error::Configuration(_)) => false,
            DriverError::Database(_) | DriverError::Closed | DriverError::Other(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_server_counts_as_connection_loss() {
        assert!(DriverError::from(sqlx::Error::PoolTimedOut).is_connection_loss());
        assert!(
            DriverError::from(sqlx::Error::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused
            )))
            .is_connection_loss()
        );
        assert!(DriverError::Closed.is_connection_loss());
    }

    #[test]
    fn statement_failures_keep_the_link() {
        assert!(!DriverError::from(sqlx::Error::RowNotFound).is_connection_loss());
        assert!(!DriverError::Other("bad row".to_string()).is_connection_loss());
    }

    #[test]
    fn configuration_errors_are_not_retried() {
        let err = DriverError::from(sqlx::Error::Configuration("bad sslmode".into()));
        assert!(!err.is_retryable());
        assert!(DriverError::from(sqlx::Error::PoolTimedOut).is_retryable());
    }
}
