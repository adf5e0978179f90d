use thiserror::Error;

use crate::fetcher::FetchError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no command provided")]
    NoCommand,

    /// Wrong argument count or shape; carries the usage line.
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("user not found")]
    UserNotFound,

    #[error("feed not found")]
    FeedNotFound,

    #[error("user {0:?} already exists")]
    UserExists(String),

    #[error("feed {0:?} already exists")]
    FeedExists(String),

    #[error("invalid limit")]
    InvalidLimit,

    #[error("invalid interval {input:?}: {reason}")]
    InvalidInterval { input: String, reason: String },

    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("{operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps a gateway failure with the name of the operation that produced it.
    pub fn database(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Error::Database { operation, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_command_names_attempt() {
        let err = Error::UnknownCommand("frobnicate".to_string());
        assert_eq!(err.to_string(), "unknown command: frobnicate");
    }

    #[test]
    fn test_usage_display() {
        let err = Error::Usage("login <username>");
        assert_eq!(err.to_string(), "usage: login <username>");
    }

    #[test]
    fn test_database_error_carries_operation() {
        let err = Error::database("get_users")(sqlx::Error::RowNotFound);
        assert!(err.to_string().starts_with("get_users: "));
    }

    #[test]
    fn test_fixed_messages() {
        assert_eq!(Error::UserNotFound.to_string(), "user not found");
        assert_eq!(Error::FeedNotFound.to_string(), "feed not found");
        assert_eq!(Error::InvalidLimit.to_string(), "invalid limit");
    }
}
