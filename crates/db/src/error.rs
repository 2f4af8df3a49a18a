//! Error taxonomy for document store operations

use mongodb::error::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Failures surfaced by the store seam.
///
/// Neither kind is retried here; retry policy belongs to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// The store is unreachable or the connection was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// The filter, update, pipeline, or index request is malformed.
    #[error("query error: {0}")]
    Query(String),
}

impl DbError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query(_))
    }
}

impl From<mongodb::error::Error> for DbError {
    fn from(err: mongodb::error::Error) -> Self {
        let unreachable = matches!(
            *err.kind,
            ErrorKind::Io(_)
                | ErrorKind::ServerSelection { .. }
                | ErrorKind::DnsResolve { .. }
                | ErrorKind::ConnectionPoolCleared { .. }
                | ErrorKind::Authentication { .. }
        );

        if unreachable {
            Self::Connection(err.to_string())
        } else {
            Self::Query(err.to_string())
        }
    }
}
