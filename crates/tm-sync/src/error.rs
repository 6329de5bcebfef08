use std::time::Duration;

/// Any failure talking to the remote store.
///
/// Swallowed (logged) for pushes; surfaced as a refresh failure for pulls,
/// with the local cache left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteSyncError {
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),
    #[error("remote database error: {0}")]
    Database(String),
    #[error("remote row could not be decoded: {0}")]
    Decode(String),
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("push queue is closed")]
    QueueClosed,
    #[error("local commits kept landing during {0} remote pulls; refresh abandoned")]
    Contended(usize),
}

impl From<sqlx::Error> for RemoteSyncError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
                RemoteSyncError::Decode(e.to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                RemoteSyncError::Unavailable(e.to_string())
            }
            other => RemoteSyncError::Database(other.to_string()),
        }
    }
}
