//! Error types for directory operations.

/// Result type alias for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// LDAP result code: the server is busy.
pub const RESULT_CODE_BUSY: u32 = 51;

/// LDAP result code: the server is unavailable.
pub const RESULT_CODE_UNAVAILABLE: u32 = 52;

/// Errors that can occur while talking to the directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// No connection is held.
    #[error("Not connected to directory")]
    NotConnected,

    /// The connection could not be established or was lost.
    #[error("Directory connection error: {0}")]
    Connection(String),

    /// The operation did not complete in time.
    #[error("Directory operation timeout after {0}ms")]
    Timeout(u64),

    /// The server rejected the operation.
    #[error("Directory operation failed (rc={code}): {message}")]
    Operation { code: u32, message: String },

    /// The server answered with something unusable.
    #[error("Invalid directory response: {0}")]
    InvalidResponse(String),
}

impl DirectoryError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create an operation error from an LDAP result code.
    ///
    /// Busy and unavailable codes describe the connection rather than the
    /// request, and become [`DirectoryError::Connection`].
    pub fn operation(code: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            RESULT_CODE_BUSY | RESULT_CODE_UNAVAILABLE => {
                Self::Connection(format!("server returned rc={code}: {message}"))
            }
            _ => Self::Operation { code, message },
        }
    }

    /// Returns `true` if reconnecting may fix the failure.
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Connection(_) | Self::Timeout(_)
        )
    }
}
