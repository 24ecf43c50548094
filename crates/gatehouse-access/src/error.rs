//! Error types for access control.

use gatehouse_directory::DirectoryError;
use gatehouse_hardware::HardwareError;

/// Result type alias for access control operations.
pub type Result<T> = std::result::Result<T, AccessError>;

/// Errors that stop the access controller.
///
/// Directory failures during a lookup are not errors at this level: they
/// become a denial. Only the eager startup connect surfaces them.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// The reader link failed.
    #[error("Reader error: {0}")]
    Hardware(#[from] HardwareError),

    /// The directory could not be reached.
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let error: AccessError = HardwareError::disconnected("/dev/ttyUSB0").into();
        assert!(matches!(error, AccessError::Hardware(_)));
        assert_eq!(
            error.to_string(),
            "Reader error: Device disconnected: /dev/ttyUSB0"
        );

        let error: AccessError = DirectoryError::connection("refused").into();
        assert!(matches!(error, AccessError::Directory(_)));
    }
}
