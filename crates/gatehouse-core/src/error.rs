use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Protocol errors
    #[error("Invalid unit address: {0}")]
    InvalidUnitAddress(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    // Credential errors
    #[error("Invalid credential format: {0}")]
    InvalidCredentialFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;
