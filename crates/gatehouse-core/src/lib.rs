pub mod constants;
pub mod credential;
pub mod error;
pub mod types;

pub use credential::{CredentialLayout, ParsedCredential};
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
