//! Directory lookups for Gatehouse.
//!
//! This crate resolves a card's id and location code to the username of an
//! enabled account. It holds a single long-lived connection, connects lazily,
//! and on a connection-level failure reconnects and retries exactly once.
//!
//! # Components
//!
//! - **DirectoryClient**: connection ownership, lazy connect, retry contract
//! - **AccountFilter**: the escaped LDAP search filter
//! - **LdapConnector**: production backend over `ldap3`
//! - **MockDirectory**: in-memory backend for tests
//!
//! # Example
//!
//! ```no_run
//! use gatehouse_directory::{DirectoryClient, DirectoryConfig, LdapConnector};
//!
//! # async fn example(config: DirectoryConfig) -> gatehouse_directory::Result<()> {
//! let mut client = DirectoryClient::new(LdapConnector::new(config.clone()), config);
//! let username = client.query_username("23456789", "01").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod ldap;
pub mod mock;
pub mod traits;

pub use client::DirectoryClient;
pub use config::{DEFAULT_TIMEOUT_MS, DirectoryConfig};
pub use error::{DirectoryError, Result};
pub use filter::AccountFilter;
pub use ldap::{LdapConnection, LdapConnector};
pub use traits::{DirectoryConnection, DirectoryConnector, DirectoryEntry};
