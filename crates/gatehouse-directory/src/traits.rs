//! Directory backend traits.
//!
//! [`DirectoryClient`](crate::DirectoryClient) is generic over a
//! [`DirectoryConnector`], which establishes bound
//! [`DirectoryConnection`]s. The production backend is
//! [`LdapConnector`](crate::LdapConnector); tests use
//! [`MockDirectory`](crate::mock::MockDirectory).
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use std::collections::HashMap;

use crate::error::Result;
use crate::filter::AccountFilter;

/// One entry returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryEntry {
    /// Distinguished name of the entry.
    pub dn: String,

    /// Returned attributes and their values.
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Create an entry with no attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Add a single-valued attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), vec![value.into()]);
        self
    }

    /// First value of an attribute. Attribute names are case-insensitive.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatehouse_directory::DirectoryEntry;
    ///
    /// let entry = DirectoryEntry::new("uid=alice,dc=example").with_attribute("uid", "alice");
    /// assert_eq!(entry.first_value("UID"), Some("alice"));
    /// assert_eq!(entry.first_value("mail"), None);
    /// ```
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }
}

/// Establishes bound connections to a directory.
pub trait DirectoryConnector {
    /// Connection type produced by this connector.
    type Connection: DirectoryConnection;

    /// Open and bind a new connection.
    ///
    /// # Errors
    ///
    /// Returns a connection-level error if the server cannot be reached, or
    /// an operation error if the bind is rejected.
    async fn connect(&self) -> Result<Self::Connection>;
}

/// A bound connection to a directory.
pub trait DirectoryConnection {
    /// Subtree search under `base`, returning only `attribute`.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    async fn search(
        &mut self,
        base: &str,
        filter: &AccountFilter,
        attribute: &str,
    ) -> Result<Vec<DirectoryEntry>>;

    /// Unbind and release the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the unbind could not be sent.
    async fn unbind(&mut self) -> Result<()>;
}
