//! Directory client with lazy connect and a single reconnect-and-retry.
//!
//! # Connection Lifecycle
//!
//! The client holds at most one bound connection:
//!
//! 1. [`connect`](DirectoryClient::connect) drops any held connection (a
//!    failed unbind is logged, not returned) and binds a new one.
//! 2. [`query_username`](DirectoryClient::query_username) connects lazily if
//!    nothing is held.
//! 3. [`close_connection`](DirectoryClient::close_connection) unbinds; calling
//!    it again is a no-op.
//!
//! # Retry Contract
//!
//! A lookup whose first attempt fails at the connection level (see
//! [`DirectoryError::is_connection_level`]) reconnects exactly once and
//! searches exactly once more. The second outcome, success or failure, is
//! final. Any other failure is returned immediately.
//!
//! Every connect and search is bounded by the configured timeout, so a
//! directory outage delays a decision by at most a few timeouts.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, Result};
use crate::filter::AccountFilter;
use crate::traits::{DirectoryConnection, DirectoryConnector};

/// Username lookups against a directory.
///
/// # Example
///
/// ```no_run
/// use gatehouse_directory::{DirectoryClient, DirectoryConfig, LdapConnector};
///
/// # async fn example(config: DirectoryConfig) -> gatehouse_directory::Result<()> {
/// let mut client = DirectoryClient::new(LdapConnector::new(config.clone()), config);
/// client.connect().await?;
///
/// match client.query_username("23456789", "01").await? {
///     Some(username) => println!("Card belongs to {username}"),
///     None => println!("Unknown or disabled account"),
/// }
///
/// client.close_connection().await?;
/// # Ok(())
/// # }
/// ```
pub struct DirectoryClient<C: DirectoryConnector> {
    /// Opens new connections.
    connector: C,

    /// Search base, attribute names and timeout.
    config: DirectoryConfig,

    /// Currently held connection (None until first use or after close).
    connection: Option<C::Connection>,
}

impl<C: DirectoryConnector> DirectoryClient<C> {
    /// Create a client. No connection is made until first use.
    pub fn new(connector: C, config: DirectoryConfig) -> Self {
        debug!(host = %config.host, "Creating directory client");

        Self {
            connector,
            config,
            connection: None,
        }
    }

    /// Returns `true` while a connection is held.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// The connector this client opens connections with.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Drop any held connection and bind a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the new connection cannot be established. The
    /// client then holds no connection.
    pub async fn connect(&mut self) -> Result<()> {
        trace!("Establishing directory connection");

        if let Some(mut previous) = self.connection.take() {
            trace!("Previous connection detected, closing first");
            let timeout = self.config.timeout();
            if let Err(e) = bounded(timeout, previous.unbind()).await {
                warn!("Could not close previous directory connection, continuing: {}", e);
            }
        }

        let connection = bounded(self.config.timeout(), self.connector.connect()).await?;
        self.connection = Some(connection);

        info!(host = %self.config.host, "Directory connection established");
        Ok(())
    }

    /// Look up the username of the enabled account with this id and
    /// location code.
    ///
    /// Returns `None` if no enabled account matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails, after the single retry where
    /// the failure allowed one.
    pub async fn query_username(&mut self, id: &str, location_code: &str) -> Result<Option<String>> {
        let filter = AccountFilter::new(&self.config, id, location_code);

        match self.query_once(&filter).await {
            Err(e) if e.is_connection_level() => {
                warn!("Directory connection error on query, reconnecting: {}", e);
                self.connect().await?;
                self.query_once(&filter).await
            }
            result => result,
        }
    }

    async fn query_once(&mut self, filter: &AccountFilter) -> Result<Option<String>> {
        if self.connection.is_none() {
            self.connect().await?;
        }
        let connection = self.connection.as_mut().ok_or(DirectoryError::NotConnected)?;

        trace!(id = filter.id(), lcc = filter.location_code(), "Querying directory");

        let entries = bounded(
            self.config.timeout(),
            connection.search(&self.config.search_base, filter, &self.config.username_field),
        )
        .await?;

        let Some(entry) = entries.first() else {
            return Ok(None);
        };

        entry
            .first_value(&self.config.username_field)
            .map(|username| Some(username.to_string()))
            .ok_or_else(|| {
                DirectoryError::InvalidResponse(format!(
                    "entry {} has no {} attribute",
                    entry.dn, self.config.username_field
                ))
            })
    }

    /// Unbind and drop the held connection, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the unbind fails; the connection is dropped
    /// either way.
    pub async fn close_connection(&mut self) -> Result<()> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };

        trace!("Closing directory connection");
        bounded(self.config.timeout(), connection.unbind()).await
    }
}

impl<C: DirectoryConnector> Drop for DirectoryClient<C> {
    fn drop(&mut self) {
        if self.connection.is_some() {
            debug!("DirectoryClient dropped while connected - connection will be closed");
        }
    }
}

/// Run a directory operation under a timeout.
async fn bounded<T>(timeout: Duration, operation: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(DirectoryError::Timeout(timeout.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDirectory;

    fn config() -> DirectoryConfig {
        DirectoryConfig {
            host: "ldap://mock".to_string(),
            bind_dn: "cn=admin".to_string(),
            password: "x".to_string(),
            search_base: "dc=example".to_string(),
            id_field: "id".to_string(),
            location_code_field: "lcc".to_string(),
            username_field: "uid".to_string(),
            disabled_field: "locked".to_string(),
            timeout_ms: 5000,
        }
    }

    fn client(directory: &MockDirectory) -> DirectoryClient<MockDirectory> {
        DirectoryClient::new(directory.clone(), config())
    }

    #[tokio::test]
    async fn test_lazy_connect() {
        let directory = MockDirectory::new().with_user("23456789", "01", "alice");
        let mut client = client(&directory);
        assert!(!client.is_connected());

        let username = client.query_username("23456789", "01").await.unwrap();
        assert_eq!(username.as_deref(), Some("alice"));
        assert!(client.is_connected());
        assert_eq!(directory.connects(), 1);
        assert_eq!(directory.searches(), 1);
    }

    #[tokio::test]
    async fn test_no_match() {
        let directory = MockDirectory::new().with_user("23456789", "01", "alice");
        let mut client = client(&directory);

        assert_eq!(client.query_username("23456789", "02").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_disabled_account_does_not_match() {
        let directory = MockDirectory::new().with_disabled_user("23456789", "01", "mallory");
        let mut client = client(&directory);

        assert_eq!(client.query_username("23456789", "01").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_connection_failure_retries_once() {
        let directory = MockDirectory::new().with_user("23456789", "01", "alice");
        directory.fail_next_search(DirectoryError::connection("reset by peer"));
        let mut client = client(&directory);

        let username = client.query_username("23456789", "01").await.unwrap();
        assert_eq!(username.as_deref(), Some("alice"));
        assert_eq!(directory.searches(), 2);
        assert_eq!(directory.connects(), 2);
    }

    #[tokio::test]
    async fn test_second_failure_propagates() {
        let directory = MockDirectory::new().with_user("23456789", "01", "alice");
        directory.fail_next_search(DirectoryError::connection("reset by peer"));
        directory.fail_next_search(DirectoryError::connection("reset again"));
        let mut client = client(&directory);

        let result = client.query_username("23456789", "01").await;
        assert_eq!(result, Err(DirectoryError::connection("reset again")));
        assert_eq!(directory.searches(), 2);
    }

    #[tokio::test]
    async fn test_operation_error_is_not_retried() {
        let directory = MockDirectory::new();
        directory.fail_next_search(DirectoryError::operation(32, "no such object"));
        let mut client = client(&directory);

        let result = client.query_username("23456789", "01").await;
        assert!(matches!(result, Err(DirectoryError::Operation { code: 32, .. })));
        assert_eq!(directory.searches(), 1);
        assert_eq!(directory.connects(), 1);
    }

    #[tokio::test]
    async fn test_failed_reconnect_propagates() {
        let directory = MockDirectory::new();
        directory.fail_next_search(DirectoryError::connection("reset by peer"));
        let mut client = client(&directory);
        client.connect().await.unwrap();

        directory.fail_next_connect(DirectoryError::connection("refused"));
        let result = client.query_username("23456789", "01").await;

        assert_eq!(result, Err(DirectoryError::connection("refused")));
        assert_eq!(directory.searches(), 1);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_connect_replaces_previous_connection() {
        let directory = MockDirectory::new();
        let mut client = client(&directory);

        client.connect().await.unwrap();
        client.connect().await.unwrap();

        assert_eq!(directory.connects(), 2);
        assert_eq!(directory.unbinds(), 1);
    }

    #[tokio::test]
    async fn test_failed_unbind_does_not_block_connect() {
        let directory = MockDirectory::new();
        let mut client = client(&directory);
        client.connect().await.unwrap();

        directory.fail_next_unbind(DirectoryError::connection("already gone"));
        client.connect().await.unwrap();
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_close_connection_is_idempotent() {
        let directory = MockDirectory::new();
        let mut client = client(&directory);
        client.connect().await.unwrap();

        client.close_connection().await.unwrap();
        client.close_connection().await.unwrap();
        assert!(!client.is_connected());
        assert_eq!(directory.unbinds(), 1);
    }

    #[tokio::test]
    async fn test_entry_without_username_is_invalid() {
        let directory = MockDirectory::new().with_nameless_user("23456789", "01");
        let mut client = client(&directory);

        let result = client.query_username("23456789", "01").await;
        assert!(matches!(result, Err(DirectoryError::InvalidResponse(_))));
        assert_eq!(directory.searches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_search_times_out_and_retries() {
        let directory = MockDirectory::new().with_user("23456789", "01", "alice");
        directory.hang_next_search();
        let mut client = client(&directory);

        let username = client.query_username("23456789", "01").await.unwrap();
        assert_eq!(username.as_deref(), Some("alice"));
        assert_eq!(directory.searches(), 2);
    }
}
