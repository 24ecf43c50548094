//! LDAP backend built on `ldap3`.
//!
//! Each [`LdapConnection`] is one TCP (or TLS, for `ldaps://` URLs) session
//! with a simple bind. The `ldap3` connection driver runs on its own task for
//! as long as the connection lives.

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use tracing::{debug, warn};

use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, Result};
use crate::filter::AccountFilter;
use crate::traits::{DirectoryConnection, DirectoryConnector, DirectoryEntry};

/// Opens simple-bound LDAP connections.
#[derive(Debug, Clone)]
pub struct LdapConnector {
    config: DirectoryConfig,
}

impl LdapConnector {
    /// Create a connector for the server in `config`.
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }
}

/// A bound LDAP session.
pub struct LdapConnection {
    ldap: Ldap,
    config: DirectoryConfig,
}

impl std::fmt::Debug for LdapConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnection")
            .field("host", &self.config.host)
            .finish_non_exhaustive()
    }
}

impl DirectoryConnector for LdapConnector {
    type Connection = LdapConnection;

    async fn connect(&self) -> Result<LdapConnection> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.config.timeout());

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.host)
            .await
            .map_err(map_ldap_error)?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection driver stopped: {}", e);
            }
        });

        debug!(bind_dn = %self.config.bind_dn, "Binding to directory");
        ldap.with_timeout(self.config.timeout())
            .simple_bind(&self.config.bind_dn, &self.config.password)
            .await
            .and_then(|result| result.success())
            .map_err(map_ldap_error)?;

        Ok(LdapConnection {
            ldap,
            config: self.config.clone(),
        })
    }
}

impl DirectoryConnection for LdapConnection {
    async fn search(
        &mut self,
        base: &str,
        filter: &AccountFilter,
        attribute: &str,
    ) -> Result<Vec<DirectoryEntry>> {
        let filter = filter.to_string();

        let (entries, _result) = self
            .ldap
            .with_timeout(self.config.timeout())
            .search(base, Scope::Subtree, &filter, vec![attribute])
            .await
            .and_then(|result| result.success())
            .map_err(map_ldap_error)?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let entry = SearchEntry::construct(entry);
                DirectoryEntry {
                    dn: entry.dn,
                    attributes: entry.attrs,
                }
            })
            .collect())
    }

    async fn unbind(&mut self) -> Result<()> {
        self.ldap.unbind().await.map_err(map_ldap_error)
    }
}

/// Classify an `ldap3` error.
///
/// Server result codes keep their code (busy and unavailable count as
/// connection failures); everything else means the session itself broke.
fn map_ldap_error(error: LdapError) -> DirectoryError {
    match error {
        LdapError::LdapResult { result } => DirectoryError::operation(result.rc, result.text),
        LdapError::Timeout { .. } => DirectoryError::connection("operation timed out"),
        other => DirectoryError::connection(other.to_string()),
    }
}
