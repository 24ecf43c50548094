//! Directory connection settings.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Default timeout for directory operations, in milliseconds.
///
/// Decisions run while polling is paused, so this bounds how long the
/// reader goes unobserved during a directory outage.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Where the directory lives, how to bind, and which attributes to search.
///
/// `Debug` output never includes the bind password.
///
/// # Example
///
/// ```
/// use gatehouse_directory::DirectoryConfig;
///
/// let config: DirectoryConfig = toml::from_str(r#"
///     host = "ldap://ldap.example.edu"
///     bind_dn = "cn=gatehouse,dc=example,dc=edu"
///     password = "secret"
///     search_base = "ou=people,dc=example,dc=edu"
///     id_field = "employeeNumber"
///     location_code_field = "lcc"
///     username_field = "uid"
///     disabled_field = "accountLocked"
/// "#).unwrap();
///
/// assert_eq!(config.timeout().as_millis(), 5000);
/// assert!(!format!("{config:?}").contains("secret"));
/// ```
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DirectoryConfig {
    /// Server URL, `ldap://` or `ldaps://`.
    pub host: String,

    /// DN used for the simple bind.
    pub bind_dn: String,

    /// Password used for the simple bind.
    pub password: String,

    /// Base DN of the subtree search.
    pub search_base: String,

    /// Attribute holding the numeric id.
    pub id_field: String,

    /// Attribute holding the location code.
    pub location_code_field: String,

    /// Attribute returned as the username.
    pub username_field: String,

    /// Attribute that is `TRUE` on disabled accounts.
    pub disabled_field: String,

    /// Bound on every directory operation.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl DirectoryConfig {
    /// Operation timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("host", &self.host)
            .field("bind_dn", &self.bind_dn)
            .field("password", &"<redacted>")
            .field("search_base", &self.search_base)
            .field("id_field", &self.id_field)
            .field("location_code_field", &self.location_code_field)
            .field("username_field", &self.username_field)
            .field("disabled_field", &self.disabled_field)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}
