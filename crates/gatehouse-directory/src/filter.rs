//! Account search filter.
//!
//! Matches an account by id and location code, skipping disabled accounts:
//!
//! ```text
//! (&(<id_field>=<id>)(<lcc_field>=<lcc>)(!(<disabled_field>=TRUE)))
//! ```
//!
//! Values are escaped per RFC 4515, so a credential can never widen the
//! search.

use std::fmt;

use ldap3::ldap_escape;

use crate::DirectoryConfig;

/// Filter selecting one enabled account by id and location code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFilter {
    id_field: String,
    id: String,
    location_code_field: String,
    location_code: String,
    disabled_field: String,
}

impl AccountFilter {
    /// Build the filter for the attributes named in `config`.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatehouse_directory::{AccountFilter, DirectoryConfig};
    ///
    /// # let config: DirectoryConfig = toml::from_str(r#"
    /// #     host = "ldap://localhost"
    /// #     bind_dn = "cn=admin"
    /// #     password = "x"
    /// #     search_base = "dc=example"
    /// #     id_field = "employeeNumber"
    /// #     location_code_field = "lcc"
    /// #     username_field = "uid"
    /// #     disabled_field = "accountLocked"
    /// # "#).unwrap();
    /// let filter = AccountFilter::new(&config, "23456789", "01");
    /// assert_eq!(
    ///     filter.to_string(),
    ///     "(&(employeeNumber=23456789)(lcc=01)(!(accountLocked=TRUE)))"
    /// );
    /// ```
    pub fn new(
        config: &DirectoryConfig,
        id: impl Into<String>,
        location_code: impl Into<String>,
    ) -> Self {
        Self {
            id_field: config.id_field.clone(),
            id: id.into(),
            location_code_field: config.location_code_field.clone(),
            location_code: location_code.into(),
            disabled_field: config.disabled_field.clone(),
        }
    }

    /// Id the filter matches.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Location code the filter matches.
    pub fn location_code(&self) -> &str {
        &self.location_code
    }
}

impl fmt::Display for AccountFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(&({}={})({}={})(!({}=TRUE)))",
            self.id_field,
            ldap_escape(self.id.as_str()),
            self.location_code_field,
            ldap_escape(self.location_code.as_str()),
            self.disabled_field
        )
    }
}
