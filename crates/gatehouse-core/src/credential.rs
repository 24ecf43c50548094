//! Credential layouts accepted by the access controller.
//!
//! A swiped card yields a raw string. Two layouts are recognised, tried in
//! this order:
//!
//! | Layout | Shape | id | location code |
//! |--------|-------|----|---------------|
//! | [`CredentialLayout::Numeric`] | 19 digits | chars `[1, 9)` | chars `[9, 11)` |
//! | [`CredentialLayout::Separated`] | 9 digits, `D`, 3 digits | chars `[0, 9)` | chars `[10, 11)` |
//!
//! Anything else is rejected without consulting the directory.
//!
//! # Examples
//!
//! ```
//! use gatehouse_core::{CredentialLayout, ParsedCredential};
//!
//! let credential = ParsedCredential::parse("0234567890100000000").unwrap();
//! assert_eq!(credential.id(), "23456789");
//! assert_eq!(credential.location_code(), "01");
//! assert_eq!(credential.layout(), CredentialLayout::Numeric);
//!
//! assert!(ParsedCredential::parse("abc").is_err());
//! ```

use crate::{
    Result,
    constants::{CREDENTIAL_SEPARATOR, NUMERIC_CREDENTIAL_LENGTH, SEPARATED_CREDENTIAL_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the accepted layouts a credential matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialLayout {
    /// 19 numeric digits.
    Numeric,

    /// 9 digits, a literal `D`, then 3 digits.
    Separated,
}

impl fmt::Display for CredentialLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialLayout::Numeric => write!(f, "numeric"),
            CredentialLayout::Separated => write!(f, "separated"),
        }
    }
}

/// Credential split into the fields the directory is queried with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedCredential {
    id: String,
    location_code: String,
    layout: CredentialLayout,
}

impl ParsedCredential {
    /// Parse a raw credential read from the reader.
    ///
    /// The input is matched as-is: surrounding whitespace is not trimmed.
    ///
    /// # Errors
    /// Returns `Error::InvalidCredentialFormat` if the input matches neither
    /// accepted layout.
    pub fn parse(raw: &str) -> Result<Self> {
        let bytes = raw.as_bytes();

        if bytes.len() == NUMERIC_CREDENTIAL_LENGTH && all_digits(bytes) {
            return Ok(Self {
                id: raw[1..9].to_string(),
                location_code: raw[9..11].to_string(),
                layout: CredentialLayout::Numeric,
            });
        }

        if bytes.len() == SEPARATED_CREDENTIAL_LENGTH
            && all_digits(&bytes[..9])
            && bytes[9] == CREDENTIAL_SEPARATOR
            && all_digits(&bytes[10..])
        {
            return Ok(Self {
                id: raw[0..9].to_string(),
                location_code: raw[10..11].to_string(),
                layout: CredentialLayout::Separated,
            });
        }

        Err(Error::InvalidCredentialFormat(format!(
            "{raw:?} matches no accepted layout"
        )))
    }

    /// Numeric account id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Location code paired with the id.
    #[must_use]
    pub fn location_code(&self) -> &str {
        &self.location_code
    }

    /// Layout the raw credential matched.
    #[must_use]
    pub fn layout(&self) -> CredentialLayout {
        self.layout
    }
}

impl fmt::Display for ParsedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (LCC {})", self.id, self.location_code)
    }
}

impl std::str::FromStr for ParsedCredential {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ParsedCredential::parse(s)
    }
}

#[inline]
fn all_digits(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_digit)
}
