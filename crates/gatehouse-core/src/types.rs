use crate::{
    Result,
    constants::{DEFAULT_UNIT_ADDRESS, UNIT_ADDRESS_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the card reader as seen by the polling state machine.
///
/// Exactly one status is current at any time. The state machine reports a
/// change only when a newly computed status differs from the held one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderStatus {
    /// Reader is ready and holds no card.
    #[default]
    Idle,

    /// A card has been swiped and its credential is waiting in memory.
    CredentialWaiting,

    /// The reader did not answer, or answered with an empty frame.
    LinkLost,

    /// The reader reported that it restarted after losing power.
    RecoveredFromPowerFailure,

    /// The tamper switch has been tripped.
    Tamper,

    /// The door has been forced open.
    ///
    /// The minimal Elcom status markers cannot express this state; it is
    /// only reachable on hardware that reports it explicitly.
    ForcedOpen,
}

impl ReaderStatus {
    /// Returns `true` for statuses that should raise an alarm.
    ///
    /// Alarm statuses carry no access decision; they are surfaced to the
    /// access log and audit stream only.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatehouse_core::ReaderStatus;
    ///
    /// assert!(ReaderStatus::Tamper.is_alarm());
    /// assert!(!ReaderStatus::CredentialWaiting.is_alarm());
    /// ```
    #[inline]
    #[must_use]
    pub fn is_alarm(self) -> bool {
        matches!(
            self,
            ReaderStatus::LinkLost
                | ReaderStatus::RecoveredFromPowerFailure
                | ReaderStatus::Tamper
                | ReaderStatus::ForcedOpen
        )
    }
}

impl fmt::Display for ReaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            ReaderStatus::Idle => "Idle",
            ReaderStatus::CredentialWaiting => "CredentialWaiting",
            ReaderStatus::LinkLost => "LinkLost",
            ReaderStatus::RecoveredFromPowerFailure => "RecoveredFromPowerFailure",
            ReaderStatus::Tamper => "Tamper",
            ReaderStatus::ForcedOpen => "ForcedOpen",
        };
        write!(f, "{}", status)
    }
}

/// Reader unit address (2 ASCII digits).
///
/// Every request frame carries this address and every response echoes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitAddress(String);

impl UnitAddress {
    /// Create a new unit address with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidUnitAddress` unless the address is exactly two
    /// ASCII digits.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatehouse_core::UnitAddress;
    ///
    /// let address = UnitAddress::new("22").unwrap();
    /// assert_eq!(address.as_str(), "22");
    ///
    /// assert!(UnitAddress::new("2").is_err());
    /// ```
    pub fn new(address: &str) -> Result<Self> {
        if address.len() != UNIT_ADDRESS_LENGTH || !address.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidUnitAddress(format!(
                "Unit address must be {UNIT_ADDRESS_LENGTH} digits, got {address:?}"
            )));
        }
        Ok(UnitAddress(address.to_string()))
    }

    /// Get the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UnitAddress {
    fn default() -> Self {
        UnitAddress(DEFAULT_UNIT_ADDRESS.to_string())
    }
}

impl fmt::Display for UnitAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UnitAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        UnitAddress::new(s)
    }
}

impl TryFrom<String> for UnitAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        UnitAddress::new(&value)
    }
}

impl From<UnitAddress> for String {
    fn from(address: UnitAddress) -> Self {
        address.0
    }
}

/// Why a credential presentation was denied.
///
/// Each reason is logged under its own category so a directory outage can
/// be told apart from an unknown card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The credential matched neither accepted layout.
    InvalidFormat,

    /// The credential was well formed but the directory has no enabled
    /// account for it.
    Unauthorized,

    /// The directory query failed, including its single retry.
    DirectoryError,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::InvalidFormat => write!(f, "invalid format"),
            DenialReason::Unauthorized => write!(f, "unauthorized"),
            DenialReason::DirectoryError => write!(f, "directory error"),
        }
    }
}

/// Outcome of one credential presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    /// Access granted to the named account.
    Granted { username: String },

    /// Access denied.
    Denied(DenialReason),
}

impl AccessDecision {
    /// Create a granted decision.
    pub fn granted(username: impl Into<String>) -> Self {
        AccessDecision::Granted {
            username: username.into(),
        }
    }

    /// Returns `true` if access was granted.
    #[inline]
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted { .. })
    }

    /// Get the denial reason, if access was denied.
    #[must_use]
    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            AccessDecision::Denied(reason) => Some(*reason),
            AccessDecision::Granted { .. } => None,
        }
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDecision::Granted { username } => write!(f, "granted to {}", username),
            AccessDecision::Denied(reason) => write!(f, "denied ({})", reason),
        }
    }
}
