//! Elcom reader command set.
//!
//! The controller only needs four commands: a status query, a credential
//! read, and the two door commands that close out a presentation.

use std::fmt;
use std::str::FromStr;

use gatehouse_core::Error;

/// Command sent to the reader inside a request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Query reader status (`?`).
    QueryStatus,

    /// Read the credential held in memory (`R`).
    ReadCredential,

    /// Open normally, granting access (`OA`).
    OpenGranted,

    /// Signal access denied (`OD`).
    OpenDenied,
}

impl Command {
    /// Wire characters of the command.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatehouse_protocol::Command;
    ///
    /// assert_eq!(Command::QueryStatus.as_str(), "?");
    /// assert_eq!(Command::OpenGranted.as_str(), "OA");
    /// ```
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Command::QueryStatus => "?",
            Command::ReadCredential => "R",
            Command::OpenGranted => "OA",
            Command::OpenDenied => "OD",
        }
    }

    /// Returns `true` if the response to this command reports reader status.
    ///
    /// Door commands answer with the status the reader moved to, so the
    /// state machine decodes their responses like a poll.
    #[must_use]
    pub fn reports_status(self) -> bool {
        !matches!(self, Command::ReadCredential)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "?" => Ok(Command::QueryStatus),
            "R" => Ok(Command::ReadCredential),
            "OA" => Ok(Command::OpenGranted),
            "OD" => Ok(Command::OpenDenied),
            other => Err(Error::InvalidCommand(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Command::QueryStatus, "?")]
    #[case(Command::ReadCredential, "R")]
    #[case(Command::OpenGranted, "OA")]
    #[case(Command::OpenDenied, "OD")]
    fn test_command_wire_chars(#[case] command: Command, #[case] wire: &str) {
        assert_eq!(command.as_str(), wire);
        assert_eq!(command.to_string(), wire);
        assert_eq!(wire.parse::<Command>().unwrap(), command);
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!("X".parse::<Command>(), Err(Error::InvalidCommand(_))));
        assert!("".parse::<Command>().is_err());
    }

    #[test]
    fn test_reports_status() {
        assert!(Command::QueryStatus.reports_status());
        assert!(Command::OpenGranted.reports_status());
        assert!(Command::OpenDenied.reports_status());
        assert!(!Command::ReadCredential.reports_status());
    }
}
