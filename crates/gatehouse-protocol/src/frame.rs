//! Request frames and decoded responses.
//!
//! # Wire Format
//!
//! ```text
//! request:  # 2 2 ? \r
//!           ^ ^^^ ^ ^^
//!           | |   | terminator
//!           | |   command
//!           | unit address
//!           start marker
//!
//! response: 2 2 D ... \r\n
//!           ^^^ ^^^^^
//!           |   payload
//!           echoed address
//! ```
//!
//! A response line is reduced to a [`LinkResponse`]: either its payload, or
//! one of the two "nothing usable arrived" outcomes. Keeping those two apart
//! lets callers tell "reader answered with nothing" from "reader did not
//! answer at all".

use gatehouse_core::UnitAddress;
use gatehouse_core::constants::{FRAME_END, FRAME_START, UNIT_ADDRESS_LENGTH};

use crate::Command;

/// A command addressed to one reader unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Target unit address.
    pub address: UnitAddress,

    /// Command to execute.
    pub command: Command,
}

impl Request {
    /// Create a new request.
    pub fn new(address: UnitAddress, command: Command) -> Self {
        Self { address, command }
    }

    /// Encode the request to its wire bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_request(&self.address, self.command)
    }
}

/// Encode a request frame: `'#' + address + command + '\r'`.
///
/// # Examples
///
/// ```
/// use gatehouse_core::UnitAddress;
/// use gatehouse_protocol::{Command, encode_request};
///
/// let bytes = encode_request(&UnitAddress::default(), Command::QueryStatus);
/// assert_eq!(bytes, b"#22?\r");
/// ```
#[must_use]
pub fn encode_request(address: &UnitAddress, command: Command) -> Vec<u8> {
    let command = command.as_str();
    let mut bytes = Vec::with_capacity(2 + UNIT_ADDRESS_LENGTH + command.len());
    bytes.push(FRAME_START);
    bytes.extend_from_slice(address.as_str().as_bytes());
    bytes.extend_from_slice(command.as_bytes());
    bytes.push(FRAME_END);
    bytes
}

/// Parse a request line (without its terminator) back into a [`Request`].
///
/// Used by the device side of the protocol, e.g. the mock reader.
///
/// # Examples
///
/// ```
/// use gatehouse_protocol::{Command, parse_request};
///
/// let request = parse_request("#22OA").unwrap();
/// assert_eq!(request.address.as_str(), "22");
/// assert_eq!(request.command, Command::OpenGranted);
///
/// assert!(parse_request("22OA").is_none());
/// ```
#[must_use]
pub fn parse_request(line: &str) -> Option<Request> {
    let rest = line.strip_prefix(FRAME_START as char)?;
    let address = rest.get(..UNIT_ADDRESS_LENGTH)?;
    let command = rest.get(UNIT_ADDRESS_LENGTH..)?;

    Some(Request {
        address: UnitAddress::new(address).ok()?,
        command: command.parse().ok()?,
    })
}

/// Outcome of one command on the serial link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkResponse {
    /// The reader answered; the echoed address has been stripped.
    Payload(String),

    /// The reader did not answer within the response timeout.
    Timeout,

    /// The reader answered with a line too short to carry a payload, or
    /// with a line the codec had to discard.
    MalformedFrame,
}

impl LinkResponse {
    /// Reduce a received line to a response.
    ///
    /// The first two characters echo the unit address and are stripped. A
    /// line of two characters or fewer carries no payload and becomes
    /// [`LinkResponse::MalformedFrame`].
    ///
    /// # Examples
    ///
    /// ```
    /// use gatehouse_protocol::LinkResponse;
    ///
    /// assert_eq!(
    ///     LinkResponse::from_line("22D"),
    ///     LinkResponse::Payload("D".to_string())
    /// );
    /// assert_eq!(LinkResponse::from_line("22"), LinkResponse::MalformedFrame);
    /// ```
    #[must_use]
    pub fn from_line(line: &str) -> Self {
        match line.char_indices().nth(UNIT_ADDRESS_LENGTH) {
            Some((offset, _)) => LinkResponse::Payload(line[offset..].to_string()),
            None => LinkResponse::MalformedFrame,
        }
    }

    /// Echoed address of a received line, if it has one.
    #[must_use]
    pub fn echoed_address(line: &str) -> Option<&str> {
        line.get(..UNIT_ADDRESS_LENGTH)
    }

    /// Get the payload, if the reader answered with one.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        match self {
            LinkResponse::Payload(payload) => Some(payload),
            LinkResponse::Timeout | LinkResponse::MalformedFrame => None,
        }
    }

    /// Consume the response, returning the payload if present.
    #[must_use]
    pub fn into_payload(self) -> Option<String> {
        match self {
            LinkResponse::Payload(payload) => Some(payload),
            LinkResponse::Timeout | LinkResponse::MalformedFrame => None,
        }
    }

    /// Returns `true` if the reader did not answer.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkResponse::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Command::QueryStatus, b"#22?\r".as_slice())]
    #[case(Command::ReadCredential, b"#22R\r".as_slice())]
    #[case(Command::OpenGranted, b"#22OA\r".as_slice())]
    #[case(Command::OpenDenied, b"#22OD\r".as_slice())]
    fn test_encode_request(#[case] command: Command, #[case] expected: &[u8]) {
        assert_eq!(encode_request(&UnitAddress::default(), command), expected);
    }

    #[test]
    fn test_request_to_bytes_uses_address() {
        let request = Request::new(UnitAddress::new("07").unwrap(), Command::ReadCredential);
        assert_eq!(request.to_bytes(), b"#07R\r");
    }

    #[rstest]
    #[case("#22?", "22", Command::QueryStatus)]
    #[case("#05R", "05", Command::ReadCredential)]
    #[case("#22OD", "22", Command::OpenDenied)]
    fn test_parse_request(#[case] line: &str, #[case] address: &str, #[case] command: Command) {
        let request = parse_request(line).unwrap();
        assert_eq!(request.address.as_str(), address);
        assert_eq!(request.command, command);
    }

    #[rstest]
    #[case("")]
    #[case("#")]
    #[case("#2")]
    #[case("#22")] // no command
    #[case("#22X")] // unknown command
    #[case("#AB?")] // invalid address
    #[case("22?")] // missing start marker
    fn test_parse_request_invalid(#[case] line: &str) {
        assert!(parse_request(line).is_none());
    }

    #[rstest]
    #[case("22D", Some("D"))]
    #[case("22TP", Some("TP"))]
    #[case("221123456789012345678", Some("1123456789012345678"))]
    #[case("220", Some("0"))]
    #[case("22", None)]
    #[case("2", None)]
    #[case("", None)]
    fn test_from_line(#[case] line: &str, #[case] payload: Option<&str>) {
        let response = LinkResponse::from_line(line);
        assert_eq!(response.payload(), payload);
        if payload.is_none() {
            assert_eq!(response, LinkResponse::MalformedFrame);
        }
    }

    #[test]
    fn test_from_line_multibyte_does_not_panic() {
        // Lossy decoding can put a multi-byte replacement char anywhere.
        let response = LinkResponse::from_line("2\u{FFFD}D");
        assert_eq!(response, LinkResponse::Payload("D".to_string()));
    }

    #[test]
    fn test_echoed_address() {
        assert_eq!(LinkResponse::echoed_address("22D"), Some("22"));
        assert_eq!(LinkResponse::echoed_address("2"), None);
    }

    #[test]
    fn test_timeout_is_distinct_from_malformed() {
        assert!(LinkResponse::Timeout.is_timeout());
        assert!(!LinkResponse::MalformedFrame.is_timeout());
        assert_ne!(LinkResponse::Timeout, LinkResponse::MalformedFrame);
        assert_eq!(LinkResponse::Timeout.into_payload(), None);
    }
}
