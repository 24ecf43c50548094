//! Status decoding.
//!
//! Maps a [`LinkResponse`] to a [`ReaderStatus`] using a fixed precedence
//! over the status markers:
//!
//! 1. no response or malformed frame → `LinkLost`
//! 2. contains `D` (card in memory) → `CredentialWaiting`
//! 3. contains `T` (tamper) → `Tamper`
//! 4. contains `P` (power failure) → `RecoveredFromPowerFailure`
//! 5. anything else → `Idle`
//!
//! The precedence for frames carrying several markers at once has not been
//! confirmed against the Elcom documentation.
//!
//! `ForcedOpen` is never produced here: the markers above cannot express it.

use gatehouse_core::ReaderStatus;
use gatehouse_core::constants::{MARKER_CARD_IN_MEMORY, MARKER_POWER_FAILURE, MARKER_TAMPER};

use crate::LinkResponse;

/// Decode the reader status carried by a response.
///
/// # Examples
///
/// ```
/// use gatehouse_core::ReaderStatus;
/// use gatehouse_protocol::{LinkResponse, decode_status};
///
/// let response = LinkResponse::Payload("TD".to_string());
/// assert_eq!(decode_status(&response), ReaderStatus::CredentialWaiting);
///
/// assert_eq!(decode_status(&LinkResponse::Timeout), ReaderStatus::LinkLost);
/// ```
#[must_use]
pub fn decode_status(response: &LinkResponse) -> ReaderStatus {
    let Some(markers) = response.payload() else {
        return ReaderStatus::LinkLost;
    };

    if markers.contains(MARKER_CARD_IN_MEMORY) {
        ReaderStatus::CredentialWaiting
    } else if markers.contains(MARKER_TAMPER) {
        ReaderStatus::Tamper
    } else if markers.contains(MARKER_POWER_FAILURE) {
        ReaderStatus::RecoveredFromPowerFailure
    } else {
        ReaderStatus::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn payload(s: &str) -> LinkResponse {
        LinkResponse::Payload(s.to_string())
    }

    #[rstest]
    #[case("0", ReaderStatus::Idle)]
    #[case("S", ReaderStatus::Idle)]
    #[case("D", ReaderStatus::CredentialWaiting)]
    #[case("T", ReaderStatus::Tamper)]
    #[case("P", ReaderStatus::RecoveredFromPowerFailure)]
    #[case("TD", ReaderStatus::CredentialWaiting)] // card before tamper
    #[case("PD", ReaderStatus::CredentialWaiting)] // card before power failure
    #[case("PT", ReaderStatus::Tamper)] // tamper before power failure
    #[case("TP", ReaderStatus::Tamper)]
    #[case("PTD", ReaderStatus::CredentialWaiting)]
    fn test_marker_precedence(#[case] markers: &str, #[case] expected: ReaderStatus) {
        assert_eq!(decode_status(&payload(markers)), expected);
    }

    #[test]
    fn test_absent_response_is_link_lost() {
        assert_eq!(decode_status(&LinkResponse::Timeout), ReaderStatus::LinkLost);
        assert_eq!(
            decode_status(&LinkResponse::MalformedFrame),
            ReaderStatus::LinkLost
        );
    }

    #[test]
    fn test_markers_are_case_sensitive() {
        assert_eq!(decode_status(&payload("dtp")), ReaderStatus::Idle);
    }

    #[test]
    fn test_never_forced_open() {
        for markers in ["", "0", "D", "T", "P", "F", "O", "DTPFO"] {
            assert_ne!(decode_status(&payload(markers)), ReaderStatus::ForcedOpen);
        }
    }
}
