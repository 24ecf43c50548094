//! Property-based tests for status decoding, response framing and
//! credential parsing.
//!
//! These tests use proptest to generate arbitrary reader output and verify
//! that the decoding invariants hold for every input, not just the cases
//! listed in the unit tests.

use bytes::BytesMut;
use gatehouse_core::{ParsedCredential, ReaderStatus};
use gatehouse_protocol::{ElcomCodec, LinkResponse, decode_status};
use proptest::prelude::*;
use tokio_util::codec::Decoder;

/// Strategy for status payloads made of printable ASCII.
fn status_payload() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{0,16}").expect("Failed to create payload regex strategy")
}

/// Strategy for payloads that never carry the card-in-memory marker.
fn payload_without_card() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -CE-~]{0,16}").expect("Failed to create payload regex strategy")
}

proptest! {
    /// Property: a tamper marker without a card marker always decodes to
    /// `Tamper`, whatever else the frame carries and wherever the markers sit.
    #[test]
    fn prop_tamper_without_card_is_tamper(
        prefix in payload_without_card(),
        suffix in payload_without_card(),
    ) {
        let payload = format!("{prefix}T{suffix}");
        let status = decode_status(&LinkResponse::Payload(payload));
        prop_assert_eq!(status, ReaderStatus::Tamper);
    }

    /// Property: a card marker anywhere wins over every other marker.
    #[test]
    fn prop_card_marker_wins(prefix in status_payload(), suffix in status_payload()) {
        let payload = format!("{prefix}D{suffix}");
        let status = decode_status(&LinkResponse::Payload(payload));
        prop_assert_eq!(status, ReaderStatus::CredentialWaiting);
    }

    /// Property: a payload without any marker decodes to `Idle`.
    #[test]
    fn prop_no_marker_is_idle(payload in "[ -CE-OQ-SU-~]{0,16}") {
        let status = decode_status(&LinkResponse::Payload(payload));
        prop_assert_eq!(status, ReaderStatus::Idle);
    }

    /// Property: decoding is total and never yields `ForcedOpen`.
    #[test]
    fn prop_decode_never_forced_open(payload in status_payload()) {
        let status = decode_status(&LinkResponse::Payload(payload));
        prop_assert_ne!(status, ReaderStatus::ForcedOpen);
    }

    /// Property: stripping the address keeps everything after the first two
    /// characters, and short lines are malformed.
    #[test]
    fn prop_from_line_strips_address(line in "[0-9A-Z]{0,24}") {
        let response = LinkResponse::from_line(&line);
        if line.len() > 2 {
            prop_assert_eq!(response, LinkResponse::Payload(line[2..].to_string()));
        } else {
            prop_assert_eq!(response, LinkResponse::MalformedFrame);
        }
    }

    /// Property: lines survive the codec intact no matter how the bytes are
    /// split across reads.
    #[test]
    fn prop_codec_reassembles_split_lines(
        line in "22[0-9A-Z]{1,40}",
        split in 0usize..48,
    ) {
        let wire = format!("{line}\r\n");
        let split = split.min(wire.len());

        let mut codec = ElcomCodec::default();
        let mut buffer = BytesMut::from(&wire.as_bytes()[..split]);
        let mut decoded = codec.decode(&mut buffer).unwrap();

        buffer.extend_from_slice(&wire.as_bytes()[split..]);
        if decoded.is_none() {
            decoded = codec.decode(&mut buffer).unwrap();
        }

        prop_assert_eq!(decoded, Some(line));
        // The trailing \n belongs to the \r terminator.
        prop_assert_eq!(codec.decode(&mut buffer).unwrap(), None);
    }

    /// Property: any 19-digit string parses, with id and location code taken
    /// from fixed offsets.
    #[test]
    fn prop_numeric_credential_offsets(raw in "[0-9]{19}") {
        let credential = ParsedCredential::parse(&raw).unwrap();
        prop_assert_eq!(credential.id(), &raw[1..9]);
        prop_assert_eq!(credential.location_code(), &raw[9..11]);
    }

    /// Property: digit strings of any other length are rejected.
    #[test]
    fn prop_wrong_length_digits_rejected(raw in "[0-9]{0,30}") {
        prop_assume!(raw.len() != 19);
        prop_assert!(ParsedCredential::parse(&raw).is_err());
    }
}
