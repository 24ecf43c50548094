//! Core constants for the Elcom reader protocol and the access controller.
//!
//! This module defines the protocol-level and timing constants used
//! throughout the Gatehouse access controller. Keeping them in one place
//! ensures the serial link, the polling state machine and the access
//! controller agree on framing and timing.
//!
//! # Protocol Structure
//!
//! The Elcom MAG-742/MAG-7042 readers use a polled, line-oriented ASCII
//! protocol over RS-485:
//!
//! ```text
//! request:  #<ADDR><COMMAND><CR>
//! response: <ADDR><PAYLOAD><line end>
//! ```
//!
//! Where:
//! - `#` - Frame start marker
//! - `ADDR` - Two-character unit address (default `22`)
//! - `COMMAND` - Command characters (`?`, `R`, `OA`, `OD`)
//! - `<CR>` - Carriage return terminating the request
//! - `PAYLOAD` - Status markers or credential characters
//!
//! # Usage
//!
//! ```
//! use gatehouse_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(DEFAULT_UNIT_ADDRESS, "22");
//!
//! let timeout = Duration::from_millis(RESPONSE_TIMEOUT_MS);
//! assert_eq!(timeout.as_millis(), 1500);
//! ```

// ============================================================================
// Message Framing
// ============================================================================

/// Start marker of every request frame.
///
/// ```text
/// #22?<CR>
/// ^
/// Start marker
/// ```
pub const FRAME_START: u8 = b'#';

/// Carriage return terminating every request frame.
pub const FRAME_END: u8 = b'\r';

/// Line feed, accepted as a response terminator alongside [`FRAME_END`].
pub const LINE_FEED: u8 = b'\n';

/// Default unit address of the reader on the RS-485 bus.
pub const DEFAULT_UNIT_ADDRESS: &str = "22";

/// Unit address length in characters.
///
/// Responses echo the address in their first [`UNIT_ADDRESS_LENGTH`]
/// characters; a response no longer than this carries no payload.
pub const UNIT_ADDRESS_LENGTH: usize = 2;

/// Maximum accepted length of a single response line (bytes).
///
/// Longer lines are discarded by the codec and surface as malformed frames,
/// so line noise cannot grow the read buffer without bound.
pub const MAX_LINE_LENGTH: usize = 256;

// ============================================================================
// Serial Line Parameters
// ============================================================================

/// Serial baud rate used by Elcom readers.
pub const BAUD_RATE: u32 = 9600;

// ============================================================================
// Timing
// ============================================================================

/// Response timeout for a single command (milliseconds).
///
/// A reader that does not answer within this window is treated as
/// unreachable for that command. The state machine maps this to
/// `ReaderStatus::LinkLost`.
///
/// # Value: 1500ms
pub const RESPONSE_TIMEOUT_MS: u64 = 1500;

/// Interval between status polls (milliseconds).
///
/// # Value: 400ms
pub const POLL_INTERVAL_MS: u64 = 400;

/// Delay between observing a card in memory and reading it (milliseconds).
///
/// The reader locks up when the credential is requested immediately after
/// it reported a card in memory. Do not lower this without testing against
/// real hardware.
///
/// # Value: 200ms
pub const SETTLE_DELAY_MS: u64 = 200;

// ============================================================================
// Status Markers
// ============================================================================

/// Status marker: a card is held in the reader's memory.
pub const MARKER_CARD_IN_MEMORY: char = 'D';

/// Status marker: the tamper switch has been tripped.
pub const MARKER_TAMPER: char = 'T';

/// Status marker: the unit recovered from a power failure.
pub const MARKER_POWER_FAILURE: char = 'P';

// ============================================================================
// Credential Layouts
// ============================================================================

/// Length of the all-numeric credential layout.
pub const NUMERIC_CREDENTIAL_LENGTH: usize = 19;

/// Length of the separated credential layout (9 digits, `D`, 3 digits).
pub const SEPARATED_CREDENTIAL_LENGTH: usize = 13;

/// Separator character of the separated credential layout.
pub const CREDENTIAL_SEPARATOR: u8 = b'D';

// ============================================================================
// Logging
// ============================================================================

/// Tracing target for access decisions and alarm events.
///
/// Subscribers can route this target to a dedicated access log, separate
/// from the application log.
///
/// ```
/// use gatehouse_core::constants::ACCESS_LOG_TARGET;
///
/// assert_eq!(ACCESS_LOG_TARGET, "gatehouse::access");
/// ```
pub const ACCESS_LOG_TARGET: &str = "gatehouse::access";
