//! Reader hardware layer for Gatehouse.
//!
//! This crate drives an Elcom card reader over its serial line. It is built
//! from three layers:
//!
//! - [`ProtocolLink`]: one command, one response line, bounded by a timeout.
//!   Generic over any `AsyncRead + AsyncWrite` transport; in production the
//!   transport is a [`tokio_serial::SerialStream`] opened by [`serial`].
//! - [`StatusTracker`]: edge-triggered status bookkeeping with a bounded
//!   transition history.
//! - [`ReaderStateMachine`]: a dedicated poll task that turns status changes
//!   into [`ReaderEvent`]s and lends exclusive link access to the event
//!   consumer through a [`ReaderSession`].
//!
//! # Error Handling
//!
//! A reader that does not answer is not an error; it shows up as
//! [`ReaderStatus::LinkLost`](gatehouse_core::ReaderStatus::LinkLost). Only
//! unrecoverable transport faults (end of stream, I/O errors) surface as
//! [`HardwareError`], and they stop the poll task.
//!
//! # Mock Implementations
//!
//! The [`mock`] module provides a simulated reader that answers over an
//! in-memory pipe, for development and testing without physical hardware.

pub mod error;
pub mod link;
pub mod mock;
pub mod reader;
pub mod serial;
pub mod tracker;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use link::ProtocolLink;
pub use reader::{ReaderConfig, ReaderEvent, ReaderHandle, ReaderSession, ReaderStateMachine};
pub use serial::{PortInfo, SerialSettings, list_ports};
pub use tracker::{MAX_HISTORY_SIZE, StatusTracker, StatusTransition};
