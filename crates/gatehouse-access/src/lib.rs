//! Access control for Gatehouse.
//!
//! Ties the reader and the directory together: every card presented at the
//! reader is parsed, looked up, and answered with a grant or a denial.
//!
//! # Components
//!
//! - **AccessController**: reader event loop and decision logic
//! - **AuditEvent**: what the controller saw and decided, for an optional
//!   audit consumer

pub mod audit;
pub mod controller;
pub mod error;

pub use audit::{AuditEvent, AuditSink, audit_channel};
pub use controller::AccessController;
pub use error::{AccessError, Result};
