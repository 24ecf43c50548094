//! Audit events.
//!
//! The controller can forward what it sees and decides to an audit sink, an
//! unbounded channel owned by the caller. Nothing is persisted here; the
//! receiver decides whether to log, ship or drop the events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use gatehouse_core::AccessDecision;
use gatehouse_hardware::StatusTransition;

/// Something the controller observed or decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// The reader changed status.
    StatusChanged(StatusTransition),

    /// A credential presentation was decided.
    Decision {
        /// Identifies one presentation across log lines.
        presentation_id: Uuid,

        /// The outcome.
        decision: AccessDecision,

        /// When the decision was made.
        at: DateTime<Utc>,
    },
}

/// Sending half of an audit channel.
pub type AuditSink = mpsc::UnboundedSender<AuditEvent>;

/// Create an audit channel.
pub fn audit_channel() -> (AuditSink, mpsc::UnboundedReceiver<AuditEvent>) {
    mpsc::unbounded_channel()
}
