//! Edge-triggered status tracking.
//!
//! [`StatusTracker`] holds the reader's current [`ReaderStatus`] and turns a
//! stream of computed statuses into transitions: observing the held status
//! again yields nothing, observing a different one yields exactly one
//! [`StatusTransition`] and makes it the held status.
//!
//! # Example
//!
//! ```
//! use gatehouse_core::ReaderStatus;
//! use gatehouse_hardware::StatusTracker;
//!
//! let mut tracker = StatusTracker::new();
//! assert!(tracker.observe(ReaderStatus::Idle).is_none());
//!
//! let transition = tracker.observe(ReaderStatus::CredentialWaiting).unwrap();
//! assert_eq!(transition.from, ReaderStatus::Idle);
//! assert_eq!(transition.to, ReaderStatus::CredentialWaiting);
//!
//! assert!(tracker.observe(ReaderStatus::CredentialWaiting).is_none());
//! assert_eq!(tracker.history().len(), 1);
//! ```

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use gatehouse_core::ReaderStatus;

/// Maximum number of transitions kept in history.
///
/// Roughly a hundred card presentations' worth of transitions, which is
/// plenty for diagnosing a misbehaving reader.
pub const MAX_HISTORY_SIZE: usize = 100;

/// A change of reader status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusTransition {
    /// Status held before the change.
    pub from: ReaderStatus,

    /// Status held after the change.
    pub to: ReaderStatus,

    /// When the change was observed.
    pub timestamp: DateTime<Utc>,
}

impl StatusTransition {
    /// Create a transition observed now.
    pub fn new(from: ReaderStatus, to: ReaderStatus) -> Self {
        Self {
            from,
            to,
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for StatusTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Holds the current reader status and a bounded transition history.
#[derive(Debug, Clone)]
pub struct StatusTracker {
    /// Currently held status.
    current: ReaderStatus,

    /// Recent transitions, oldest first (limited to MAX_HISTORY_SIZE).
    history: VecDeque<StatusTransition>,
}

impl StatusTracker {
    /// Create a tracker holding [`ReaderStatus::Idle`].
    pub fn new() -> Self {
        Self::with_initial(ReaderStatus::Idle)
    }

    /// Create a tracker holding the given status.
    pub fn with_initial(status: ReaderStatus) -> Self {
        Self {
            current: status,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    /// Currently held status.
    pub fn current(&self) -> ReaderStatus {
        self.current
    }

    /// Record a freshly computed status.
    ///
    /// Returns the transition if the status differs from the held one.
    pub fn observe(&mut self, status: ReaderStatus) -> Option<StatusTransition> {
        if status == self.current {
            return None;
        }

        let transition = StatusTransition::new(self.current, status);
        self.current = status;

        self.history.push_back(transition.clone());
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }

        Some(transition)
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StatusTransition> {
        &self.history
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}
