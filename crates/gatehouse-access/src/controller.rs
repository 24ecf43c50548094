//! Access decisions.
//!
//! [`AccessController`] consumes reader events and, for every card swiped,
//! produces exactly one [`AccessDecision`] and sends the matching door
//! command back to the reader.
//!
//! # Decision Flow
//!
//! ```text
//! CredentialWaiting
//!     │
//!     ├─ settle delay (200 ms)
//!     ├─ read credential ── none ──► ignored, no command
//!     ├─ parse ──────────── bad ───► deny (invalid format), directory untouched
//!     ├─ query directory
//!     │     ├─ Some(user) ─────────► grant
//!     │     ├─ None ───────────────► deny (unauthorized)
//!     │     └─ error ──────────────► deny (directory error)
//!     └─ OA / OD
//! ```
//!
//! A directory outage never opens the door. Alarm statuses (tamper, forced
//! open, link lost, power failure recovery) are logged and audited but cause
//! no device action.
//!
//! All decisions are logged under the `gatehouse::access` target so they can
//! be routed separately from application logs.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};
use uuid::Uuid;

use gatehouse_core::constants::{ACCESS_LOG_TARGET, SETTLE_DELAY_MS};
use gatehouse_core::{AccessDecision, DenialReason, ParsedCredential, ReaderStatus};
use gatehouse_directory::{DirectoryClient, DirectoryConnector};
use gatehouse_hardware::{ReaderEvent, ReaderHandle, ReaderSession};

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{AccessError, Result};

/// Turns reader events into access decisions.
///
/// # Example
///
/// ```no_run
/// use gatehouse_access::AccessController;
/// use gatehouse_directory::{DirectoryClient, DirectoryConfig, LdapConnector};
/// use gatehouse_hardware::ReaderHandle;
///
/// # async fn example(config: DirectoryConfig, reader: ReaderHandle) -> gatehouse_access::Result<()> {
/// let directory = DirectoryClient::new(LdapConnector::new(config.clone()), config);
/// let mut controller = AccessController::new(directory);
/// controller.connect().await?;
///
/// controller.run(reader, async {
///     let _ = tokio::signal::ctrl_c().await;
/// }).await?;
/// # Ok(())
/// # }
/// ```
pub struct AccessController<C: DirectoryConnector> {
    /// Resolves credentials to usernames.
    directory: DirectoryClient<C>,

    /// Wait between the card-present event and reading the card.
    settle_delay: Duration,

    /// Optional receiver of audit events.
    audit: Option<AuditSink>,
}

impl<C: DirectoryConnector> AccessController<C> {
    /// Create a controller with the default settle delay and no audit sink.
    pub fn new(directory: DirectoryClient<C>) -> Self {
        Self {
            directory,
            settle_delay: Duration::from_millis(SETTLE_DELAY_MS),
            audit: None,
        }
    }

    /// Override the settle delay.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Forward audit events to `sink`.
    pub fn with_audit_sink(mut self, sink: AuditSink) -> Self {
        self.audit = Some(sink);
        self
    }

    /// The directory client.
    pub fn directory(&self) -> &DirectoryClient<C> {
        &self.directory
    }

    /// Connect to the directory now instead of on the first lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be reached.
    pub async fn connect(&mut self) -> Result<()> {
        self.directory.connect().await?;
        Ok(())
    }

    /// Consume reader events until the reader stops or `shutdown` completes.
    ///
    /// Shutdown is only observed between events, so a decision in progress
    /// always finishes. Afterwards the reader is closed first and the
    /// directory connection second.
    ///
    /// # Errors
    ///
    /// Returns the fault that stopped the reader, if any.
    pub async fn run<F>(mut self, mut reader: ReaderHandle, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Access controller running");

        let outcome = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                event = reader.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_event(event).await {
                            break Err(e);
                        }
                    }
                    None => {
                        debug!("Reader stopped delivering events");
                        break Ok(());
                    }
                },
            }
        };

        let closed = reader.close().await;
        if let Err(e) = self.directory.close_connection().await {
            warn!("Error closing directory connection: {}", e);
        }

        info!("Access controller stopped");
        closed?;
        outcome
    }

    /// React to one reader event.
    ///
    /// Returns the decision if the event was a card presentation that could
    /// be read. The event, and with it the reader session, is released on
    /// return.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader link failed while reading the card or
    /// sending the door command.
    pub async fn handle_event(&mut self, event: ReaderEvent) -> Result<Option<AccessDecision>> {
        let status = event.status();
        self.emit(AuditEvent::StatusChanged(event.transition().clone()));

        match status {
            ReaderStatus::CredentialWaiting => {
                debug!(target: ACCESS_LOG_TARGET, from = %event.previous(), "Card presented");
                self.handle_presentation(event.session()).await
            }
            ReaderStatus::Idle => {
                trace!(target: ACCESS_LOG_TARGET, from = %event.previous(), "Reader idle");
                Ok(None)
            }
            ReaderStatus::LinkLost
            | ReaderStatus::Tamper
            | ReaderStatus::ForcedOpen
            | ReaderStatus::RecoveredFromPowerFailure => {
                warn!(target: ACCESS_LOG_TARGET, from = %event.previous(), "Reader reported {}", status);
                Ok(None)
            }
        }
    }

    async fn handle_presentation(&mut self, session: &ReaderSession) -> Result<Option<AccessDecision>> {
        tokio::time::sleep(self.settle_delay).await;

        let Some(raw) = session.read_credential().await? else {
            debug!(target: ACCESS_LOG_TARGET, "Card presented but no credential could be read");
            return Ok(None);
        };

        let presentation_id = Uuid::new_v4();
        let span = info_span!("presentation", %presentation_id);

        async {
            let decision = self.decide(&raw).await;

            if decision.is_granted() {
                session.grant().await?;
            } else {
                session.deny().await?;
            }

            self.emit(AuditEvent::Decision {
                presentation_id,
                decision: decision.clone(),
                at: Utc::now(),
            });
            Ok::<_, AccessError>(Some(decision))
        }
        .instrument(span)
        .await
    }

    /// Decide on a raw credential: parse it, then look it up.
    ///
    /// Never fails: every outcome, including directory errors, is a
    /// decision.
    pub async fn decide(&mut self, raw: &str) -> AccessDecision {
        let credential = match ParsedCredential::parse(raw) {
            Ok(credential) => credential,
            Err(e) => {
                info!(target: ACCESS_LOG_TARGET, credential = raw, "Access denied: {}", e);
                return AccessDecision::Denied(DenialReason::InvalidFormat);
            }
        };

        let id = credential.id();
        let lcc = credential.location_code();

        match self.directory.query_username(id, lcc).await {
            Ok(Some(username)) => {
                info!(target: ACCESS_LOG_TARGET, id, lcc, %username, "Access granted");
                AccessDecision::granted(username)
            }
            Ok(None) => {
                info!(target: ACCESS_LOG_TARGET, id, lcc, "Access denied: no enabled account matches");
                AccessDecision::Denied(DenialReason::Unauthorized)
            }
            Err(e) => {
                error!(target: ACCESS_LOG_TARGET, id, lcc, "Access denied: directory error: {}", e);
                AccessDecision::Denied(DenialReason::DirectoryError)
            }
        }
    }

    fn emit(&self, event: AuditEvent) {
        if let Some(sink) = &self.audit
            && sink.send(event).is_err()
        {
            trace!("Audit receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_directory::mock::MockDirectory;
    use gatehouse_directory::{DirectoryConfig, DirectoryError};
    use rstest::rstest;

    fn config() -> DirectoryConfig {
        DirectoryConfig {
            host: "ldap://mock".to_string(),
            bind_dn: "cn=admin".to_string(),
            password: "x".to_string(),
            search_base: "dc=example".to_string(),
            id_field: "id".to_string(),
            location_code_field: "lcc".to_string(),
            username_field: "uid".to_string(),
            disabled_field: "locked".to_string(),
            timeout_ms: 5000,
        }
    }

    fn controller(directory: &MockDirectory) -> AccessController<MockDirectory> {
        AccessController::new(DirectoryClient::new(directory.clone(), config()))
    }

    #[tokio::test]
    async fn test_decide_grants_known_account() {
        let directory = MockDirectory::new().with_user("23456789", "01", "alice");
        let decision = controller(&directory).decide("0234567890100000000").await;

        assert_eq!(decision, AccessDecision::granted("alice"));
    }

    #[tokio::test]
    async fn test_decide_separated_layout() {
        let directory = MockDirectory::new().with_user("123456789", "0", "bob");
        let decision = controller(&directory).decide("123456789D047").await;

        assert_eq!(decision, AccessDecision::granted("bob"));
    }

    #[rstest]
    #[case("abc")]
    #[case("112345678901234567")]
    #[case("11234567890123456789")]
    #[case("")]
    #[tokio::test]
    async fn test_decide_rejects_format_without_lookup(#[case] raw: &str) {
        let directory = MockDirectory::new();
        let decision = controller(&directory).decide(raw).await;

        assert_eq!(decision, AccessDecision::Denied(DenialReason::InvalidFormat));
        assert_eq!(directory.connects(), 0);
        assert_eq!(directory.searches(), 0);
    }

    #[tokio::test]
    async fn test_decide_unknown_account() {
        let directory = MockDirectory::new();
        let decision = controller(&directory).decide("0234567890100000000").await;

        assert_eq!(decision, AccessDecision::Denied(DenialReason::Unauthorized));
    }

    #[tokio::test]
    async fn test_decide_directory_error_never_grants() {
        let directory = MockDirectory::new().with_user("23456789", "01", "alice");
        directory.fail_next_search(DirectoryError::connection("reset"));
        directory.fail_next_search(DirectoryError::connection("reset"));

        let decision = controller(&directory).decide("0234567890100000000").await;

        assert_eq!(decision, AccessDecision::Denied(DenialReason::DirectoryError));
        assert_eq!(directory.searches(), 2);
    }

    #[tokio::test]
    async fn test_eager_connect() {
        let directory = MockDirectory::new();
        let mut controller = controller(&directory);

        controller.connect().await.unwrap();
        assert!(controller.directory().is_connected());

        directory.fail_next_connect(DirectoryError::connection("refused"));
        assert!(controller.connect().await.is_err());
    }
}
