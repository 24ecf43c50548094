//! Polling state machine for one Elcom reader.
//!
//! [`ReaderStateMachine`] owns a [`ProtocolLink`] and, once opened, runs a
//! dedicated task that queries the reader status every 400 ms. Each status is
//! fed through a [`StatusTracker`]; only changes are reported, as
//! [`ReaderEvent`]s on the returned [`ReaderHandle`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  ReaderEvent (mpsc)   ┌──────────────────┐
//! │  Poll task   │──────────────────────►│  Event consumer  │
//! │              │                       │                  │
//! │ ProtocolLink │◄──────────────────────│  ReaderSession   │
//! └──────────────┘  SessionRequest (mpsc)└──────────────────┘
//! ```
//!
//! # Sessions
//!
//! Every event carries a [`ReaderSession`], the only way to issue
//! `R`/`OA`/`OD` to the reader. While a session is alive the poll task does
//! not poll; it only serves that session's requests. The consumer therefore
//! has exclusive use of the half-duplex link for as long as it holds the
//! session, and the reader is never polled mid-decision.
//!
//! A transition caused by a session request (e.g. the reader going idle after
//! `OA`) is queued and delivered as its own event once the session is
//! dropped, so events never overlap.
//!
//! # Example
//!
//! ```no_run
//! use gatehouse_core::{ReaderStatus, UnitAddress};
//! use gatehouse_hardware::{ProtocolLink, ReaderConfig, ReaderStateMachine};
//! use gatehouse_hardware::serial::SerialSettings;
//!
//! # async fn example() -> gatehouse_hardware::Result<()> {
//! let link = ProtocolLink::open("/dev/ttyUSB0", UnitAddress::default(), &SerialSettings::default())?;
//! let mut reader = ReaderStateMachine::new(link, ReaderConfig::default()).open();
//!
//! while let Some(event) = reader.recv().await {
//!     if event.status() == ReaderStatus::CredentialWaiting
//!         && let Some(raw) = event.session().read_credential().await?
//!     {
//!         println!("Card: {raw}");
//!         event.session().deny().await?;
//!     }
//! }
//!
//! reader.close().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use gatehouse_core::ReaderStatus;
use gatehouse_core::constants::POLL_INTERVAL_MS;
use gatehouse_protocol::{Command, LinkResponse, decode_status};

use crate::error::{HardwareError, Result};
use crate::link::ProtocolLink;
use crate::tracker::{StatusTracker, StatusTransition};

/// Configuration for the polling task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Delay between status queries.
    pub poll_interval: Duration,

    /// Capacity of the event channel.
    pub event_buffer: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            event_buffer: 16,
        }
    }
}

/// A status change, together with exclusive access to the reader.
#[derive(Debug)]
pub struct ReaderEvent {
    transition: StatusTransition,
    session: ReaderSession,
}

impl ReaderEvent {
    /// The new status.
    pub fn status(&self) -> ReaderStatus {
        self.transition.to
    }

    /// The status held before this event.
    pub fn previous(&self) -> ReaderStatus {
        self.transition.from
    }

    /// The full transition record.
    pub fn transition(&self) -> &StatusTransition {
        &self.transition
    }

    /// Session for issuing commands while polling is paused.
    pub fn session(&self) -> &ReaderSession {
        &self.session
    }

    /// Split into transition and session.
    pub fn into_parts(self) -> (StatusTransition, ReaderSession) {
        (self.transition, self.session)
    }
}

struct SessionRequest {
    command: Command,
    reply: oneshot::Sender<Result<LinkResponse>>,
}

impl std::fmt::Debug for SessionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRequest")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to the reader for the duration of one event.
///
/// Polling resumes when the session is dropped.
#[derive(Debug)]
pub struct ReaderSession {
    requests: mpsc::Sender<SessionRequest>,
}

impl ReaderSession {
    /// Read the credential held in the reader's memory (`R`).
    ///
    /// Returns `None` if the reader did not answer or answered without a
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the link failed or the poll task has stopped.
    pub async fn read_credential(&self) -> Result<Option<String>> {
        Ok(self.request(Command::ReadCredential).await?.into_payload())
    }

    /// Release the door (`OA`) and return the status the reader reports.
    ///
    /// # Errors
    ///
    /// Returns an error if the link failed or the poll task has stopped.
    pub async fn grant(&self) -> Result<ReaderStatus> {
        let response = self.request(Command::OpenGranted).await?;
        Ok(decode_status(&response))
    }

    /// Signal a refusal (`OD`) and return the status the reader reports.
    ///
    /// # Errors
    ///
    /// Returns an error if the link failed or the poll task has stopped.
    pub async fn deny(&self) -> Result<ReaderStatus> {
        let response = self.request(Command::OpenDenied).await?;
        Ok(decode_status(&response))
    }

    async fn request(&self, command: Command) -> Result<LinkResponse> {
        let (reply, response) = oneshot::channel();

        self.requests
            .send(SessionRequest { command, reply })
            .await
            .map_err(|_| HardwareError::communication("reader poll task has stopped"))?;

        response
            .await
            .map_err(|_| HardwareError::communication("reader poll task has stopped"))?
    }
}

/// Handle to a running reader.
///
/// Dropping the handle stops the poll task without waiting for it; prefer
/// [`close`](Self::close).
pub struct ReaderHandle {
    /// Events from the poll task.
    events: mpsc::Receiver<ReaderEvent>,

    /// Status tracker as last updated by the poll task.
    tracker: watch::Receiver<StatusTracker>,

    /// Stop signal for the poll task.
    shutdown: Option<oneshot::Sender<()>>,

    /// The poll task.
    task: JoinHandle<Result<()>>,
}

impl ReaderHandle {
    /// Receive the next event.
    ///
    /// Returns `None` once the poll task has stopped, either after
    /// [`close`](Self::close) was requested or after a fatal link fault.
    pub async fn recv(&mut self) -> Option<ReaderEvent> {
        self.events.recv().await
    }

    /// Last status held by the poll task.
    pub fn current_status(&self) -> ReaderStatus {
        self.tracker.borrow().current()
    }

    /// Recent status transitions, oldest first, capped at
    /// [`MAX_HISTORY_SIZE`](crate::MAX_HISTORY_SIZE).
    pub fn history(&self) -> Vec<StatusTransition> {
        self.tracker.borrow().history().iter().cloned().collect()
    }

    /// Subscribe to status changes without taking events.
    pub fn watch_status(&self) -> watch::Receiver<StatusTracker> {
        self.tracker.clone()
    }

    /// Stop polling, close the link, and return the poll task's result.
    ///
    /// Events that were queued but not received are dropped along with
    /// their sessions. A session still held by the caller must be dropped
    /// before this can complete.
    ///
    /// # Errors
    ///
    /// Returns the fault that stopped the poll task, if any.
    pub async fn close(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        self.events.close();
        while self.events.try_recv().is_ok() {}

        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(HardwareError::other(format!("reader poll task failed: {e}"))),
        }
    }
}

/// Edge-triggered polling state machine for one reader.
pub struct ReaderStateMachine<T> {
    link: ProtocolLink<T>,
    config: ReaderConfig,
    tracker: StatusTracker,
}

impl<T> ReaderStateMachine<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Create a state machine holding [`ReaderStatus::Idle`].
    pub fn new(link: ProtocolLink<T>, config: ReaderConfig) -> Self {
        Self {
            link,
            config,
            tracker: StatusTracker::new(),
        }
    }

    /// Spawn the poll task and return a handle to it.
    ///
    /// The first status query is sent immediately.
    pub fn open(self) -> ReaderHandle {
        let (event_tx, event_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let (tracker_tx, tracker_rx) = watch::channel(self.tracker.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        info!(
            address = %self.link.address(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Starting reader poll task"
        );

        let task = PollTask {
            link: self.link,
            config: self.config,
            tracker: self.tracker,
            events: event_tx,
            published: tracker_tx,
            shutdown: shutdown_rx,
            pending: VecDeque::new(),
        };

        ReaderHandle {
            events: event_rx,
            tracker: tracker_rx,
            shutdown: Some(shutdown_tx),
            task: tokio::spawn(task.run()),
        }
    }
}

/// What the poll loop does after delivering an event.
enum Flow {
    Continue,
    Stop,
}

struct PollTask<T> {
    link: ProtocolLink<T>,
    config: ReaderConfig,
    tracker: StatusTracker,
    events: mpsc::Sender<ReaderEvent>,
    published: watch::Sender<StatusTracker>,
    shutdown: oneshot::Receiver<()>,
    pending: VecDeque<StatusTransition>,
}

impl<T> PollTask<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    async fn run(mut self) -> Result<()> {
        let result = self.poll_loop().await;

        if let Err(e) = &result {
            error!("Reader poll task stopped: {}", e);
        }

        let closed = self.link.close().await;
        debug!("Reader poll task finished");
        result.and(closed)
    }

    async fn poll_loop(&mut self) -> Result<()> {
        loop {
            while let Some(transition) = self.pending.pop_front() {
                if let Flow::Stop = self.deliver(transition).await? {
                    return Ok(());
                }
            }

            let response = self.link.send_command(Command::QueryStatus).await?;
            self.observe(decode_status(&response));

            if !self.pending.is_empty() {
                continue;
            }

            tokio::select! {
                biased;
                _ = &mut self.shutdown => return Ok(()),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Hand one transition to the consumer and serve its session until the
    /// consumer drops it.
    async fn deliver(&mut self, transition: StatusTransition) -> Result<Flow> {
        let (requests, mut session_rx) = mpsc::channel(1);
        let event = ReaderEvent {
            transition,
            session: ReaderSession { requests },
        };

        tokio::select! {
            biased;
            _ = &mut self.shutdown => return Ok(Flow::Stop),
            sent = self.events.send(event) => {
                if sent.is_err() {
                    debug!("Event receiver dropped");
                    return Ok(Flow::Stop);
                }
            }
        }

        while let Some(request) = session_rx.recv().await {
            trace!(command = %request.command, "Serving session request");

            match self.link.send_command(request.command).await {
                Ok(response) => {
                    if request.command.reports_status() {
                        self.observe(decode_status(&response));
                    }
                    let _ = request.reply.send(Ok(response));
                }
                Err(e) => {
                    let _ = request
                        .reply
                        .send(Err(HardwareError::communication(e.to_string())));
                    return Err(e);
                }
            }
        }

        Ok(Flow::Continue)
    }

    fn observe(&mut self, status: ReaderStatus) {
        if let Some(transition) = self.tracker.observe(status) {
            debug!(from = %transition.from, to = %transition.to, "Reader status changed");
            self.published.send_replace(self.tracker.clone());
            self.pending.push_back(transition);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockElcomDevice;
    use gatehouse_core::UnitAddress;

    fn open_reader() -> (ReaderHandle, crate::mock::MockElcomHandle) {
        let (transport, device) = MockElcomDevice::spawn(UnitAddress::default());
        let link = ProtocolLink::new(transport, UnitAddress::default());
        (
            ReaderStateMachine::new(link, ReaderConfig::default()).open(),
            device,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_reader_produces_no_event() {
        let (mut reader, device) = open_reader();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(reader.events.try_recv().is_err());
        assert!(device.count(Command::QueryStatus) >= 4);
        assert_eq!(reader.current_status(), ReaderStatus::Idle);

        reader.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_non_idle_poll_fires_from_idle() {
        let (mut reader, device) = open_reader();
        device.set_tamper(true);

        let event = reader.recv().await.unwrap();
        assert_eq!(event.previous(), ReaderStatus::Idle);
        assert_eq!(event.status(), ReaderStatus::Tamper);
        drop(event);

        assert_eq!(reader.current_status(), ReaderStatus::Tamper);

        let history = reader.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from, ReaderStatus::Idle);
        assert_eq!(history[0].to, ReaderStatus::Tamper);
        reader.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_status_fires_once() {
        let (mut reader, device) = open_reader();
        device.set_tamper(true);

        let event = reader.recv().await.unwrap();
        assert_eq!(event.status(), ReaderStatus::Tamper);
        drop(event);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(reader.events.try_recv().is_err());

        reader.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_reader_is_link_lost() {
        let (mut reader, device) = open_reader();
        device.set_silent(true);

        let event = reader.recv().await.unwrap();
        assert_eq!(event.status(), ReaderStatus::LinkLost);
        drop(event);

        device.set_silent(false);
        let event = reader.recv().await.unwrap();
        assert_eq!(event.previous(), ReaderStatus::LinkLost);
        assert_eq!(event.status(), ReaderStatus::Idle);
        drop(event);

        reader.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_grant_queues_idle_transition() {
        let (mut reader, device) = open_reader();
        device.present_card("1123456789012345678");

        let event = reader.recv().await.unwrap();
        assert_eq!(event.status(), ReaderStatus::CredentialWaiting);

        let raw = event.session().read_credential().await.unwrap();
        assert_eq!(raw.as_deref(), Some("1123456789012345678"));

        let status = event.session().grant().await.unwrap();
        assert_eq!(status, ReaderStatus::Idle);

        // Nothing is delivered while the session is alive.
        assert!(reader.events.try_recv().is_err());
        drop(event);

        let event = reader.recv().await.unwrap();
        assert_eq!(event.previous(), ReaderStatus::CredentialWaiting);
        assert_eq!(event.status(), ReaderStatus::Idle);
        drop(event);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(reader.events.try_recv().is_err());
        assert_eq!(device.count(Command::OpenGranted), 1);

        let seen: Vec<_> = reader.history().iter().map(|t| t.to).collect();
        assert_eq!(seen, vec![ReaderStatus::CredentialWaiting, ReaderStatus::Idle]);
        assert_eq!(reader.watch_status().borrow().current(), ReaderStatus::Idle);

        reader.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_polling_while_session_alive() {
        let (mut reader, device) = open_reader();
        device.present_card("1123456789012345678");

        let event = reader.recv().await.unwrap();
        let polls = device.count(Command::QueryStatus);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(device.count(Command::QueryStatus), polls);

        event.session().deny().await.unwrap();
        drop(event);

        // The door command reset the reader; take the resulting event so
        // polling can resume.
        let event = reader.recv().await.unwrap();
        assert_eq!(event.status(), ReaderStatus::Idle);
        drop(event);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(device.count(Command::QueryStatus) > polls);

        reader.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_up_is_fatal() {
        let (mut reader, device) = open_reader();
        device.hang_up();

        assert!(reader.recv().await.is_none());
        let result = reader.close().await;
        assert!(result.unwrap_err().is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_after_fault_errors() {
        let (mut reader, device) = open_reader();
        device.present_card("1123456789012345678");

        let event = reader.recv().await.unwrap();
        device.hang_up();

        assert!(event.session().read_credential().await.is_err());
        assert!(event.session().grant().await.is_err());
        drop(event);

        assert!(reader.close().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_drops_unreceived_events() {
        let (reader, device) = open_reader();
        device.set_power_failure(true);

        tokio::time::sleep(Duration::from_secs(1)).await;
        reader.close().await.unwrap();
    }
}
