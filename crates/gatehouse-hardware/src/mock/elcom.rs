//! Mock Elcom reader for testing and development.
//!
//! The mock speaks the reader's side of the serial protocol over an
//! in-memory [`tokio::io::duplex`] pipe: it parses `#<addr><cmd>\r` requests
//! and answers with `<addr><markers>\r\n` lines, exactly like the hardware.
//! Its state is driven from a [`MockElcomHandle`].
//!
//! # Behaviour
//!
//! | Request | Answer                                               |
//! |---------|------------------------------------------------------|
//! | `?`     | status line (`D`, `T`, `P` markers, or `0` if none)  |
//! | `R`     | address + card in memory (address only if no card)   |
//! | `OA`    | clears the card, then answers with the status line   |
//! | `OD`    | clears the card, then answers with the status line   |
//!
//! Requests for another unit address are ignored, as on a shared bus.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::time::Instant;
use tokio_util::codec::FramedRead;

use gatehouse_core::UnitAddress;
use gatehouse_core::constants::{MARKER_CARD_IN_MEMORY, MARKER_POWER_FAILURE, MARKER_TAMPER};
use gatehouse_protocol::{Command, ElcomCodec, Request, parse_request};

/// Mock Elcom reader.
///
/// # Examples
///
/// ```
/// use gatehouse_core::{ReaderStatus, UnitAddress};
/// use gatehouse_hardware::ProtocolLink;
/// use gatehouse_hardware::mock::MockElcomDevice;
/// use gatehouse_protocol::{Command, decode_status};
///
/// #[tokio::main]
/// async fn main() -> gatehouse_hardware::Result<()> {
///     let (transport, device) = MockElcomDevice::spawn(UnitAddress::default());
///     let mut link = ProtocolLink::new(transport, UnitAddress::default());
///
///     device.set_tamper(true);
///     let response = link.send_command(Command::QueryStatus).await?;
///     assert_eq!(decode_status(&response), ReaderStatus::Tamper);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockElcomDevice {
    stream: DuplexStream,
    state: Arc<Mutex<DeviceState>>,
}

/// Controls a running [`MockElcomDevice`].
#[derive(Debug, Clone)]
pub struct MockElcomHandle {
    state: Arc<Mutex<DeviceState>>,
}

#[derive(Debug)]
struct DeviceState {
    address: UnitAddress,
    card: Option<String>,
    tamper: bool,
    power_failure: bool,
    silent: bool,
    hung_up: bool,
    scripted: VecDeque<String>,
    commands: Vec<(Instant, Command)>,
}

impl MockElcomDevice {
    /// Spawn a mock reader answering to `address`.
    ///
    /// Returns the host end of the pipe, to be wrapped in a
    /// [`ProtocolLink`](crate::ProtocolLink), and a handle controlling the
    /// device. Must be called from within a Tokio runtime.
    pub fn spawn(address: UnitAddress) -> (DuplexStream, MockElcomHandle) {
        let (host, device) = tokio::io::duplex(1024);
        let state = Arc::new(Mutex::new(DeviceState {
            address,
            card: None,
            tamper: false,
            power_failure: false,
            silent: false,
            hung_up: false,
            scripted: VecDeque::new(),
            commands: Vec::new(),
        }));

        let handle = MockElcomHandle {
            state: Arc::clone(&state),
        };

        tokio::spawn(
            Self {
                stream: device,
                state,
            }
            .run(),
        );

        (host, handle)
    }

    async fn run(self) {
        let (read, mut write) = tokio::io::split(self.stream);
        let mut requests = FramedRead::new(read, ElcomCodec::default());

        while let Some(Ok(line)) = requests.next().await {
            let Some(request) = parse_request(&line) else {
                continue;
            };

            let reply = {
                let mut state = lock(&self.state);
                if state.hung_up {
                    break;
                }
                state.answer(&request)
            };

            if let Some(reply) = reply
                && write.write_all(reply.as_bytes()).await.is_err()
            {
                break;
            }
        }
    }
}

impl DeviceState {
    fn answer(&mut self, request: &Request) -> Option<String> {
        if request.address != self.address {
            return None;
        }

        self.commands.push((Instant::now(), request.command));

        if self.silent {
            return None;
        }
        if let Some(line) = self.scripted.pop_front() {
            return Some(format!("{line}\r\n"));
        }

        let payload = match request.command {
            Command::QueryStatus => self.markers(),
            Command::ReadCredential => self.card.clone().unwrap_or_default(),
            Command::OpenGranted | Command::OpenDenied => {
                self.card = None;
                self.markers()
            }
        };

        Some(format!("{}{payload}\r\n", self.address))
    }

    fn markers(&self) -> String {
        let mut markers = String::new();
        if self.card.is_some() {
            markers.push(MARKER_CARD_IN_MEMORY);
        }
        if self.tamper {
            markers.push(MARKER_TAMPER);
        }
        if self.power_failure {
            markers.push(MARKER_POWER_FAILURE);
        }
        if markers.is_empty() {
            markers.push('0');
        }
        markers
    }
}

fn lock(state: &Mutex<DeviceState>) -> MutexGuard<'_, DeviceState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockElcomHandle {
    /// Swipe a card: the reader holds `credential` in memory until the next
    /// `OA`/`OD`.
    pub fn present_card(&self, credential: impl Into<String>) {
        lock(&self.state).card = Some(credential.into());
    }

    /// Forget the card in memory.
    pub fn remove_card(&self) {
        lock(&self.state).card = None;
    }

    /// Returns `true` while a card is held in memory.
    pub fn has_card(&self) -> bool {
        lock(&self.state).card.is_some()
    }

    /// Raise or clear the tamper marker.
    pub fn set_tamper(&self, tamper: bool) {
        lock(&self.state).tamper = tamper;
    }

    /// Raise or clear the power-failure marker.
    pub fn set_power_failure(&self, power_failure: bool) {
        lock(&self.state).power_failure = power_failure;
    }

    /// Stop answering (requests are still recorded).
    pub fn set_silent(&self, silent: bool) {
        lock(&self.state).silent = silent;
    }

    /// Answer the next request with `line` verbatim (terminator appended).
    pub fn push_response(&self, line: impl Into<String>) {
        lock(&self.state).scripted.push_back(line.into());
    }

    /// Drop the connection at the next request, as an unplugged reader.
    pub fn hang_up(&self) {
        lock(&self.state).hung_up = true;
    }

    /// All commands received so far, in order.
    pub fn commands(&self) -> Vec<Command> {
        lock(&self.state)
            .commands
            .iter()
            .map(|(_, command)| *command)
            .collect()
    }

    /// All commands received so far, with the instant each arrived.
    pub fn command_log(&self) -> Vec<(Instant, Command)> {
        lock(&self.state).commands.clone()
    }

    /// Number of times `command` was received.
    pub fn count(&self, command: Command) -> usize {
        lock(&self.state)
            .commands
            .iter()
            .filter(|(_, c)| *c == command)
            .count()
    }
}
