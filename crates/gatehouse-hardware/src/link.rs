//! Request/response link to one Elcom reader.
//!
//! [`ProtocolLink`] wraps any async byte stream with [`ElcomCodec`] and turns
//! each command into exactly one [`LinkResponse`]. The link is half-duplex:
//! a command is written, then a single response line is awaited for at most
//! the response timeout (1500 ms by default).
//!
//! # Outcomes
//!
//! | Situation                         | Result                                |
//! |-----------------------------------|---------------------------------------|
//! | Line with payload                 | `Ok(LinkResponse::Payload(..))`       |
//! | Line of two characters or fewer   | `Ok(LinkResponse::MalformedFrame)`    |
//! | Over-long line (discarded)        | `Ok(LinkResponse::MalformedFrame)`    |
//! | No line within the timeout        | `Ok(LinkResponse::Timeout)`           |
//! | End of stream, I/O failure        | `Err(HardwareError)`                  |
//! | Link already closed               | `Err(HardwareError::Disconnected)`    |
//!
//! The link performs no retries. Responses carry nothing that ties them to
//! a request, so the link keeps replies aligned itself: before each command
//! it discards whatever has already arrived, and after a timeout it also
//! waits up to the late-reply window for the overdue line and drops it.
//!
//! # Example
//!
//! ```no_run
//! use gatehouse_core::UnitAddress;
//! use gatehouse_hardware::ProtocolLink;
//! use gatehouse_hardware::serial::SerialSettings;
//! use gatehouse_protocol::Command;
//!
//! # async fn example() -> gatehouse_hardware::Result<()> {
//! let mut link = ProtocolLink::open("/dev/ttyUSB0", UnitAddress::default(), &SerialSettings::default())?;
//!
//! let response = link.send_command(Command::QueryStatus).await?;
//! println!("Status payload: {:?}", response.payload());
//!
//! link.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use futures::{FutureExt, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_serial::SerialStream;
use tokio_util::codec::Framed;
use tracing::{debug, error, trace, warn};

use gatehouse_core::UnitAddress;
use gatehouse_core::constants::RESPONSE_TIMEOUT_MS;
use gatehouse_protocol::{Command, ElcomCodec, LinkResponse};

use crate::error::{HardwareError, Result};
use crate::serial::{self, SerialSettings};

/// Framed, half-duplex command link to a reader.
pub struct ProtocolLink<T> {
    /// Address every request is sent to.
    address: UnitAddress,

    /// Framed transport (None once closed).
    framed: Option<Framed<T, ElcomCodec>>,

    /// How long to wait for a response line.
    timeout: Duration,

    /// How long to wait for an overdue reply after a timeout.
    late_reply_window: Duration,

    /// The last command timed out; its reply may still arrive.
    awaiting_late_reply: bool,
}

impl ProtocolLink<SerialStream> {
    /// Open the reader's serial port and wrap it in a link.
    ///
    /// # Errors
    ///
    /// Returns an error if the serial port cannot be opened.
    pub fn open(path: &str, address: UnitAddress, settings: &SerialSettings) -> Result<Self> {
        let stream = serial::open_port(path, settings)?;
        Ok(Self::new(stream, address))
    }
}

impl<T> ProtocolLink<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already opened transport.
    ///
    /// # Example
    ///
    /// ```
    /// use gatehouse_core::UnitAddress;
    /// use gatehouse_hardware::ProtocolLink;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let (transport, _device) = tokio::io::duplex(64);
    /// let link = ProtocolLink::new(transport, UnitAddress::default());
    /// assert!(link.is_open());
    /// # }
    /// ```
    pub fn new(transport: T, address: UnitAddress) -> Self {
        Self {
            framed: Some(Framed::new(transport, ElcomCodec::new(address.clone()))),
            address,
            timeout: Duration::from_millis(RESPONSE_TIMEOUT_MS),
            late_reply_window: Duration::from_millis(RESPONSE_TIMEOUT_MS),
            awaiting_late_reply: false,
        }
    }

    /// Override the response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override how long the next command waits for an overdue reply after a
    /// timeout.
    pub fn with_late_reply_window(mut self, window: Duration) -> Self {
        self.late_reply_window = window;
        self
    }

    /// Address requests are sent to.
    pub fn address(&self) -> &UnitAddress {
        &self.address
    }

    /// Response timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns `true` until [`close`](Self::close) has been called.
    pub fn is_open(&self) -> bool {
        self.framed.is_some()
    }

    /// Send one command and wait for its response line.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is closed, the transport reached end of
    /// stream, or an I/O error occurred. A reader that stays silent is not an
    /// error: it yields [`LinkResponse::Timeout`].
    pub async fn send_command(&mut self, command: Command) -> Result<LinkResponse> {
        self.discard_stale().await?;

        let framed = self
            .framed
            .as_mut()
            .ok_or_else(|| HardwareError::disconnected("serial link is closed"))?;

        trace!(address = %self.address, %command, "Sending command");

        match tokio::time::timeout(self.timeout, framed.send(command)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Failed to write command {}: {}", command, e);
                return Err(e.into());
            }
            Err(_) => {
                warn!("Write timeout after {}ms", self.timeout.as_millis());
                self.awaiting_late_reply = true;
                return Ok(LinkResponse::Timeout);
            }
        }

        match tokio::time::timeout(self.timeout, framed.next()).await {
            Ok(Some(Ok(line))) => {
                if let Some(echoed) = LinkResponse::echoed_address(&line)
                    && echoed != self.address.as_str()
                {
                    debug!(
                        expected = %self.address,
                        echoed,
                        "Response echoes a different unit address"
                    );
                }
                trace!(line = %line, "Received response");
                Ok(LinkResponse::from_line(&line))
            }
            Ok(Some(Err(e))) => {
                error!("Failed to read response to {}: {}", command, e);
                Err(e.into())
            }
            Ok(None) => {
                error!("Reader closed the serial stream");
                Err(HardwareError::disconnected("serial stream ended"))
            }
            Err(_) => {
                debug!(%command, "No response within {}ms", self.timeout.as_millis());
                self.awaiting_late_reply = true;
                Ok(LinkResponse::Timeout)
            }
        }
    }

    /// Drop everything received since the last response was taken.
    ///
    /// Takes every line that is already readable without waiting, clears
    /// any partial line, and, if the previous command timed out, waits up to
    /// the late-reply window for its overdue line.
    async fn discard_stale(&mut self) -> Result<()> {
        let framed = self
            .framed
            .as_mut()
            .ok_or_else(|| HardwareError::disconnected("serial link is closed"))?;

        while let Some(next) = framed.next().now_or_never() {
            let line = ready_line(next)?;
            debug!(line = %line, "Discarding late response");
            self.awaiting_late_reply = false;
        }

        let stale = framed.read_buffer().len();
        if stale > 0 {
            debug!(bytes = stale, "Discarding stale bytes before command");
            framed.read_buffer_mut().clear();
            framed.codec_mut().reset();
        }

        if std::mem::take(&mut self.awaiting_late_reply) {
            match tokio::time::timeout(self.late_reply_window, framed.next()).await {
                Ok(next) => {
                    let line = ready_line(next)?;
                    debug!(line = %line, "Discarding late response");
                }
                Err(_) => trace!("No late response arrived"),
            }
        }

        Ok(())
    }

    /// Close the link.
    ///
    /// Flushing pending output is bounded to 500 ms. Closing an already
    /// closed link is a no-op.
    ///
    /// # Errors
    ///
    /// Never fails today; flush and shutdown problems are logged.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut framed) = self.framed.take() {
            debug!(address = %self.address, "Closing serial link");

            let flush_timeout = Duration::from_millis(500);
            match tokio::time::timeout(flush_timeout, framed.flush()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Error flushing during close: {}", e),
                Err(_) => warn!(
                    "Flush timeout during close ({}ms)",
                    flush_timeout.as_millis()
                ),
            }

            let mut transport = framed.into_inner();
            match tokio::time::timeout(flush_timeout, transport.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Error during shutdown: {}", e),
                Err(_) => warn!(
                    "Shutdown timeout during close ({}ms)",
                    flush_timeout.as_millis()
                ),
            }
        }

        Ok(())
    }
}

/// Unwrap one item of the framed stream, treating end of stream as fatal.
fn ready_line(next: Option<std::io::Result<String>>) -> Result<String> {
    match next {
        Some(Ok(line)) => Ok(line),
        Some(Err(e)) => {
            error!("Failed to read from serial stream: {}", e);
            Err(e.into())
        }
        None => {
            error!("Reader closed the serial stream");
            Err(HardwareError::disconnected("serial stream ended"))
        }
    }
}

impl<T> Drop for ProtocolLink<T> {
    fn drop(&mut self) {
        if self.framed.is_some() {
            debug!("ProtocolLink dropped while open - transport will be closed");
        }
    }
}
