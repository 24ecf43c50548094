//! Tokio codec for Elcom reader framing.
//!
//! This module provides a Tokio-compatible codec for the serial link to an
//! Elcom reader, so the link can be driven through `Framed` like any other
//! async byte stream.
//!
//! # Overview
//!
//! - [`Encoder<Command>`]: writes `'#' + address + command + '\r'`
//! - [`Decoder`]: yields one response line at a time, without its terminator
//!
//! # Line Endings
//!
//! A line ends at `\r`, `\n`, or `\r\n`. A `\n` arriving directly after a
//! `\r` terminator belongs to that terminator and is swallowed, even when it
//! arrives in a later read.
//!
//! # Line Noise
//!
//! Lines longer than the configured maximum are discarded up to their
//! terminator and reported as an empty line, which the link turns into a
//! malformed frame. Non-ASCII bytes are replaced rather than rejected.
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use futures::{SinkExt, StreamExt};
//! use gatehouse_core::UnitAddress;
//! use gatehouse_protocol::{Command, ElcomCodec};
//! use tokio_util::codec::Framed;
//!
//! # async fn example<T>(port: T) -> std::io::Result<()>
//! # where T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin {
//! let mut framed = Framed::new(port, ElcomCodec::new(UnitAddress::default()));
//!
//! framed.send(Command::QueryStatus).await?;
//! if let Some(line) = framed.next().await {
//!     println!("Received: {}", line?);
//! }
//! # Ok(())
//! # }
//! ```

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use gatehouse_core::UnitAddress;
use gatehouse_core::constants::{FRAME_END, FRAME_START, LINE_FEED, MAX_LINE_LENGTH};

use crate::Command;

/// Tokio codec for the Elcom serial protocol.
#[derive(Debug, Clone)]
pub struct ElcomCodec {
    /// Address written into every request frame.
    address: UnitAddress,

    /// Maximum accepted response line length in bytes.
    max_line_length: usize,

    /// The previous line ended in `\r`; a leading `\n` must be skipped.
    skip_line_feed: bool,

    /// An over-long line is being discarded up to its terminator.
    discarding: bool,
}

impl ElcomCodec {
    /// Create a codec for the given unit address with the default maximum
    /// line length.
    ///
    /// # Example
    ///
    /// ```
    /// use gatehouse_core::UnitAddress;
    /// use gatehouse_protocol::ElcomCodec;
    ///
    /// let codec = ElcomCodec::new(UnitAddress::default());
    /// assert_eq!(codec.address().as_str(), "22");
    /// ```
    pub fn new(address: UnitAddress) -> Self {
        Self::with_max_line_length(address, MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom maximum line length.
    pub fn with_max_line_length(address: UnitAddress, max_line_length: usize) -> Self {
        Self {
            address,
            max_line_length,
            skip_line_feed: false,
            discarding: false,
        }
    }

    /// Address written into request frames.
    pub fn address(&self) -> &UnitAddress {
        &self.address
    }

    /// Get the current maximum line length.
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Forget any partially decoded line state.
    ///
    /// Call together with clearing the read buffer so the next response
    /// starts from a clean line boundary.
    pub fn reset(&mut self) {
        self.skip_line_feed = false;
        self.discarding = false;
    }
}

impl Default for ElcomCodec {
    fn default() -> Self {
        Self::new(UnitAddress::default())
    }
}

impl Decoder for ElcomCodec {
    type Item = String;
    type Error = io::Error;

    /// Decode one response line from the byte stream.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(line))` - A complete line, terminator removed
    /// - `Ok(Some(""))` - An empty or discarded over-long line
    /// - `Ok(None)` - Need more data
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if self.skip_line_feed {
            if src.is_empty() {
                return Ok(None);
            }
            if src[0] == LINE_FEED {
                src.advance(1);
            }
            self.skip_line_feed = false;
        }

        let terminator = src.iter().position(|&b| b == FRAME_END || b == LINE_FEED);

        match terminator {
            Some(end) => {
                let line = src.split_to(end);
                self.skip_line_feed = src[0] == FRAME_END;
                src.advance(1);

                if self.discarding || line.len() > self.max_line_length {
                    self.discarding = false;
                    return Ok(Some(String::new()));
                }

                Ok(Some(String::from_utf8_lossy(&line).into_owned()))
            }
            None => {
                if src.len() > self.max_line_length {
                    // Drop what we have; the rest of the line is dropped when
                    // its terminator shows up.
                    src.clear();
                    self.discarding = true;
                }
                Ok(None)
            }
        }
    }

    /// A partial line at end of stream is dropped rather than treated as an
    /// error; the link reports end of stream on its own.
    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        match self.decode(buf)? {
            Some(line) => Ok(Some(line)),
            None => {
                buf.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<Command> for ElcomCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), io::Error> {
        let command = item.as_str();
        dst.reserve(2 + self.address.as_str().len() + command.len());
        dst.put_u8(FRAME_START);
        dst.put_slice(self.address.as_str().as_bytes());
        dst.put_slice(command.as_bytes());
        dst.put_u8(FRAME_END);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode_request;

    fn decode_all(codec: &mut ElcomCodec, buffer: &mut BytesMut) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = codec.decode(buffer).unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_codec_new() {
        let codec = ElcomCodec::new(UnitAddress::default());
        assert_eq!(codec.max_line_length(), MAX_LINE_LENGTH);
        assert_eq!(codec.address().as_str(), "22");
    }

    #[test]
    fn test_decode_cr_terminated_line() {
        let mut codec = ElcomCodec::default();
        let mut buffer = BytesMut::from(&b"22D\r"[..]);

        assert_eq!(codec.decode(&mut buffer).unwrap(), Some("22D".to_string()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decode_lf_terminated_line() {
        let mut codec = ElcomCodec::default();
        let mut buffer = BytesMut::from(&b"22T\n"[..]);

        assert_eq!(codec.decode(&mut buffer).unwrap(), Some("22T".to_string()));
    }

    #[test]
    fn test_decode_crlf_is_one_terminator() {
        let mut codec = ElcomCodec::default();
        let mut buffer = BytesMut::from(&b"22D\r\n22T\r\n"[..]);

        assert_eq!(decode_all(&mut codec, &mut buffer), vec!["22D", "22T"]);
    }

    #[test]
    fn test_decode_crlf_split_across_reads() {
        let mut codec = ElcomCodec::default();
        let mut buffer = BytesMut::from(&b"22D\r"[..]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some("22D".to_string()));
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b"\n22P\r");
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some("22P".to_string()));
    }

    #[test]
    fn test_decode_blank_lf_line_after_lf() {
        // Only a \n following \r is swallowed; \n\n is two lines.
        let mut codec = ElcomCodec::default();
        let mut buffer = BytesMut::from(&b"22D\n\n"[..]);

        assert_eq!(decode_all(&mut codec, &mut buffer), vec!["22D", ""]);
    }

    #[test]
    fn test_decode_partial_line() {
        let mut codec = ElcomCodec::default();
        let mut buffer = BytesMut::from(&b"2212345"[..]);

        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
        buffer.extend_from_slice(b"67\r");
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some("221234567".to_string())
        );
    }

    #[test]
    fn test_decode_over_long_line_is_discarded() {
        let mut codec = ElcomCodec::with_max_line_length(UnitAddress::default(), 8);
        let mut buffer = BytesMut::from(&b"22AAAAAAAAAAAA"[..]);

        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
        assert!(buffer.is_empty());

        buffer.extend_from_slice(b"AAAA\r22D\r");
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(String::new()));
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some("22D".to_string()));
    }

    #[test]
    fn test_reset_clears_line_state() {
        let mut codec = ElcomCodec::with_max_line_length(UnitAddress::default(), 8);
        let mut buffer = BytesMut::from(&b"22AAAAAAAAAAAA"[..]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);

        codec.reset();
        buffer.extend_from_slice(b"22D\r");
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some("22D".to_string()));

        let mut buffer = BytesMut::from(&b"22T\r"[..]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some("22T".to_string()));
        codec.reset();

        // Without the pending \r, a leading \n is a blank line.
        buffer.extend_from_slice(b"\n");
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(String::new()));
    }

    #[test]
    fn test_decode_over_long_complete_line() {
        let mut codec = ElcomCodec::with_max_line_length(UnitAddress::default(), 4);
        let mut buffer = BytesMut::from(&b"22ABCDEF\r"[..]);

        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(String::new()));
    }

    #[test]
    fn test_decode_non_ascii_is_replaced() {
        let mut codec = ElcomCodec::default();
        let mut buffer = BytesMut::from(&b"22\xFFD\r"[..]);

        let line = codec.decode(&mut buffer).unwrap().unwrap();
        assert!(line.starts_with("22"));
        assert!(line.ends_with('D'));
    }

    #[test]
    fn test_decode_eof_drops_partial_line() {
        let mut codec = ElcomCodec::default();
        let mut buffer = BytesMut::from(&b"22D"[..]);

        assert_eq!(codec.decode_eof(&mut buffer).unwrap(), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_encode_matches_request_encoding() {
        let mut codec = ElcomCodec::default();

        for command in [
            Command::QueryStatus,
            Command::ReadCredential,
            Command::OpenGranted,
            Command::OpenDenied,
        ] {
            let mut buffer = BytesMut::new();
            codec.encode(command, &mut buffer).unwrap();
            assert_eq!(
                &buffer[..],
                &encode_request(&UnitAddress::default(), command)[..]
            );
        }
    }

    #[test]
    fn test_encode_uses_codec_address() {
        let mut codec = ElcomCodec::new(UnitAddress::new("05").unwrap());
        let mut buffer = BytesMut::new();

        codec.encode(Command::OpenDenied, &mut buffer).unwrap();
        assert_eq!(&buffer[..], b"#05OD\r");
    }
}
