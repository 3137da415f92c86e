//! Ping / pong handshake with the stage microcontroller.
//!
//! The protocol is newline-terminated ASCII. The host sends
//! `ping <row>_<col>\n` and the device answers with any text
//! containing the acknowledgement marker (`pong` by default).
//! There is no framing beyond that, no checksum and no
//! sequence number.

use std::{
    io::{self, Read, Write},
    thread,
    time::{Duration, Instant},
};

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use crate::{error::ChannelError, grid::GridIndex};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_ACK_MARKER: &str = "pong";

/// Upper bound on a single blocking read while waiting for
/// a reply.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

const READ_CHUNK: usize = 256;

/// Byte stream the channel runs over.
///
/// Reads must honour the timeout set through
/// [`set_read_timeout`][Link::set_read_timeout] and report an
/// expired wait as [`io::ErrorKind::TimedOut`] (or
/// `WouldBlock`).
pub trait Link: Read + Write {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Drop everything buffered in either direction.
    fn discard_pending(&mut self) -> io::Result<()>;
}

impl Link for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }

    fn discard_pending(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::All).map_err(io::Error::from)
    }
}

/// Outcome of [`HandshakeChannel::await_acknowledgement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    /// Everything received during the wait.
    pub text: String,
    /// Whether `text` contains the marker. `false` means the
    /// wait timed out with a partial, non-matching reply.
    pub matched: bool,
}

/// Request / acknowledge channel over a [`Link`].
pub struct HandshakeChannel<L: Link> {
    link: Option<L>,
    marker: String,
    poll_interval: Duration,
}

impl HandshakeChannel<Box<dyn SerialPort>> {
    /// Open a serial device at 8N1 with no flow control.
    pub fn open(address: &str, baud_rate: u32) -> Result<Self, ChannelError> {
        let port = serialport::new(address, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(DEFAULT_POLL_INTERVAL)
            .open()
            .map_err(|source| ChannelError::Unavailable {
                address: address.to_string(),
                source,
            })?;
        info!(address, baud_rate, "serial channel open");
        Self::with_link(port)
    }
}

impl<L: Link> HandshakeChannel<L> {
    /// Wrap an already open link. Stale bytes from a previous
    /// session are discarded so they cannot be mistaken for
    /// an acknowledgement.
    pub fn with_link(mut link: L) -> Result<Self, ChannelError> {
        link.discard_pending()?;
        Ok(HandshakeChannel {
            link: Some(link),
            marker: DEFAULT_ACK_MARKER.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// The underlying link, unless the channel was closed.
    pub fn get_ref(&self) -> Option<&L> {
        self.link.as_ref()
    }

    fn link(&mut self) -> Result<&mut L, ChannelError> {
        self.link.as_mut().ok_or(ChannelError::Closed)
    }

    /// Send `line` with a single write. A short write is an
    /// error: it would leave the device mid-line.
    pub fn send(&mut self, line: &str) -> Result<(), ChannelError> {
        let link = self.link()?;
        let expected = line.len();
        let written = link.write(line.as_bytes())?;
        if written != expected {
            return Err(ChannelError::WriteIncomplete { written, expected });
        }
        link.flush()?;
        Ok(())
    }

    /// Send the positional ping for `index`.
    pub fn ping(&mut self, index: GridIndex) -> Result<(), ChannelError> {
        debug!(%index, "ping");
        self.send(&ping_message(index))
    }

    /// Wait up to `timeout` for the acknowledgement marker.
    ///
    /// Returns as soon as the marker shows up in the received
    /// text. Once the timeout expires, returns the partial
    /// text if anything arrived, and
    /// [`ChannelError::Timeout`] otherwise.
    pub fn await_acknowledgement(
        &mut self,
        timeout: Duration,
    ) -> Result<Acknowledgement, ChannelError> {
        let start = Instant::now();
        let mut received = Vec::new();

        while let Some(remaining) = timeout.checked_sub(start.elapsed()) {
            if remaining.is_zero() {
                break;
            }
            let chunk = self.read_chunk(remaining.min(self.poll_interval))?;
            if chunk.is_empty() {
                continue;
            }
            received.extend_from_slice(&chunk);

            let text = String::from_utf8_lossy(&received);
            if text.contains(self.marker.as_str()) {
                debug!(reply = %text.trim_end(), elapsed_ms = start.elapsed().as_millis() as u64, "acknowledged");
                return Ok(Acknowledgement {
                    text: text.into_owned(),
                    matched: true,
                });
            }
        }

        if received.is_empty() {
            return Err(ChannelError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        Ok(Acknowledgement {
            text: String::from_utf8_lossy(&received).into_owned(),
            matched: false,
        })
    }

    /// One blocking read of at most `wait`. An expired wait
    /// yields an empty chunk.
    pub fn read_chunk(&mut self, wait: Duration) -> Result<Vec<u8>, ChannelError> {
        let wait = wait.max(Duration::from_millis(1));
        let link = self.link()?;
        link.set_read_timeout(wait)?;

        let mut buf = [0u8; READ_CHUNK];
        match link.read(&mut buf) {
            Ok(0) => {
                // Nothing pending and the link did not block.
                thread::sleep(wait);
                Ok(vec![])
            }
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e) if is_idle(&e) => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }

    /// Release the link. Calling this more than once is a
    /// no-op.
    pub fn close(&mut self) {
        if self.link.take().is_some() {
            debug!("serial channel closed");
        }
    }
}

impl<L: Link> Drop for HandshakeChannel<L> {
    fn drop(&mut self) {
        self.close();
    }
}

/// The ping line for `index`, newline included.
pub fn ping_message(index: GridIndex) -> String {
    format!("ping {}\n", index)
}

fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
