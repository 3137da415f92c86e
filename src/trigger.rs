//! Session triggers sent by the stage controller.
//!
//! Besides answering pings, the controller announces when a
//! scan should start by printing a framed line such as
//! `<RUN>`. Anything that is not framed by `<` and `>` is
//! ignored.

use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::{
    error::ChannelError,
    handshake::{HandshakeChannel, Link},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start a scan session.
    Run,
    /// Leave trigger mode.
    Stop,
}

impl Command {
    pub fn from_frame(frame: &str) -> Option<Self> {
        match frame {
            "RUN" => Some(Command::Run),
            "STOP" => Some(Command::Stop),
            _ => None,
        }
    }
}

/// The payload of a `<...>` framed line.
pub fn parse_framed(line: &str) -> Option<&str> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"^<([^<>]*)>$").unwrap();
    }
    RE.captures(line.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Splits the incoming byte stream into lines and picks out
/// commands. Partial lines are kept between calls.
#[derive(Debug, Default)]
pub struct TriggerListener {
    buffer: Vec<u8>,
}

impl TriggerListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until a command arrives, or until `deadline`
    /// expires (`Ok(None)`). With no deadline, waits for as
    /// long as the channel stays healthy.
    pub fn wait<L: Link>(
        &mut self,
        channel: &mut HandshakeChannel<L>,
        poll: Duration,
        deadline: Option<Duration>,
    ) -> Result<Option<Command>, ChannelError> {
        let start = Instant::now();
        loop {
            if let Some(cmd) = self.next_command() {
                return Ok(Some(cmd));
            }
            if let Some(limit) = deadline {
                if start.elapsed() >= limit {
                    return Ok(None);
                }
            }
            let chunk = channel.read_chunk(poll)?;
            self.buffer.extend_from_slice(&chunk);
        }
    }

    fn next_command(&mut self) -> Option<Command> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let rest = self.buffer.split_off(pos + 1);
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer = rest;

            match parse_framed(&line) {
                Some(frame) => match Command::from_frame(frame) {
                    Some(cmd) => return Some(cmd),
                    None => debug!(frame, "ignoring unknown command"),
                },
                None => debug!(line = %line.trim_end(), "ignoring unframed line"),
            }
        }
        None
    }
}
