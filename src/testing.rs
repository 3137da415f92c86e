//! In-memory stand-ins for the stage microcontroller.

use std::{
    cell::Cell,
    collections::VecDeque,
    rc::Rc,
    io::{self, Read, Write},
    thread,
    time::{Duration, Instant},
};

use crate::handshake::Link;

/// How the fake device answers a line written to it.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Pong { after: Duration },
    Text(&'static str),
    Silent,
    ShortWrite,
}

/// Scripted serial peer. Every complete line written to it
/// is recorded and answered through the `respond` callback;
/// extra bytes can be scheduled with [`push_after`].
///
/// [`push_after`]: FakeDevice::push_after
pub(crate) struct FakeDevice {
    respond: Box<dyn FnMut(&str) -> Reply>,
    created: Instant,
    inbox: VecDeque<(Instant, Vec<u8>)>,
    timeout: Duration,
    pending_line: Vec<u8>,
    drops: Rc<Cell<usize>>,
    pub lines: Vec<String>,
}

impl FakeDevice {
    pub fn new<F>(respond: F) -> Self
    where
        F: FnMut(&str) -> Reply + 'static,
    {
        FakeDevice {
            respond: Box::new(respond),
            created: Instant::now(),
            inbox: VecDeque::new(),
            timeout: Duration::from_millis(10),
            pending_line: vec![],
            drops: Rc::new(Cell::new(0)),
            lines: vec![],
        }
    }

    /// Queue `bytes` to arrive `delay` after the device was
    /// created.
    pub fn push_after(&mut self, delay: Duration, bytes: &[u8]) {
        let due = self.created + delay;
        self.schedule(due, bytes.to_vec());
    }

    /// Counts how many times this device has been dropped.
    pub fn drop_counter(&self) -> Rc<Cell<usize>> {
        self.drops.clone()
    }

    fn schedule(&mut self, due: Instant, bytes: Vec<u8>) {
        let pos = self
            .inbox
            .iter()
            .position(|(at, _)| *at > due)
            .unwrap_or(self.inbox.len());
        self.inbox.insert(pos, (due, bytes));
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

impl Read for FakeDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let now = Instant::now();
        let deadline = now + self.timeout;
        let due = match self.inbox.front() {
            Some((due, _)) if *due <= deadline => *due,
            _ => {
                thread::sleep(self.timeout);
                return Err(io::ErrorKind::TimedOut.into());
            }
        };
        if due > now {
            thread::sleep(due - now);
        }

        let (at, mut bytes) = match self.inbox.pop_front() {
            Some(item) => item,
            None => return Err(io::ErrorKind::TimedOut.into()),
        };
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        if n < bytes.len() {
            let rest = bytes.split_off(n);
            self.inbox.push_front((at, rest));
        }
        Ok(n)
    }
}

impl Write for FakeDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending_line.extend_from_slice(buf);
        let mut accepted = buf.len();

        while let Some(pos) = self.pending_line.iter().position(|&b| b == b'\n') {
            let rest = self.pending_line.split_off(pos + 1);
            let line = String::from_utf8_lossy(&self.pending_line)
                .trim_end()
                .to_string();
            self.pending_line = rest;

            let now = Instant::now();
            match (self.respond)(&line) {
                Reply::Pong { after } => self.schedule(now + after, b"pong\r\n".to_vec()),
                Reply::Text(text) => self.schedule(now, text.as_bytes().to_vec()),
                Reply::Silent => {}
                Reply::ShortWrite => {
                    accepted = buf.len().saturating_sub(1);
                    self.pending_line.clear();
                }
            }
            self.lines.push(line);
        }
        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Link for FakeDevice {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn discard_pending(&mut self) -> io::Result<()> {
        let now = Instant::now();
        self.inbox.retain(|(due, _)| *due > now);
        self.pending_line.clear();
        Ok(())
    }
}
