//! Scan configuration.
//!
//! Everything the acquisition run depends on is injected
//! through [`ScanConfig`]: device address, license, output
//! root, grid extent and timeouts. A config file is a JSON
//! object with any subset of the fields below; missing
//! fields take their defaults.
//!
//! ```json
//! {
//!   "serial_address": "/dev/ttyACM0",
//!   "license_path": "license_332C2309.wlic",
//!   "output_root": "recordings",
//!   "rows": "0-7",
//!   "cols": "0-7",
//!   "ack_timeout_ms": 1000
//! }
//! ```

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{ensure, Context, Result};
use serde_derive::*;

use crate::{
    camera::{Range, Resolution},
    grid::{Grid, GridRange},
    handshake::{DEFAULT_ACK_MARKER, DEFAULT_BAUD_RATE},
};

/// Camera implementation to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub serial_address: String,
    pub baud_rate: u32,
    pub license_path: PathBuf,
    pub output_root: PathBuf,
    pub rows: GridRange,
    pub cols: GridRange,
    pub ack_timeout_ms: u64,
    pub capture_timeout_ms: u64,
    pub ack_marker: String,
    /// Count a non-matching reply received before the
    /// acknowledgement timeout as a successful handshake. Only
    /// silence then skips a cell.
    pub accept_partial_reply: bool,
    pub range: Range,
    pub backend: Backend,
    /// Sensor size of the simulated backend.
    pub simulated_width: usize,
    pub simulated_height: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            serial_address: "/dev/ttyACM0".into(),
            baud_rate: DEFAULT_BAUD_RATE,
            license_path: "license.wlic".into(),
            output_root: "recordings".into(),
            rows: GridRange::default(),
            cols: GridRange::default(),
            ack_timeout_ms: 1000,
            capture_timeout_ms: 1000,
            ack_marker: DEFAULT_ACK_MARKER.into(),
            accept_partial_reply: true,
            range: Range::High,
            backend: Backend::Simulated,
            simulated_width: 640,
            simulated_height: 480,
        }
    }
}

impl ScanConfig {
    pub fn from_json_path(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.serial_address.trim().is_empty(),
            "serial address is empty"
        );
        ensure!(self.baud_rate > 0, "baud rate must be positive");
        ensure!(self.ack_timeout_ms > 0, "acknowledgement timeout must be positive");
        ensure!(self.capture_timeout_ms > 0, "capture timeout must be positive");
        ensure!(!self.ack_marker.is_empty(), "acknowledgement marker is empty");
        if self.backend == Backend::Simulated {
            ensure!(
                self.simulated_width > 0 && self.simulated_height > 0,
                "simulated sensor size must be non-zero"
            );
        }
        Ok(())
    }

    pub fn grid(&self) -> Grid {
        Grid::new(self.rows, self.cols)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn simulated_resolution(&self) -> Resolution {
        Resolution {
            width: self.simulated_width,
            height: self.simulated_height,
        }
    }
}
