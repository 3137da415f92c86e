//! The grid scan controller.
//!
//! For every cell of the grid, in row-major order: ping the
//! stage, wait for its acknowledgement, grab a frame, derive
//! the calibrated frame and temperature map, and write all
//! three to the session. A failing cell is logged and
//! skipped; it never stops the scan and never changes the
//! order in which later cells are visited.

use std::{fmt, time::Duration};

use serde_derive::*;
use tracing::{error, info, warn};

use crate::{
    camera::{Camera, CameraSession, Resolution},
    config::ScanConfig,
    grid::{Grid, GridIndex, GridRange},
    handshake::{HandshakeChannel, Link},
    stats::{Stats, Summary},
    storage::Session,
};

/// Per-cell timing and acknowledgement policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub ack_timeout: Duration,
    pub capture_timeout: Duration,
    pub accept_partial_reply: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings::from(&ScanConfig::default())
    }
}

impl From<&ScanConfig> for ScanSettings {
    fn from(config: &ScanConfig) -> Self {
        ScanSettings {
            ack_timeout: config.ack_timeout(),
            capture_timeout: config.capture_timeout(),
            accept_partial_reply: config.accept_partial_reply,
        }
    }
}

/// Step of a cell's capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Send,
    Acknowledge,
    Capture,
    Store,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Step::Send => "send",
            Step::Acknowledge => "acknowledge",
            Step::Capture => "capture",
            Step::Store => "store",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CellOutcome {
    Captured {
        /// `None` when the reading failed and calibration fell
        /// back to 0.
        sensor_temperature: Option<f64>,
        temperature: Summary,
    },
    Skipped {
        step: Step,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellRecord {
    pub index: GridIndex,
    #[serde(flatten)]
    pub outcome: CellOutcome,
}

/// Everything that happened during one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub session: String,
    pub rows: GridRange,
    pub cols: GridRange,
    pub resolution: Resolution,
    pub cells: Vec<CellRecord>,
}

impl ScanReport {
    pub fn visited(&self) -> impl Iterator<Item = GridIndex> + '_ {
        self.cells.iter().map(|c| c.index)
    }

    pub fn captured(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| matches!(c.outcome, CellOutcome::Captured { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.cells.len() - self.captured()
    }

    pub fn skipped_at(&self, index: GridIndex) -> Option<Step> {
        self.cells.iter().find_map(|c| match &c.outcome {
            CellOutcome::Skipped { step, .. } if c.index == index => Some(*step),
            _ => None,
        })
    }
}

struct Skip {
    step: Step,
    reason: String,
}

impl Skip {
    fn new(step: Step, reason: impl fmt::Display) -> Self {
        Skip {
            step,
            reason: reason.to_string(),
        }
    }
}

/// Drives the handshake channel and the camera over a grid.
///
/// Both devices are borrowed: they stay open across sessions
/// and are released by their owners.
pub struct ScanController<'a, L: Link, C: Camera> {
    channel: &'a mut HandshakeChannel<L>,
    camera: &'a mut CameraSession<C>,
    grid: Grid,
    settings: ScanSettings,
}

impl<'a, L: Link, C: Camera> ScanController<'a, L, C> {
    pub fn new(
        channel: &'a mut HandshakeChannel<L>,
        camera: &'a mut CameraSession<C>,
        grid: Grid,
        settings: ScanSettings,
    ) -> Self {
        ScanController {
            channel,
            camera,
            grid,
            settings,
        }
    }

    /// Scan every cell once, writing into `session`.
    pub fn run(&mut self, session: &Session) -> ScanReport {
        info!(
            session = session.name(),
            cells = self.grid.cell_count(),
            rows = %self.grid.rows,
            cols = %self.grid.cols,
            "scan started"
        );

        let mut report = ScanReport {
            session: session.name().to_string(),
            rows: self.grid.rows,
            cols: self.grid.cols,
            resolution: self.camera.resolution(),
            cells: Vec::with_capacity(self.grid.cell_count()),
        };

        for index in self.grid.indices() {
            let outcome = match self.scan_cell(session, index) {
                Ok(outcome) => outcome,
                Err(skip) => {
                    error!(%index, step = %skip.step, "{}; skipping cell", skip.reason);
                    CellOutcome::Skipped {
                        step: skip.step,
                        reason: skip.reason,
                    }
                }
            };
            report.cells.push(CellRecord { index, outcome });
        }

        info!(
            session = session.name(),
            captured = report.captured(),
            skipped = report.skipped(),
            "scan finished"
        );
        report
    }

    fn scan_cell(&mut self, session: &Session, index: GridIndex) -> Result<CellOutcome, Skip> {
        self.channel
            .ping(index)
            .map_err(|e| Skip::new(Step::Send, e))?;

        let ack = self
            .channel
            .await_acknowledgement(self.settings.ack_timeout)
            .map_err(|e| Skip::new(Step::Acknowledge, e))?;
        if !ack.matched {
            let reason = format!(
                "reply without `{}` marker: {:?}",
                self.channel.marker(),
                ack.text.trim()
            );
            if !self.settings.accept_partial_reply {
                return Err(Skip::new(Step::Acknowledge, reason));
            }
            warn!(%index, "{}; accepted as acknowledgement", reason);
        }

        let resolution = self.camera.resolution();
        let capture_timeout = self.settings.capture_timeout;
        let camera = self.camera.camera();

        let mut raw = vec![0u8; resolution.frame_len()];
        camera
            .capture_frame(&mut raw, capture_timeout)
            .map_err(|e| Skip::new(Step::Capture, e))?;

        let mut calibrated = samples_from_bytes(&raw);
        let sensor_temperature = match camera.sensor_temperature() {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(%index, "{}; calibrating with sensor temperature 0", e);
                None
            }
        };
        camera.calibrate_in_place(&mut calibrated, sensor_temperature.unwrap_or(0.));

        let temp_res = camera.temperature_resolution();
        let temperature: Vec<f32> = calibrated
            .iter()
            .map(|&s| camera.raw_to_celsius(s, temp_res))
            .collect();

        session
            .store(index, &raw, &calibrated, &temperature)
            .map_err(|e| Skip::new(Step::Store, e))?;

        let stats = Stats::from_values(temperature.iter().map(|&t| t as f64));
        let summary = Summary::from(&stats);
        info!(
            %index,
            min = ?summary.min,
            max = ?summary.max,
            mean = ?summary.mean,
            "cell captured"
        );

        Ok(CellOutcome::Captured {
            sensor_temperature,
            temperature: summary,
        })
    }
}

/// Reinterpret a raw frame as native-endian 16-bit samples.
pub fn samples_from_bytes(raw: &[u8]) -> Vec<u16> {
    raw.chunks_exact(2)
        .map(|b| u16::from_ne_bytes([b[0], b[1]]))
        .collect()
}
