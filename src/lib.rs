//! Grid-synchronized thermal frame acquisition.
//!
//! A scanning stage is driven by a microcontroller on a
//! serial link. For every cell of a 2-D grid the host:
//!
//! 1. sends `ping <row>_<col>` and waits (bounded) for a
//! reply containing `pong`, see [`handshake`];
//! 2. grabs a frame from the thermal camera, see
//! [`camera`];
//! 3. calibrates the frame against the sensor temperature
//! and converts it to Celsius;
//! 4. writes the raw, calibrated and temperature buffers,
//! see [`storage`].
//!
//! Failures of a single cell are logged and the cell is
//! skipped; failures bringing up the channel or the camera
//! abort the run with a distinct [exit
//! code](error::Fatal::exit_code). The loop itself lives
//! in [`scan`].
//!
//! # Usage
//!
//! ```rust
//! # fn test_compile() -> Result<(), thermal_scan::error::Fatal> {
//! use std::path::Path;
//! use thermal_scan::{
//!     camera::{CameraSession, Range, Resolution},
//!     handshake::HandshakeChannel,
//!     scan::{ScanController, ScanSettings},
//!     sim::SimulatedConnector,
//!     storage::Session,
//!     grid::{Grid, GridRange},
//! };
//!
//! let mut channel =
//!     HandshakeChannel::open("/dev/ttyACM0", 115_200).map_err(thermal_scan::error::Fatal::Channel)?;
//! let connector = SimulatedConnector::new(Resolution { width: 640, height: 480 });
//! let mut camera = CameraSession::open(&connector, Path::new("license.wlic"), Range::High)?;
//!
//! let session = Session::create(Path::new("recordings"))
//!     .map_err(|e| thermal_scan::error::Fatal::Session(e.into()))?;
//! let report = ScanController::new(
//!     &mut channel,
//!     &mut camera,
//!     Grid::new(GridRange::default(), GridRange::default()),
//!     ScanSettings::default(),
//! )
//! .run(&session);
//! println!("captured {} cells", report.captured());
//! # Ok(())
//! # }
//! ```
//!
//! Recorded sessions can be read back with
//! [`storage::read_temperature_map`] and summarized with
//! [`stats::Stats`].

pub mod camera;
pub mod cli;
pub mod config;
pub mod error;
pub mod grid;
pub mod handshake;
pub mod scan;
pub mod sim;
pub mod stats;
pub mod storage;
pub mod temperature;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use crate::config::ScanConfig;
pub use crate::error::Fatal;
pub use crate::grid::{Grid, GridIndex, GridRange};
pub use crate::handshake::HandshakeChannel;
pub use crate::scan::{ScanController, ScanReport};
