//! Thermal camera collaborator.
//!
//! Frame grabbing, radiometric calibration and the count to
//! Celsius conversion are owned by the camera vendor's SDK.
//! The pipeline only sees them through the [`Camera`] and
//! [`CameraConnector`] traits: every call either succeeds
//! with a value of the documented shape or fails with a
//! [`CameraError`].

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::bail;
use serde_derive::*;
use tracing::{info, warn};

use crate::{
    error::{CameraError, CameraResult, Fatal},
    temperature::TemperatureResolution,
};

/// Sensor size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: usize,
    pub height: usize,
}

impl Resolution {
    pub fn pixels(&self) -> usize {
        self.width * self.height
    }

    /// Bytes in one raw frame (one `u16` per pixel).
    pub fn frame_len(&self) -> usize {
        self.pixels() * std::mem::size_of::<u16>()
    }
}

/// Thermal measurement range of the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Range {
    Low,
    High,
}

impl FromStr for Range {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Range::Low),
            "high" => Ok(Range::High),
            _ => bail!("unknown range `{}`: use `low` or `high`", s),
        }
    }
}

/// A license file accepted by a connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    pub path: PathBuf,
    pub serial_number: String,
}

impl License {
    /// Serial number encoded in the license file name, as in
    /// `license_332C2309.wlic`.
    pub fn serial_from_path(path: &Path) -> Option<String> {
        let stem = path.file_stem()?.to_str()?;
        let serial = stem.rsplit('_').next()?;
        if serial.is_empty() || serial == stem {
            return None;
        }
        Some(serial.to_string())
    }
}

/// Finds a camera and opens a session with it.
pub trait CameraConnector {
    type Camera: Camera;

    fn load_license(&self, path: &Path) -> CameraResult<License>;

    fn connect(&self, license: &License) -> CameraResult<Self::Camera>;
}

/// Operations of a connected camera.
pub trait Camera {
    fn resolution(&mut self) -> CameraResult<Resolution>;

    fn apply_default_settings(&mut self) -> CameraResult<()>;

    fn set_range(&mut self, range: Range) -> CameraResult<()>;

    /// Detector temperature in Celsius.
    fn sensor_temperature(&mut self) -> CameraResult<f64>;

    fn start_frame_grabber(&mut self) -> CameraResult<()>;

    fn stop_frame_grabber(&mut self);

    /// Fill `buffer` with one raw frame. `buffer` is exactly
    /// [`Resolution::frame_len`] bytes long.
    fn capture_frame(&mut self, buffer: &mut [u8], timeout: Duration) -> CameraResult<()>;

    /// Sensor temperature compensation, applied in place.
    fn calibrate_in_place(&mut self, samples: &mut [u16], sensor_temperature: f64);

    fn temperature_resolution(&mut self) -> TemperatureResolution;

    fn raw_to_celsius(&self, sample: u16, resolution: TemperatureResolution) -> f32;
}

/// A camera that passed session bring-up and is grabbing
/// frames. The frame grabber is stopped on drop.
pub struct CameraSession<C: Camera> {
    camera: C,
    resolution: Resolution,
    serial_number: String,
}

impl<C: Camera> CameraSession<C> {
    /// Run the bring-up sequence. Each failing step maps to
    /// its own [`Fatal`] variant; failing to set the range or
    /// read the sensor temperature only logs a warning.
    pub fn open<K>(connector: &K, license_path: &Path, range: Range) -> Result<Self, Fatal>
    where
        K: CameraConnector<Camera = C>,
    {
        let license = connector
            .load_license(license_path)
            .map_err(Fatal::LicenseInvalid)?;
        info!(serial = %license.serial_number, "license loaded");

        let mut camera = connector.connect(&license).map_err(Fatal::CameraConnect)?;

        let resolution = camera.resolution().map_err(Fatal::ZeroResolution)?;
        if resolution.width == 0 || resolution.height == 0 {
            return Err(Fatal::ZeroResolution(CameraError::Resolution {
                width: resolution.width,
                height: resolution.height,
            }));
        }

        camera
            .apply_default_settings()
            .map_err(Fatal::DefaultSettings)?;

        if let Err(e) = camera.set_range(range) {
            warn!("{}; continuing with the camera's current range", e);
        }

        match camera.sensor_temperature() {
            Ok(t) => info!(sensor_temperature = t, "camera ready"),
            Err(e) => warn!("{}", e),
        }

        camera.start_frame_grabber().map_err(Fatal::FrameGrabber)?;
        info!(
            width = resolution.width,
            height = resolution.height,
            resolution = ?camera.temperature_resolution(),
            "frame grabber started"
        );

        Ok(CameraSession {
            camera,
            resolution,
            serial_number: license.serial_number,
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Bytes in one raw frame.
    pub fn frame_len(&self) -> usize {
        self.resolution.frame_len()
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn camera(&mut self) -> &mut C {
        &mut self.camera
    }
}

impl<C: Camera> Drop for CameraSession<C> {
    fn drop(&mut self) {
        self.camera.stop_frame_grabber();
    }
}
