//! Simulated camera backend.
//!
//! Renders a smooth synthetic scene through the
//! [`PlanckCurve`] model and adds detector drift, so the whole
//! acquisition path can run on a bench without the vendor
//! SDK. Faults can be injected at every step of the camera
//! interface.

use std::{
    cell::RefCell,
    collections::HashSet,
    path::Path,
    rc::Rc,
    time::Duration,
};

use crate::{
    camera::{Camera, CameraConnector, License, Range, Resolution},
    error::{CameraError, CameraResult},
    temperature::{to_counts, PlanckCurve, SensorDrift, TemperatureResolution},
};

/// Step of the camera interface that should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    License,
    Connect,
    Resolution,
    Settings,
    Range,
    SensorTemperature,
    FrameGrabber,
    /// Fail the n-th capture (zero based).
    CaptureAt(usize),
}

/// Observable state shared between a connector and the
/// camera it produced.
#[derive(Debug, Default)]
pub struct SimState {
    pub grabbing: bool,
    pub captures: usize,
    pub range: Option<Range>,
}

/// Connector for [`SimulatedCamera`].
pub struct SimulatedConnector {
    resolution: Resolution,
    faults: HashSet<Fault>,
    scene: Scene,
    state: Rc<RefCell<SimState>>,
}

impl SimulatedConnector {
    pub fn new(resolution: Resolution) -> Self {
        SimulatedConnector {
            resolution,
            faults: HashSet::new(),
            scene: Scene::default(),
            state: Rc::new(RefCell::new(SimState::default())),
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.insert(fault);
        self
    }

    pub fn with_scene(mut self, scene: Scene) -> Self {
        self.scene = scene;
        self
    }

    pub fn state(&self) -> Rc<RefCell<SimState>> {
        self.state.clone()
    }

    fn fails(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }
}

impl CameraConnector for SimulatedConnector {
    type Camera = SimulatedCamera;

    fn load_license(&self, path: &Path) -> CameraResult<License> {
        if self.fails(Fault::License) {
            return Err(CameraError::License(format!("{}", path.display())));
        }
        Ok(License {
            path: path.to_path_buf(),
            serial_number: License::serial_from_path(path)
                .unwrap_or_else(|| "SIMULATED".to_string()),
        })
    }

    fn connect(&self, license: &License) -> CameraResult<SimulatedCamera> {
        if self.fails(Fault::Connect) {
            return Err(CameraError::Connect(license.serial_number.clone()));
        }
        Ok(SimulatedCamera {
            resolution: self.resolution,
            faults: self.faults.clone(),
            scene: self.scene.clone(),
            state: self.state.clone(),
        })
    }
}

/// Synthetic scene and detector parameters.
#[derive(Debug, Clone)]
pub struct Scene {
    pub curve: PlanckCurve,
    pub drift: SensorDrift,
    /// Scene temperature at the top-left pixel.
    pub base_temperature: f64,
    /// Temperature added across the full width / height.
    pub gradient: (f64, f64),
    /// Temperature added per captured frame.
    pub warming: f64,
    pub sensor_temperature: f64,
    pub temperature_resolution: TemperatureResolution,
}

impl Default for Scene {
    fn default() -> Self {
        Scene {
            curve: PlanckCurve::default(),
            drift: SensorDrift::default(),
            base_temperature: 25.,
            gradient: (10., 5.),
            warming: 0.5,
            sensor_temperature: 31.5,
            temperature_resolution: TemperatureResolution::High,
        }
    }
}

impl Scene {
    /// True scene temperature at a pixel for the n-th frame.
    pub fn temperature_at(&self, resolution: Resolution, row: usize, col: usize, frame: usize) -> f64 {
        let fx = col as f64 / resolution.width.max(1) as f64;
        let fy = row as f64 / resolution.height.max(1) as f64;
        self.base_temperature + self.gradient.0 * fx + self.gradient.1 * fy + self.warming * frame as f64
    }
}

/// Camera backed by a synthetic [`Scene`].
pub struct SimulatedCamera {
    resolution: Resolution,
    faults: HashSet<Fault>,
    scene: Scene,
    state: Rc<RefCell<SimState>>,
}

impl SimulatedCamera {
    fn fails(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }
}

impl Camera for SimulatedCamera {
    fn resolution(&mut self) -> CameraResult<Resolution> {
        if self.fails(Fault::Resolution) {
            return Err(CameraError::Resolution {
                width: 0,
                height: 0,
            });
        }
        Ok(self.resolution)
    }

    fn apply_default_settings(&mut self) -> CameraResult<()> {
        if self.fails(Fault::Settings) {
            return Err(CameraError::Settings("simulated failure".into()));
        }
        Ok(())
    }

    fn set_range(&mut self, range: Range) -> CameraResult<()> {
        if self.fails(Fault::Range) {
            return Err(CameraError::Range(format!("{:?} not supported", range)));
        }
        self.state.borrow_mut().range = Some(range);
        Ok(())
    }

    fn sensor_temperature(&mut self) -> CameraResult<f64> {
        if self.fails(Fault::SensorTemperature) {
            return Err(CameraError::SensorTemperature("simulated failure".into()));
        }
        Ok(self.scene.sensor_temperature)
    }

    fn start_frame_grabber(&mut self) -> CameraResult<()> {
        if self.fails(Fault::FrameGrabber) {
            return Err(CameraError::FrameGrabber("simulated failure".into()));
        }
        self.state.borrow_mut().grabbing = true;
        Ok(())
    }

    fn stop_frame_grabber(&mut self) {
        self.state.borrow_mut().grabbing = false;
    }

    fn capture_frame(&mut self, buffer: &mut [u8], _timeout: Duration) -> CameraResult<()> {
        let frame = {
            let mut state = self.state.borrow_mut();
            if !state.grabbing {
                return Err(CameraError::Capture("frame grabber not started".into()));
            }
            state.captures += 1;
            state.captures - 1
        };
        if self.fails(Fault::CaptureAt(frame)) {
            return Err(CameraError::Capture(format!("simulated failure on frame {}", frame)));
        }
        if buffer.len() != self.resolution.frame_len() {
            return Err(CameraError::Capture(format!(
                "buffer holds {} bytes, frame needs {}",
                buffer.len(),
                self.resolution.frame_len()
            )));
        }

        let Resolution { width, .. } = self.resolution;
        // The detector reports the drift of its actual
        // temperature, even when the reading is unavailable.
        let drift = self.scene.drift.counts_at(self.scene.sensor_temperature);
        for (i, bytes) in buffer.chunks_exact_mut(2).enumerate() {
            let (row, col) = (i / width, i % width);
            let temp = self.scene.temperature_at(self.resolution, row, col, frame);
            let raw = to_counts(self.scene.curve.temp_to_raw(temp) + drift);
            bytes.copy_from_slice(&raw.to_ne_bytes());
        }
        Ok(())
    }

    fn calibrate_in_place(&mut self, samples: &mut [u16], sensor_temperature: f64) {
        self.scene.drift.compensate(samples, sensor_temperature);
    }

    fn temperature_resolution(&mut self) -> TemperatureResolution {
        self.scene.temperature_resolution
    }

    fn raw_to_celsius(&self, sample: u16, resolution: TemperatureResolution) -> f32 {
        resolution.quantize(self.scene.curve.raw_to_temp(sample as f64)) as f32
    }
}
