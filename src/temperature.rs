//! Radiometric model used by the simulated camera.
//!
//! Maps scene temperature to detector counts with the usual
//! Planck curve form
//!
//! ```text
//! raw = R1 / (R2 * (exp(B / (T + 273.15)) - F)) - O
//! ```
//!
//! plus a linear drift of the counts with the detector's own
//! temperature. The vendor SDK hides its calibration behind
//! the camera interface; this model only has to produce
//! plausible numbers for bench runs and tests.

use serde_derive::*;

const CELSIUS_OFFSET: f64 = 273.15;

/// Planck curve coefficients.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PlanckCurve {
    planck_r1: f64,
    planck_b: f64,
    planck_f: f64,
    planck_o: f64,
    planck_r2: f64,
}

impl Default for PlanckCurve {
    fn default() -> Self {
        PlanckCurve {
            planck_r1: 21106.77,
            planck_b: 1501.,
            planck_f: 1.,
            planck_o: -7340.,
            planck_r2: 0.012545258,
        }
    }
}

impl PlanckCurve {
    // raw = PR1/(PR2*(exp(PB/(temp+273.15))-PF))-PO
    pub fn temp_to_raw(&self, temp: f64) -> f64 {
        self.planck_r1
            / (self.planck_r2 * ((self.planck_b / (temp + CELSIUS_OFFSET)).exp() - self.planck_f))
            - self.planck_o
    }

    // inverse of above
    pub fn raw_to_temp(&self, raw: f64) -> f64 {
        self.planck_b
            / (self.planck_r1 / (self.planck_r2 * (raw + self.planck_o)) + self.planck_f).ln()
            - CELSIUS_OFFSET
    }
}

/// Detector self-heating drift, in counts, as a power series
/// of the offset from the reference sensor temperature.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SensorDrift {
    pub reference_temperature: f64,
    pub coeffs: Vec<f64>,
}

impl Default for SensorDrift {
    fn default() -> Self {
        SensorDrift {
            reference_temperature: 30.,
            coeffs: vec![0., 12.5],
        }
    }
}

impl SensorDrift {
    pub fn counts_at(&self, sensor_temperature: f64) -> f64 {
        power_series_at(&self.coeffs, sensor_temperature - self.reference_temperature)
    }

    /// Remove the drift at `sensor_temperature` from every
    /// sample, saturating at the `u16` bounds.
    pub fn compensate(&self, samples: &mut [u16], sensor_temperature: f64) {
        let offset = self.counts_at(sensor_temperature);
        for s in samples.iter_mut() {
            *s = to_counts(*s as f64 - offset);
        }
    }
}

/// Quantization applied when converting counts to Celsius.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureResolution {
    /// 0.1 degree steps.
    Normal,
    /// 0.01 degree steps.
    High,
}

impl TemperatureResolution {
    pub fn step(&self) -> f64 {
        match self {
            TemperatureResolution::Normal => 0.1,
            TemperatureResolution::High => 0.01,
        }
    }

    pub fn quantize(&self, celsius: f64) -> f64 {
        let step = self.step();
        (celsius / step).round() * step
    }
}

/// Round and clamp to a valid detector count.
pub fn to_counts(raw: f64) -> u16 {
    raw.round().max(0.).min(u16::MAX as f64) as u16
}

#[inline]
fn power_series_at(coeffs: &[f64], x: f64) -> f64 {
    let mut pow = 1.;
    let mut sum = 0.;
    for coeff in coeffs.iter() {
        sum += pow * coeff;
        pow *= x;
    }
    sum
}
