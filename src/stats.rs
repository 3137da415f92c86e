//! Running summary statistics over temperature values.

use std::ops::AddAssign;

use serde_derive::*;

/// Count, extrema, mean and standard deviation of a stream
/// of values. Non-finite values are counted separately and
/// otherwise ignored.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Stats {
    pub count: usize,
    pub non_finite: usize,
    pub min: f64,
    pub max: f64,
    sum: f64,
    sum_sq: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            count: 0,
            non_finite: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.,
            sum_sq: 0.,
        }
    }
}

impl Stats {
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut stats = Stats::default();
        for v in values {
            stats += v;
        }
        stats
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.sum / self.count as f64)
    }

    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let var = (self.sum_sq / self.count as f64 - mean * mean).max(0.);
        Some(var.sqrt())
    }
}

impl AddAssign<f64> for Stats {
    fn add_assign(&mut self, val: f64) {
        if !val.is_finite() {
            self.non_finite += 1;
            return;
        }
        self.count += 1;
        self.min = self.min.min(val);
        self.max = self.max.max(val);
        self.sum += val;
        self.sum_sq += val * val;
    }
}

impl AddAssign<&Stats> for Stats {
    fn add_assign(&mut self, other: &Stats) {
        self.count += other.count;
        self.non_finite += other.non_finite;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }
}

/// Serializable view with the derived fields filled in.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub non_finite: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
}

impl From<&Stats> for Summary {
    fn from(s: &Stats) -> Self {
        let has_values = s.count > 0;
        Summary {
            count: s.count,
            non_finite: s.non_finite,
            min: Some(s.min).filter(|_| has_values),
            max: Some(s.max).filter(|_| has_values),
            mean: s.mean(),
            std_dev: s.std_dev(),
        }
    }
}
