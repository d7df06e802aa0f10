//! Synthetic dispersed pulses for exercising the transform.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::axes::{FrequencyAxis, TimeAxis};
use crate::math::dispersion::relative_delays;
use crate::prelude::{FdmtError, FdmtResult};

/// Gaussian pulse swept across the band by a dispersion measure.
///
/// `t0` is the arrival time at the last channel of the frequency axis; every
/// other channel arrives later by its relative dispersion delay, wrapped
/// around the observation span.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispersedPulse {
    pub dm: f64,
    pub t0: f64,
    pub width: f64,
    pub amplitude: f64,
}

impl Default for DispersedPulse {
    fn default() -> Self {
        Self {
            dm: 332.72,
            t0: 2e-3,
            width: 2.12e-3,
            amplitude: 0.5,
        }
    }
}

impl DispersedPulse {
    /// Renders the pulse into a zero (M, N) spectrogram.
    pub fn render(&self, freqs: &FrequencyAxis, times: &TimeAxis) -> FdmtResult<Array2<f64>> {
        let mut spectrogram = Array2::zeros((times.len(), freqs.len()));
        self.add_to(&mut spectrogram, freqs, times)?;
        Ok(spectrogram)
    }

    /// Adds the pulse onto an existing (M, N) spectrogram.
    pub fn add_to(
        &self,
        spectrogram: &mut Array2<f64>,
        freqs: &FrequencyAxis,
        times: &TimeAxis,
    ) -> FdmtResult<()> {
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err(FdmtError::InvalidParameter(format!(
                "pulse width must be positive, got {}",
                self.width
            )));
        }
        if !self.dm.is_finite() || self.dm < 0.0 {
            return Err(FdmtError::InvalidParameter(format!(
                "pulse DM must be non-negative, got {}",
                self.dm
            )));
        }
        let expected = (times.len(), freqs.len());
        if spectrogram.dim() != expected {
            return Err(FdmtError::ShapeMismatch {
                expected,
                found: spectrogram.dim(),
            });
        }

        let span = times.len() as f64 * times.dt();
        let arrivals: Vec<f64> = relative_delays(self.dm, freqs.as_slice())
            .into_iter()
            .map(|delay| self.t0 + delay)
            .collect();
        let denom = 2.0 * self.width * self.width;
        let sample_times = times.as_slice();

        for ((t, c), value) in spectrogram.indexed_iter_mut() {
            let offset = (sample_times[t] - arrivals[c]).rem_euclid(span);
            let distance = offset.min(span - offset);
            *value += self.amplitude * (-distance * distance / denom).exp();
        }
        Ok(())
    }
}
