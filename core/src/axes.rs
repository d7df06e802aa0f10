//! Validated observation axes and the trial-DM axis of the transform output.

use crate::prelude::{FdmtError, FdmtResult};

const SPACING_TOLERANCE: f64 = 1e-6;

/// Channel centre frequencies in Hz. Length is a power of two.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyAxis {
    freqs: Vec<f64>,
}

impl FrequencyAxis {
    pub fn new(freqs: &[f64]) -> FdmtResult<Self> {
        if freqs.is_empty() {
            return Err(FdmtError::InvalidAxis("frequency axis is empty".into()));
        }
        if !freqs.len().is_power_of_two() {
            return Err(FdmtError::InvalidAxis(format!(
                "frequency axis length {} is not a power of two",
                freqs.len()
            )));
        }
        if let Some(idx) = freqs.iter().position(|f| !f.is_finite()) {
            return Err(FdmtError::InvalidAxis(format!(
                "frequency {} is not finite",
                idx
            )));
        }
        if freqs.len() > 1 {
            let ascending = freqs[1] > freqs[0];
            let monotonic = freqs
                .windows(2)
                .all(|pair| if ascending { pair[1] > pair[0] } else { pair[1] < pair[0] });
            if !monotonic {
                return Err(FdmtError::InvalidAxis(
                    "frequency axis is not strictly monotonic".into(),
                ));
            }
        }
        Ok(Self {
            freqs: freqs.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.freqs
    }

    /// Number of binary merge stages, `log2(N)`.
    pub fn log2_len(&self) -> usize {
        self.freqs.len().trailing_zeros() as usize
    }
}

/// Uniformly spaced sample times in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    times: Vec<f64>,
    dt: f64,
}

impl TimeAxis {
    pub fn new(times: &[f64]) -> FdmtResult<Self> {
        if times.len() < 2 {
            return Err(FdmtError::InvalidAxis(format!(
                "time axis needs at least 2 samples, got {}",
                times.len()
            )));
        }
        let dt = times[1] - times[0];
        if !dt.is_finite() || dt <= 0.0 {
            return Err(FdmtError::InvalidAxis(format!(
                "time spacing {} is not a positive finite value",
                dt
            )));
        }
        let tolerance = dt * SPACING_TOLERANCE;
        for (idx, pair) in times.windows(2).enumerate() {
            let spacing = pair[1] - pair[0];
            if !spacing.is_finite() || (spacing - dt).abs() > tolerance {
                return Err(FdmtError::InvalidAxis(format!(
                    "time spacing at sample {} is {}, expected {}",
                    idx + 1,
                    spacing,
                    dt
                )));
            }
        }
        Ok(Self {
            times: times.to_vec(),
            dt,
        })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.times
    }
}

/// Trial DM of each output column: `j * max_dm / n` for `j` in `0..n`.
#[derive(Debug, Clone, PartialEq)]
pub struct DmAxis {
    values: Vec<f64>,
    max_dm: f64,
}

impl DmAxis {
    pub fn linear(max_dm: f64, n: usize) -> Self {
        let step = max_dm / n as f64;
        let values = (0..n).map(|j| j as f64 * step).collect();
        Self { values, max_dm }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn max_dm(&self) -> f64 {
        self.max_dm
    }

    /// Spacing between adjacent columns.
    pub fn resolution(&self) -> f64 {
        self.max_dm / self.values.len() as f64
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
