use ndarray::{Array2, ArrayView2};
use num_complex::Complex;

use crate::axes::{FrequencyAxis, TimeAxis};
use crate::math::dispersion::{phase_matrix, relative_delays};
use crate::math::fft::rfft_frequencies;
use crate::math::sample::Sample;
use crate::prelude::{FdmtError, FdmtResult};

/// Per-stage phase corrections, built once and read by every transform.
///
/// Stage `i` (1-based) holds a (bins, channels) matrix whose column `c` is
/// `exp(2πi ν delay_c)`, where `delay_c` is the delay of working channel `c`
/// at DM `max_dm / 2^i`, relative to the last working channel. The working
/// frequency axis is halved by pairwise averaging after every stage.
///
/// Matrices are stored column-major so each channel's correction is a
/// contiguous slice matching the spectrum layout.
#[derive(Debug, Clone)]
pub struct PhaseCache<T: Sample> {
    stages: Vec<Array2<Complex<T>>>,
    fourier_freqs: Vec<f64>,
}

impl<T: Sample> PhaseCache<T> {
    pub fn build(freqs: &FrequencyAxis, times: &TimeAxis, max_dm: f64) -> FdmtResult<Self> {
        if !max_dm.is_finite() || max_dm <= 0.0 {
            return Err(FdmtError::InvalidParameter(format!(
                "max DM must be positive and finite, got {}",
                max_dm
            )));
        }

        let fourier_freqs = rfft_frequencies(times.len(), times.dt());
        let stage_count = freqs.log2_len().saturating_sub(1);
        let mut working = freqs.as_slice().to_vec();
        let mut stages = Vec::with_capacity(stage_count);

        for stage in 1..=stage_count {
            let budget = max_dm / f64::from(1u32 << stage);
            let delays = relative_delays(budget, &working);
            if let Some(idx) = delays.iter().position(|d| !d.is_finite()) {
                return Err(FdmtError::NumericOverflow(format!(
                    "stage {} delay for working channel {} (freq {} Hz) is not finite",
                    stage, idx, working[idx]
                )));
            }

            let matrix = phase_matrix::<T>(&fourier_freqs, &delays).ok_or_else(|| {
                FdmtError::NumericOverflow(format!("stage {} phase argument is not finite", stage))
            })?;
            stages.push(matrix);

            working = working
                .chunks_exact(2)
                .map(|pair| (pair[0] + pair[1]) / 2.0)
                .collect();
        }

        Ok(Self {
            stages,
            fourier_freqs,
        })
    }

    /// Number of butterfly stages, `log2(N) - 1` (zero for N <= 2).
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stage `i` matrix shaped (bins, channels); `i` runs from 1.
    pub fn stage(&self, stage: usize) -> Option<ArrayView2<'_, Complex<T>>> {
        stage
            .checked_sub(1)
            .and_then(|idx| self.stages.get(idx))
            .map(|matrix| matrix.view())
    }

    /// Stage `i` in memory order: channel-major runs of `bins` values.
    pub(crate) fn stage_slice(&self, stage: usize) -> Option<&[Complex<T>]> {
        stage
            .checked_sub(1)
            .and_then(|idx| self.stages.get(idx))
            .and_then(|matrix| matrix.as_slice_memory_order())
    }

    pub fn fourier_freqs(&self) -> &[f64] {
        &self.fourier_freqs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;
    use std::f64::consts::PI;

    fn axes(channels: usize, samples: usize) -> (FrequencyAxis, TimeAxis) {
        let df = 0.5e9 / (channels - 1).max(1) as f64;
        let freqs: Vec<f64> = (0..channels).map(|c| 1.15e9 + c as f64 * df).collect();
        let times: Vec<f64> = (0..samples).map(|t| t as f64 * 1e-3).collect();
        (
            FrequencyAxis::new(&freqs).unwrap(),
            TimeAxis::new(&times).unwrap(),
        )
    }

    #[test]
    fn stage_shapes_halve_channel_count() {
        let (freqs, times) = axes(16, 32);
        let cache = PhaseCache::<f64>::build(&freqs, &times, 500.0).unwrap();
        assert_eq!(cache.stage_count(), 3);
        assert_eq!(cache.stage(1).unwrap().dim(), (17, 16));
        assert_eq!(cache.stage(2).unwrap().dim(), (17, 8));
        assert_eq!(cache.stage(3).unwrap().dim(), (17, 4));
        assert!(cache.stage(0).is_none());
        assert!(cache.stage(4).is_none());
    }

    #[test]
    fn reference_channel_and_dc_bin_are_unshifted() {
        let (freqs, times) = axes(8, 16);
        let cache = PhaseCache::<f64>::build(&freqs, &times, 500.0).unwrap();
        for stage in 1..=cache.stage_count() {
            let matrix = cache.stage(stage).unwrap();
            let last = matrix.ncols() - 1;
            for value in matrix.column(last) {
                assert!((value.re - 1.0).abs() < 1e-12 && value.im.abs() < 1e-12);
            }
            for value in matrix.row(0) {
                assert!((value.re - 1.0).abs() < 1e-12 && value.im.abs() < 1e-12);
            }
        }
    }

    #[test]
    fn phases_have_unit_magnitude() {
        let (freqs, times) = axes(32, 64);
        let cache = PhaseCache::<f32>::build(&freqs, &times, 800.0).unwrap();
        let matrix = cache.stage(2).unwrap();
        assert!(matrix.iter().all(|v| (v.norm() - 1.0).abs() < 1e-5));
    }

    #[test]
    fn first_stage_matches_half_max_dm_delay() {
        let (freqs, times) = axes(4, 8);
        let cache = PhaseCache::<f64>::build(&freqs, &times, 100.0).unwrap();
        let matrix = cache.stage(1).unwrap();
        let delays = relative_delays(50.0, freqs.as_slice());
        let nu = cache.fourier_freqs()[1];
        let expected = Complex64::from_polar(1.0, 2.0 * PI * nu * delays[0]);
        assert!((matrix[[1, 0]] - expected).norm() < 1e-12);
    }

    #[test]
    fn two_channels_need_no_stages() {
        let (freqs, times) = axes(2, 8);
        let cache = PhaseCache::<f64>::build(&freqs, &times, 100.0).unwrap();
        assert_eq!(cache.stage_count(), 0);
    }

    #[test]
    fn rejects_non_positive_max_dm() {
        let (freqs, times) = axes(8, 8);
        for max_dm in [0.0, -10.0, f64::NAN] {
            let err = PhaseCache::<f64>::build(&freqs, &times, max_dm).unwrap_err();
            assert!(matches!(err, FdmtError::InvalidParameter(_)));
        }
    }

    #[test]
    fn zero_frequency_channel_overflows() {
        let freqs = FrequencyAxis::new(&[0.0, 1.0e9, 2.0e9, 3.0e9]).unwrap();
        let times = TimeAxis::new(&[0.0, 1.0, 2.0, 3.0]).unwrap();
        let err = PhaseCache::<f64>::build(&freqs, &times, 100.0).unwrap_err();
        assert!(matches!(err, FdmtError::NumericOverflow(_)));
    }
}
