use std::f64::consts::PI;

use ndarray::{Array2, ArrayView2, ShapeBuilder};
use num_complex::{Complex, Complex64};

use crate::axes::{FrequencyAxis, TimeAxis};
use crate::math::fft::{rfft_frequencies, SpectralAdapter};
use crate::math::sample::Sample;
use crate::prelude::{FdmtError, FdmtResult};

/// Cold-plasma dispersion constant in s·Hz²/(pc·cm⁻³).
pub const DM_CONST: f64 = 4140e12;

/// Arrival delay in seconds of a pulse at `freq` Hz behind dispersion measure `dm`.
pub fn delay(dm: f64, freq: f64) -> f64 {
    if dm == 0.0 {
        return 0.0;
    }
    DM_CONST * dm / (freq * freq)
}

pub fn delays(dm: f64, freqs: &[f64]) -> Vec<f64> {
    freqs.iter().map(|&freq| delay(dm, freq)).collect()
}

/// Delays shifted so the last channel of `freqs` sits at zero.
pub fn relative_delays(dm: f64, freqs: &[f64]) -> Vec<f64> {
    let reference = freqs.last().map_or(0.0, |&freq| delay(dm, freq));
    freqs
        .iter()
        .map(|&freq| delay(dm, freq) - reference)
        .collect()
}

/// Column-major (bins, channels) matrix of `exp(2πi ν delay_c)`.
///
/// Returns `None` as soon as a phase argument is not finite.
pub(crate) fn phase_matrix<T: Sample>(
    fourier_freqs: &[f64],
    delays: &[f64],
) -> Option<Array2<Complex<T>>> {
    let mut values = Vec::with_capacity(fourier_freqs.len() * delays.len());
    for &delay in delays {
        for &nu in fourier_freqs {
            let arg = 2.0 * PI * nu * delay;
            if !arg.is_finite() {
                return None;
            }
            let phase = Complex64::from_polar(1.0, arg);
            values.push(Complex::new(T::narrow(phase.re), T::narrow(phase.im)));
        }
    }
    Array2::from_shape_vec((fourier_freqs.len(), delays.len()).f(), values).ok()
}

/// Brute-force dedispersion of an (M, N) spectrogram at a single DM.
///
/// Every channel is advanced by its delay relative to the last channel with a
/// Fourier-domain phase ramp, so a pulse at `dm` lines up at its arrival time
/// in the reference channel. Shifts are circular over the observation span.
pub fn dedisperse<T: Sample>(
    spectrogram: ArrayView2<f64>,
    dm: f64,
    freqs: &FrequencyAxis,
    times: &TimeAxis,
) -> FdmtResult<Array2<f64>> {
    if !dm.is_finite() || dm < 0.0 {
        return Err(FdmtError::InvalidParameter(format!(
            "DM must be non-negative and finite, got {}",
            dm
        )));
    }
    let expected = (times.len(), freqs.len());
    if spectrogram.dim() != expected {
        return Err(FdmtError::ShapeMismatch {
            expected,
            found: spectrogram.dim(),
        });
    }

    let shifts = relative_delays(dm, freqs.as_slice());
    if let Some(idx) = shifts.iter().position(|d| !d.is_finite()) {
        return Err(FdmtError::NumericOverflow(format!(
            "delay for channel {} (freq {} Hz) is not finite",
            idx,
            freqs.as_slice()[idx]
        )));
    }
    let fourier_freqs = rfft_frequencies(times.len(), times.dt());
    let phases = phase_matrix::<T>(&fourier_freqs, &shifts)
        .ok_or_else(|| FdmtError::NumericOverflow("phase argument is not finite".into()))?;

    let adapter = SpectralAdapter::<T>::new(times.len());
    let mut spectrum = adapter.forward(spectrogram)?;
    spectrum.zip_mut_with(&phases, |value, phase| *value = *value * *phase);
    let aligned = adapter.inverse(spectrum.view())?;
    Ok(aligned.as_standard_layout().into_owned())
}
