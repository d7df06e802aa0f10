use std::sync::Arc;

use ndarray::{Array2, ArrayView2, ShapeBuilder};
use num_complex::Complex;
use rayon::prelude::*;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::math::sample::Sample;
use crate::prelude::{FdmtError, FdmtResult};

/// Real-FFT pair along the time axis of a (time, channel) matrix.
///
/// Spectra are returned in column-major layout so that every channel is one
/// contiguous run of `bins()` values. Channels are transformed in parallel,
/// each worker holding its own scratch buffers.
pub struct SpectralAdapter<T: Sample> {
    len: usize,
    forward_r2c: Arc<dyn RealToComplex<T>>,
    inverse_c2r: Arc<dyn ComplexToReal<T>>,
}

impl<T: Sample> SpectralAdapter<T> {
    pub fn new(len: usize) -> Self {
        let mut planner = RealFftPlanner::<T>::new();
        let forward_r2c = planner.plan_fft_forward(len);
        let inverse_c2r = planner.plan_fft_inverse(len);
        Self {
            len,
            forward_r2c,
            inverse_c2r,
        }
    }

    /// Number of time samples.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of non-negative frequency bins, `len / 2 + 1`.
    pub fn bins(&self) -> usize {
        self.len / 2 + 1
    }

    /// (M, N) real spectrogram to (bins, N) spectrum.
    pub fn forward(&self, spectrogram: ArrayView2<f64>) -> FdmtResult<Array2<Complex<T>>> {
        let (rows, cols) = spectrogram.dim();
        if rows != self.len {
            return Err(FdmtError::ShapeMismatch {
                expected: (self.len, cols),
                found: (rows, cols),
            });
        }

        let columns = (0..cols)
            .into_par_iter()
            .map_init(
                || {
                    (
                        self.forward_r2c.make_input_vec(),
                        self.forward_r2c.make_scratch_vec(),
                    )
                },
                |(input, scratch), channel| -> FdmtResult<Vec<Complex<T>>> {
                    for (dst, &src) in input.iter_mut().zip(spectrogram.column(channel)) {
                        *dst = T::narrow(src);
                    }
                    let mut output = self.forward_r2c.make_output_vec();
                    self.forward_r2c
                        .process_with_scratch(input, &mut output, scratch)?;
                    Ok(output)
                },
            )
            .collect::<FdmtResult<Vec<_>>>()?;

        let flat: Vec<Complex<T>> = columns.into_iter().flatten().collect();
        Array2::from_shape_vec((self.bins(), cols).f(), flat)
            .map_err(|err| FdmtError::Internal(format!("assembling spectrum: {}", err)))
    }

    /// (bins, C) spectrum back to (M, C) real samples, normalized by 1/M.
    ///
    /// The imaginary parts of the DC bin and, for even M, the Nyquist bin
    /// carry no information for a real signal and are dropped.
    pub fn inverse(&self, spectrum: ArrayView2<Complex<T>>) -> FdmtResult<Array2<f64>> {
        let (bins, cols) = spectrum.dim();
        if bins != self.bins() {
            return Err(FdmtError::ShapeMismatch {
                expected: (self.bins(), cols),
                found: (bins, cols),
            });
        }

        let scale = 1.0 / self.len as f64;
        let has_nyquist = self.len % 2 == 0;
        let columns = (0..cols)
            .into_par_iter()
            .map_init(
                || {
                    (
                        self.inverse_c2r.make_input_vec(),
                        self.inverse_c2r.make_output_vec(),
                        self.inverse_c2r.make_scratch_vec(),
                    )
                },
                |(input, output, scratch), channel| -> FdmtResult<Vec<f64>> {
                    for (dst, &src) in input.iter_mut().zip(spectrum.column(channel)) {
                        *dst = src;
                    }
                    input[0].im = T::zero();
                    if has_nyquist {
                        if let Some(last) = input.last_mut() {
                            last.im = T::zero();
                        }
                    }
                    self.inverse_c2r
                        .process_with_scratch(input, output, scratch)?;
                    Ok(output.iter().map(|&v| v.widen() * scale).collect())
                },
            )
            .collect::<FdmtResult<Vec<_>>>()?;

        let flat: Vec<f64> = columns.into_iter().flatten().collect();
        Array2::from_shape_vec((self.len, cols).f(), flat)
            .map_err(|err| FdmtError::Internal(format!("assembling time series: {}", err)))
    }
}

/// Frequencies (Hz) of the real-FFT bins for `len` samples spaced `dt` apart.
pub fn rfft_frequencies(len: usize, dt: f64) -> Vec<f64> {
    let span = len as f64 * dt;
    (0..=len / 2).map(|k| k as f64 / span).collect()
}
