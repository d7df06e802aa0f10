use rustfft::num_traits::Float;
use rustfft::FftNum;

use crate::prelude::Precision;

/// Real scalar the transform can run in.
pub trait Sample: FftNum + Float {
    const PRECISION: Precision;

    /// Converts an f64 into this precision, rounding if needed.
    fn narrow(value: f64) -> Self;
    fn widen(self) -> f64;
}

impl Sample for f32 {
    const PRECISION: Precision = Precision::Single;

    fn narrow(value: f64) -> Self {
        value as f32
    }

    fn widen(self) -> f64 {
        f64::from(self)
    }
}

impl Sample for f64 {
    const PRECISION: Precision = Precision::Double;

    fn narrow(value: f64) -> Self {
        value
    }

    fn widen(self) -> f64 {
        self
    }
}
