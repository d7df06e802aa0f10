use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::axes::DmAxis;
use crate::telemetry::metrics::MetricsSnapshot;

/// Arithmetic width used for the frequency-domain buffers and phase cache.
///
/// `Single` halves memory and roughly doubles throughput, at the cost of
/// phase error that accumulates with the number of butterfly stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Single,
    Double,
}

/// Parameters shared by every transform built over one axis pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransformConfig {
    pub max_dm: f64,
    pub precision: Precision,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_dm: 500.0,
            precision: Precision::Single,
        }
    }
}

/// Common error type for axis validation, cache construction and transforms.
#[derive(thiserror::Error, Debug)]
pub enum FdmtError {
    #[error("invalid axis: {0}")]
    InvalidAxis(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("numeric overflow: {0}")]
    NumericOverflow(String),
    #[error("fft failure: {0}")]
    Fft(#[from] realfft::FftError),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type FdmtResult<T> = Result<T, FdmtError>;

/// Object-safe view of a built transform, independent of its precision.
pub trait DmTransform: Send + Sync {
    /// Maps an (M, N) spectrogram to an (M, N) DM-time matrix.
    fn apply(&self, spectrogram: ArrayView2<f64>) -> FdmtResult<Array2<f64>>;
    fn dm_axis(&self) -> &DmAxis;
    fn precision(&self) -> Precision;
    fn metrics(&self) -> MetricsSnapshot;
}
