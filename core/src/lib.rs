//! Fast dispersion-measure transform (FDMT) for transient radio searches.
//!
//! A (time, frequency) power spectrogram is moved into the Fourier domain
//! along time, merged channel pair by channel pair under a cached set of
//! per-stage phase corrections, and brought back as a (time, trial DM)
//! matrix. The phase cache depends only on the axes and the maximum DM, so
//! one [`Fdmt`] serves every spectrogram recorded with the same setup.

pub mod axes;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod synth;
pub mod telemetry;

pub use prelude::{DmTransform, FdmtError, FdmtResult, Precision, TransformConfig};
pub use processing::{build_transform, Fdmt};
