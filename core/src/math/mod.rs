pub mod dispersion;
pub mod fft;
pub mod sample;
pub mod stats;

pub use dispersion::dedisperse;
pub use fft::SpectralAdapter;
pub use sample::Sample;
pub use stats::StatsHelper;
