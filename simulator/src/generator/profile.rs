use anyhow::{bail, Context};
use dmtcore::axes::{FrequencyAxis, TimeAxis};
use dmtcore::synth::DispersedPulse;
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration for generating synthetic spectrograms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub pulse: DispersedPulse,
    /// Half-width of the uniform background noise added to every cell.
    pub noise: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            pulse: DispersedPulse {
                dm: 350.0,
                t0: 0.08,
                width: 1e-3,
                amplitude: 4.5,
            },
            noise: 0.05,
            seed: 0,
        }
    }
}

/// Renders the configured pulse over `freqs` x `times` and adds noise.
pub fn build_spectrogram(
    config: &GeneratorConfig,
    freqs: &[f64],
    times: &[f64],
) -> anyhow::Result<Array2<f64>> {
    if !config.noise.is_finite() {
        bail!("noise amplitude must be finite, got {}", config.noise);
    }
    let freq_axis = FrequencyAxis::new(freqs).context("building generator frequency axis")?;
    let time_axis = TimeAxis::new(times).context("building generator time axis")?;
    let mut spectrogram = config
        .pulse
        .render(&freq_axis, &time_axis)
        .context("rendering dispersed pulse")?;

    if config.noise > 0.0 {
        let mut rng = StdRng::seed_from_u64(config.seed);
        for value in spectrogram.iter_mut() {
            *value += rng.gen_range(-config.noise..config.noise);
        }
    }

    Ok(spectrogram)
}
