use crate::generator::profile::build_spectrogram;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use dmtcore::math::StatsHelper;
use dmtcore::prelude::{DmTransform, Precision};
use dmtcore::processing::{build_transform, find_peak, max_over_dm_range, Candidate};
use log::info;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub seed: u64,
    pub candidate: Option<Candidate>,
    /// Peak power over the RMS of the whole DM-time matrix.
    pub peak_to_rms: f64,
    pub window_peak: Option<f64>,
}

/// Owns one transform and reuses its phase cache for every spectrogram.
pub struct Runner {
    config: WorkflowConfig,
    freqs: Vec<f64>,
    times: Vec<f64>,
    transform: Box<dyn DmTransform>,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> anyhow::Result<Self> {
        let freqs = config.frequency_axis();
        let times = config.time_axis();
        let transform = build_transform(&freqs, &times, &config.transform)
            .context("building dispersion-measure transform")?;
        Ok(Self {
            config,
            freqs,
            times,
            transform,
        })
    }

    pub fn precision(&self) -> Precision {
        self.transform.precision()
    }

    pub fn transform(&self) -> &dyn DmTransform {
        self.transform.as_ref()
    }

    /// Synthesizes a spectrogram with `seed` and searches its transform.
    pub fn execute(&self, seed: u64) -> anyhow::Result<WorkflowResult> {
        let mut generator = self.config.generator.clone();
        generator.seed = seed;
        let spectrogram = build_spectrogram(&generator, &self.freqs, &self.times)
            .context("generating spectrogram")?;

        let result = self
            .transform
            .apply(spectrogram.view())
            .context("applying dispersion-measure transform")?;

        let dm_axis = self.transform.dm_axis();
        let candidate =
            find_peak(result.view(), &self.times, dm_axis).context("searching DM-time matrix")?;
        let rms = match result.as_slice() {
            Some(values) => StatsHelper::rms(values),
            None => StatsHelper::rms(&result.iter().copied().collect::<Vec<_>>()),
        };
        let peak_to_rms = match candidate {
            Some(peak) if rms > 0.0 => peak.power / rms,
            _ => 0.0,
        };

        let window_peak = match self.config.dm_window {
            Some([lo, hi]) => {
                let series = max_over_dm_range(result.view(), dm_axis, lo, hi)
                    .context("scanning DM window")?;
                series.into_iter().filter(|v| v.is_finite()).reduce(f64::max)
            }
            None => None,
        };

        if let Some(peak) = candidate {
            info!(
                "seed {} -> peak at t={:.5} s DM={:.2} power {:.3} ({:.1}x rms)",
                seed, peak.time_s, peak.dm, peak.power, peak_to_rms
            );
        }

        Ok(WorkflowResult {
            seed,
            candidate,
            peak_to_rms,
            window_peak,
        })
    }
}
