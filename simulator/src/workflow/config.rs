use anyhow::Context;
use dmtcore::prelude::{Precision, TransformConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::generator::profile::GeneratorConfig;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    pub channels: usize,
    pub samples: usize,
    pub freq_lo_hz: f64,
    pub freq_hi_hz: f64,
    pub duration_s: f64,
    pub transform: TransformConfig,
    pub generator: GeneratorConfig,
    /// Optional `[lo, hi)` DM range reported as a per-sample maximum.
    pub dm_window: Option<[f64; 2]>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            channels: 1024,
            samples: 4096,
            freq_lo_hz: 1.150e9,
            freq_hi_hz: 1.650e9,
            duration_s: 1.0,
            transform: TransformConfig::default(),
            generator: GeneratorConfig::default(),
            dm_window: None,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(channels: usize, samples: usize, max_dm: f64, precision: Precision) -> Self {
        Self {
            channels,
            samples,
            transform: TransformConfig { max_dm, precision },
            ..Default::default()
        }
    }

    /// Channel centres evenly spaced from `freq_lo_hz` to `freq_hi_hz`.
    pub fn frequency_axis(&self) -> Vec<f64> {
        linspace(self.freq_lo_hz, self.freq_hi_hz, self.channels)
    }

    /// Sample times evenly spaced from zero to `duration_s`.
    pub fn time_axis(&self) -> Vec<f64> {
        linspace(0.0, self.duration_s, self.samples)
    }
}

fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + i as f64 * step).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_sets_transform() {
        let cfg = WorkflowConfig::from_args(256, 2048, 512.0, Precision::Double);
        assert_eq!(cfg.transform.max_dm, 512.0);
        assert_eq!(cfg.transform.precision, Precision::Double);
        assert_eq!(cfg.frequency_axis().len(), 256);
        assert_eq!(cfg.time_axis().len(), 2048);
    }

    #[test]
    fn axes_span_configured_ranges() {
        let cfg = WorkflowConfig::from_args(8, 5, 100.0, Precision::Single);
        let freqs = cfg.frequency_axis();
        assert_eq!(freqs[0], 1.150e9);
        assert!((freqs[7] - 1.650e9).abs() < 1e-3);
        assert_eq!(cfg.time_axis(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"channels: 64\nsamples: 512\ntransform:\n  max_dm: 300.0\n  precision: double\ngenerator:\n  noise: 0.0\n  pulse:\n    dm: 120.0\ndm_window: [100.0, 150.0]\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.channels, 64);
        assert_eq!(cfg.transform.precision, Precision::Double);
        assert_eq!(cfg.generator.pulse.dm, 120.0);
        assert_eq!(cfg.generator.pulse.width, 2.12e-3);
        assert_eq!(cfg.dm_window, Some([100.0, 150.0]));
        assert_eq!(cfg.freq_lo_hz, 1.150e9);
    }

    #[test]
    fn config_load_reports_missing_file() {
        let err = WorkflowConfig::load("/nonexistent/workflow.yaml").unwrap_err();
        assert!(format!("{:#}", err).contains("reading workflow config"));
    }
}
