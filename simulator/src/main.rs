use anyhow::Context;
use clap::Parser;
use dmtcore::prelude::Precision;
use log::info;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use workflow::config::WorkflowConfig;
use workflow::runner::{Runner, WorkflowResult};

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Offline driver for the fast dispersion-measure transform")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value_t = 1024)]
    channels: usize,
    #[arg(long, default_value_t = 4096)]
    samples: usize,
    #[arg(long, default_value_t = 500.0)]
    max_dm: f64,
    /// Arithmetic width of the transform: single or double
    #[arg(long, default_value = "single", value_parser = parse_precision)]
    precision: Precision,
    /// DM of the injected pulse
    #[arg(long)]
    dm: Option<f64>,
    /// Arrival time of the injected pulse at the top of the band
    #[arg(long)]
    t0: Option<f64>,
    /// Gaussian width (seconds) of the injected pulse
    #[arg(long)]
    width: Option<f64>,
    #[arg(long)]
    noise: Option<f64>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Number of spectrograms to run through the same transform
    #[arg(long, default_value_t = 1)]
    repeat: u64,
    /// Write a JSON report of every run
    #[arg(long)]
    report: Option<PathBuf>,
}

fn parse_precision(value: &str) -> Result<Precision, String> {
    match value.to_ascii_lowercase().as_str() {
        "single" | "f32" => Ok(Precision::Single),
        "double" | "f64" => Ok(Precision::Double),
        other => Err(format!("unknown precision '{}'", other)),
    }
}

#[derive(Serialize)]
struct Report<'a> {
    config: &'a WorkflowConfig,
    precision: Precision,
    runs: Vec<WorkflowResult>,
}

fn resolve_workflow(args: &Args) -> anyhow::Result<WorkflowConfig> {
    if let Some(path) = &args.workflow {
        return WorkflowConfig::load(path);
    }
    let mut config =
        WorkflowConfig::from_args(args.channels, args.samples, args.max_dm, args.precision);
    if let Some(dm) = args.dm {
        config.generator.pulse.dm = dm;
    }
    if let Some(t0) = args.t0 {
        config.generator.pulse.t0 = t0;
    }
    if let Some(width) = args.width {
        config.generator.pulse.width = width;
    }
    if let Some(noise) = args.noise {
        config.generator.noise = noise;
    }
    Ok(config)
}

/// Seeds for `repeat` runs starting at `start`, wrapping at `u64::MAX`.
fn run_seeds(start: u64, repeat: u64) -> impl Iterator<Item = u64> {
    (0..repeat.max(1)).map(move |offset| start.wrapping_add(offset))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = resolve_workflow(&args)?;

    info!(
        "building transform: {} channels x {} samples, max DM {}",
        workflow_config.channels, workflow_config.samples, workflow_config.transform.max_dm
    );
    let runner = Runner::new(workflow_config.clone())?;

    let mut runs = Vec::new();
    for seed in run_seeds(args.seed, args.repeat) {
        let result = runner
            .execute(seed)
            .with_context(|| format!("running workflow with seed {}", seed))?;
        match result.candidate {
            Some(peak) => println!(
                "seed {} -> peak t={:.5} s, DM={:.2}, power={:.3}, {:.1}x rms",
                seed, peak.time_s, peak.dm, peak.power, result.peak_to_rms
            ),
            None => println!("seed {} -> no finite peak", seed),
        }
        runs.push(result);
    }

    let metrics = runner.transform().metrics();
    println!(
        "transforms={} failures={} busy={:.3}s",
        metrics.processed, metrics.errors, metrics.busy_seconds
    );

    if let Some(report_path) = args.report {
        let report = Report {
            config: &workflow_config,
            precision: runner.precision(),
            runs,
        };
        if let Some(parent) = report_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&report).context("serializing report")?;
        fs::write(&report_path, json)
            .with_context(|| format!("writing report {}", report_path.display()))?;
    }

    Ok(())
}
