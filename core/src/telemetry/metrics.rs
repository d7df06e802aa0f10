use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Default)]
struct Metrics {
    processed: usize,
    errors: usize,
    busy: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub processed: usize,
    pub errors: usize,
    pub busy_seconds: f64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_processed(&self, elapsed: Duration) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.processed += 1;
            metrics.busy += elapsed;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.errors += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            MetricsSnapshot {
                processed: metrics.processed,
                errors: metrics.errors,
                busy_seconds: metrics.busy.as_secs_f64(),
            }
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
