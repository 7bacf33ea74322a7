//! Fixed-interval sampling loop

use crate::collector::MetricsProvider;
use crate::csv_log::CsvLog;
use crate::error::MetricsError;
use crate::sample::{top_by_cpu, MetricsSample};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Logged,
    Skipped,
}

type Clock = Box<dyn Fn() -> DateTime<Local> + Send>;

pub struct Sampler<P> {
    provider: P,
    log: Arc<CsvLog>,
    top_n: usize,
    quiet: bool,
    clock: Clock,
}

impl<P: MetricsProvider> Sampler<P> {
    pub fn new(provider: P, log: Arc<CsvLog>, top_n: usize) -> Self {
        Self {
            provider,
            log,
            top_n,
            quiet: false,
            clock: Box::new(Local::now),
        }
    }

    /// Suppress the terminal summary.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Source of sample timestamps; wall clock by default.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Local> + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn log(&self) -> &Arc<CsvLog> {
        &self.log
    }

    /// Read every counter once and build a sample.
    pub fn sample(&mut self) -> Result<MetricsSample, MetricsError> {
        let timestamp = (self.clock)();
        let cpu_percent = self.provider.cpu_percent()?;
        let memory_percent = self.provider.memory_percent()?;
        let disk_percent = self.provider.disk_percent()?;
        let processes = self.provider.processes()?;
        Ok(MetricsSample {
            timestamp,
            cpu_percent,
            memory_percent,
            disk_percent,
            top_processes: top_by_cpu(processes, self.top_n),
        })
    }

    /// One Sampling -> Writing pass. Failures are reported and the tick is
    /// skipped; nothing propagates to the loop.
    pub fn tick(&mut self) -> TickOutcome {
        let sample = match self.sample() {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Skipping sample: {}", e);
                return TickOutcome::Skipped;
            }
        };
        if !self.quiet {
            print!("{sample}");
        }
        match self.log.append(&sample) {
            Ok(()) => {
                debug!(timestamp = %sample.timestamp_string(), "row appended");
                TickOutcome::Logged
            }
            Err(e) => {
                error!("Failed to append to {:?}: {}", self.log.path(), e);
                TickOutcome::Skipped
            }
        }
    }
}

/// Tick every `interval` until `shutdown` turns true or its sender is
/// dropped. A tick in progress always completes before the loop exits.
/// Returns the number of rows written.
pub async fn run<P: MetricsProvider>(
    mut sampler: Sampler<P>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut rows = 0u64;

    info!(
        "Sampling every {:?}, logging top {} processes to {:?}",
        interval,
        sampler.log().top_n(),
        sampler.log().path()
    );

    loop {
        let stop = *shutdown.borrow();
        if stop {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {
                if sampler.tick() == TickOutcome::Logged {
                    rows += 1;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("Sampler stopped after {} rows", rows);
    rows
}
