//! One point-in-time measurement and its terminal rendering

use crate::collector::ProcessSample;
use chrono::{DateTime, Local};
use std::cmp::Ordering;
use std::fmt;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone)]
pub struct MetricsSample {
    pub timestamp: DateTime<Local>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub top_processes: Vec<ProcessSample>,
}

impl MetricsSample {
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Keep the `n` busiest processes, highest CPU first. Equal usage is
/// ordered by pid so rows are stable between runs.
pub fn top_by_cpu(mut processes: Vec<ProcessSample>, n: usize) -> Vec<ProcessSample> {
    processes.sort_by(|a, b| {
        b.cpu_percent
            .partial_cmp(&a.cpu_percent)
            .unwrap_or(Ordering::Equal)
            .then(a.pid.cmp(&b.pid))
    });
    processes.truncate(n);
    processes
}

impl fmt::Display for MetricsSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "-".repeat(60))?;
        writeln!(f, "Time:          {}", self.timestamp_string())?;
        writeln!(f, "CPU Usage:     {:.1}%", self.cpu_percent)?;
        writeln!(f, "Memory Usage:  {:.1}%", self.memory_percent)?;
        writeln!(f, "Disk Usage:    {:.1}%", self.disk_percent)?;
        writeln!(f, "Top processes (by CPU):")?;
        if self.top_processes.is_empty() {
            return writeln!(f, "  (No process info available)");
        }
        for p in &self.top_processes {
            writeln!(
                f,
                "  - {}[pid={}]: CPU={:.1}%, MEM={:.1}%",
                p.name, p.pid, p.cpu_percent, p.memory_percent
            )?;
        }
        Ok(())
    }
}
