//! Deterministic metrics provider for tests
#![allow(dead_code)]

use std::collections::VecDeque;
use sysmon_daemon::collector::{MetricsProvider, ProcessSample};
use sysmon_daemon::error::MetricsError;

pub struct FakeProvider {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub processes: Vec<ProcessSample>,
    /// One entry per sample; `true` makes that sample's CPU read fail.
    pub failures: VecDeque<bool>,
}

impl FakeProvider {
    pub fn new(processes: Vec<ProcessSample>) -> Self {
        Self {
            cpu: 12.5,
            memory: 40.25,
            disk: 71.0,
            processes,
            failures: VecDeque::new(),
        }
    }
}

impl MetricsProvider for FakeProvider {
    fn cpu_percent(&mut self) -> Result<f64, MetricsError> {
        if self.failures.pop_front().unwrap_or(false) {
            return Err(MetricsError::Parse {
                what: "/proc/stat",
                reason: "injected failure".to_string(),
            });
        }
        Ok(self.cpu)
    }

    fn memory_percent(&mut self) -> Result<f64, MetricsError> {
        Ok(self.memory)
    }

    fn disk_percent(&mut self) -> Result<f64, MetricsError> {
        Ok(self.disk)
    }

    fn processes(&mut self) -> Result<Vec<ProcessSample>, MetricsError> {
        Ok(self.processes.clone())
    }
}

pub fn process(pid: u32, name: &str, cpu_percent: f64) -> ProcessSample {
    ProcessSample {
        pid,
        name: name.to_string(),
        cpu_percent,
        memory_percent: 1.0,
    }
}

pub fn read_records(path: &std::path::Path) -> Vec<csv::StringRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader.records().map(|r| r.unwrap()).collect()
}
