//! OS metrics provider interface (Linux implementation reads /proc)

mod linux;

pub use linux::LinuxMetricsProvider;

use crate::error::MetricsError;

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Query interface the sampler depends on. Each call reads the counters
/// once; percentages that need a delta are measured since the previous call.
pub trait MetricsProvider: Send {
    fn cpu_percent(&mut self) -> Result<f64, MetricsError>;
    fn memory_percent(&mut self) -> Result<f64, MetricsError>;
    fn disk_percent(&mut self) -> Result<f64, MetricsError>;
    fn processes(&mut self) -> Result<Vec<ProcessSample>, MetricsError>;
}
