//! Host metrics sampler: periodic CPU, memory, disk and top-process
//! readings, printed and appended to a CSV log.

pub mod cli;
pub mod collector;
pub mod config;
pub mod csv_log;
pub mod error;
pub mod sample;
pub mod sampler;
