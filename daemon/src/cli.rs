//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "sysmon", version, about = "Sample host metrics to the terminal and a CSV log")]
pub struct Args {
    /// Seconds between samples
    #[arg(short, long, env = "SYSMON_INTERVAL")]
    pub interval: Option<f64>,

    /// Number of top CPU processes recorded per sample
    #[arg(short = 'n', long)]
    pub top: Option<usize>,

    /// CSV file to append to
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// Filesystem whose usage is reported
    #[arg(long)]
    pub disk: Option<PathBuf>,

    /// Config file (defaults to the per-user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only write the CSV, no terminal summary
    #[arg(short, long)]
    pub quiet: bool,
}
