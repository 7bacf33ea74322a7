use super::{MetricsProvider, ProcessSample};
use crate::error::MetricsError;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use sysinfo::Disks;
use tracing::debug;

#[derive(Clone, Copy)]
struct CpuSample {
    total_ticks: u64, // utime + stime
    timestamp: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct CpuTimes {
    busy: u64,
    total: u64,
}

pub struct LinuxMetricsProvider {
    proc_root: PathBuf,
    disk_path: PathBuf,
    disks: Disks,
    page_size: u64,
    clock_ticks: u64,
    mem_total_kb: u64,
    last_cpu: CpuTimes,
    cpu_samples: HashMap<u32, CpuSample>,
}

impl LinuxMetricsProvider {
    pub fn new(disk_path: impl Into<PathBuf>) -> Self {
        Self::with_proc_root("/proc", disk_path)
    }

    /// Read counters from an alternate procfs mount.
    pub fn with_proc_root(proc_root: impl Into<PathBuf>, disk_path: impl Into<PathBuf>) -> Self {
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) }.max(1) as u64;
        let clock_ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) }.max(1) as u64;
        let mut provider = Self {
            proc_root: proc_root.into(),
            disk_path: disk_path.into(),
            disks: Disks::new_with_refreshed_list(),
            page_size,
            clock_ticks,
            mem_total_kb: 0,
            last_cpu: CpuTimes::default(),
            cpu_samples: HashMap::new(),
        };
        if let Ok(mem) = provider.read_meminfo() {
            provider.mem_total_kb = mem.total_kb;
        }
        // Baseline so the first reading covers the time since startup
        if let Ok(times) = provider.read_cpu_times() {
            provider.last_cpu = times;
        }
        provider
    }

    fn read(&self, rel: impl AsRef<Path>) -> Result<String, MetricsError> {
        let path = self.proc_root.join(rel);
        fs::read_to_string(&path).map_err(|source| MetricsError::Read { path, source })
    }

    fn read_cpu_times(&self) -> Result<CpuTimes, MetricsError> {
        parse_cpu_times(&self.read("stat")?)
    }

    fn read_meminfo(&self) -> Result<MemInfo, MetricsError> {
        parse_meminfo(&self.read("meminfo")?)
    }

    fn parse_process(&mut self, pid: u32, now: Instant) -> Option<ProcessSample> {
        let content = fs::read_to_string(self.proc_root.join(pid.to_string()).join("stat")).ok()?;
        let stat = parse_pid_stat(&content)?;

        let total_ticks = stat.utime + stat.stime;
        let cpu_percent = match self.cpu_samples.get(&pid) {
            Some(prev) => {
                let tick_delta = total_ticks.saturating_sub(prev.total_ticks);
                let time_delta = now.duration_since(prev.timestamp).as_secs_f64();
                if time_delta > 0.0 {
                    let cpu_seconds = tick_delta as f64 / self.clock_ticks as f64;
                    (cpu_seconds / time_delta) * 100.0
                } else {
                    0.0
                }
            }
            None => 0.0, // first sighting, no baseline yet
        };
        self.cpu_samples.insert(pid, CpuSample { total_ticks, timestamp: now });

        let memory_percent = if self.mem_total_kb > 0 {
            let rss_bytes = stat.rss_pages * self.page_size;
            rss_bytes as f64 / (self.mem_total_kb * 1024) as f64 * 100.0
        } else {
            0.0
        };

        Some(ProcessSample {
            pid,
            name: stat.name,
            cpu_percent,
            memory_percent,
        })
    }
}

impl MetricsProvider for LinuxMetricsProvider {
    fn cpu_percent(&mut self) -> Result<f64, MetricsError> {
        let now = self.read_cpu_times()?;
        let busy = now.busy.saturating_sub(self.last_cpu.busy);
        let total = now.total.saturating_sub(self.last_cpu.total);
        self.last_cpu = now;
        if total == 0 {
            return Ok(0.0);
        }
        Ok(busy as f64 / total as f64 * 100.0)
    }

    fn memory_percent(&mut self) -> Result<f64, MetricsError> {
        let mem = self.read_meminfo()?;
        self.mem_total_kb = mem.total_kb;
        Ok(mem.used_percent())
    }

    fn disk_percent(&mut self) -> Result<f64, MetricsError> {
        let target = fs::canonicalize(&self.disk_path).map_err(|source| MetricsError::Read {
            path: self.disk_path.clone(),
            source,
        })?;

        self.disks.refresh();
        if self.disks.list().is_empty() {
            self.disks.refresh_list();
        }
        let mounts: Vec<DiskSpace> = self
            .disks
            .list()
            .iter()
            .map(|disk| DiskSpace {
                mount_point: disk.mount_point().to_path_buf(),
                total: disk.total_space(),
                available: disk.available_space(),
            })
            .collect();

        disk_used_percent(&target, &mounts).ok_or_else(|| MetricsError::NoDisk {
            path: self.disk_path.clone(),
        })
    }

    fn processes(&mut self) -> Result<Vec<ProcessSample>, MetricsError> {
        let dir = &self.proc_root;
        let entries = fs::read_dir(dir).map_err(|source| MetricsError::Read {
            path: dir.clone(),
            source,
        })?;
        let pids: Vec<u32> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();

        let now = Instant::now();
        let mut processes = Vec::with_capacity(pids.len());
        for pid in pids {
            // Processes can exit between listing and reading; skip them
            match self.parse_process(pid, now) {
                Some(info) => processes.push(info),
                None => debug!(pid, "process vanished or unreadable"),
            }
        }

        // Drop baselines for processes that no longer exist
        let alive: HashSet<u32> = processes.iter().map(|p| p.pid).collect();
        self.cpu_samples.retain(|pid, _| alive.contains(pid));
        Ok(processes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MemInfo {
    total_kb: u64,
    available_kb: u64,
}

impl MemInfo {
    fn used_percent(&self) -> f64 {
        if self.total_kb == 0 {
            return 0.0;
        }
        let used = self.total_kb.saturating_sub(self.available_kb);
        used as f64 / self.total_kb as f64 * 100.0
    }
}

#[derive(Debug, PartialEq)]
struct PidStat {
    name: String,
    utime: u64,
    stime: u64,
    rss_pages: u64,
}

/// Aggregate `cpu` line of /proc/stat. Guest time is already part of user.
fn parse_cpu_times(stat: &str) -> Result<CpuTimes, MetricsError> {
    let line = stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| MetricsError::Parse {
            what: "/proc/stat",
            reason: "no aggregate cpu line".to_string(),
        })?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|f| f.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|e| MetricsError::Parse {
            what: "/proc/stat",
            reason: e.to_string(),
        })?;
    if fields.len() < 4 {
        return Err(MetricsError::Parse {
            what: "/proc/stat",
            reason: format!("expected at least 4 cpu fields, got {}", fields.len()),
        });
    }
    let total: u64 = fields.iter().sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Ok(CpuTimes {
        busy: total.saturating_sub(idle),
        total,
    })
}

fn parse_meminfo(meminfo: &str) -> Result<MemInfo, MetricsError> {
    let mut total = None;
    let mut available = None;
    for line in meminfo.lines() {
        let mut parts = line.split_whitespace();
        let key = parts.next();
        let value = parts.next().and_then(|v| v.parse::<u64>().ok());
        match key {
            Some("MemTotal:") => total = value,
            Some("MemAvailable:") => available = value,
            _ => {}
        }
    }
    match (total, available) {
        (Some(total_kb), Some(available_kb)) => Ok(MemInfo { total_kb, available_kb }),
        _ => Err(MetricsError::Parse {
            what: "/proc/meminfo",
            reason: "missing MemTotal or MemAvailable".to_string(),
        }),
    }
}

/// The command name may contain spaces and parentheses, so fields are
/// counted from the last `)`.
fn parse_pid_stat(content: &str) -> Option<PidStat> {
    let open = content.find('(')?;
    let close = content.rfind(')')?;
    if close < open {
        return None;
    }
    let name = content[open + 1..close].to_string();
    let rest: Vec<&str> = content[close + 1..].split_whitespace().collect();
    // rest[0] is field 3 (state)
    if rest.len() < 22 {
        return None;
    }
    Some(PidStat {
        name,
        utime: rest[11].parse().ok()?,
        stime: rest[12].parse().ok()?,
        rss_pages: rest[21].parse().ok()?,
    })
}

#[derive(Debug, Clone)]
struct DiskSpace {
    mount_point: PathBuf,
    total: u64,
    available: u64,
}

/// Usage of the filesystem holding `target`: the mount with the longest
/// matching prefix wins.
fn disk_used_percent(target: &Path, mounts: &[DiskSpace]) -> Option<f64> {
    let disk = mounts
        .iter()
        .filter(|d| target.starts_with(&d.mount_point))
        .max_by_key(|d| d.mount_point.components().count())?;
    if disk.total == 0 {
        return Some(0.0);
    }
    let used = disk.total.saturating_sub(disk.available);
    Some(used as f64 / disk.total as f64 * 100.0)
}
