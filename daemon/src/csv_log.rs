//! Append-only CSV log of metrics samples

use crate::error::LogError;
use crate::sample::MetricsSample;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

pub const DEFAULT_LOG_FILE: &str = "system_metrics.csv";

const FIXED_COLUMNS: [&str; 4] = ["timestamp", "cpu_percent", "memory_percent", "disk_percent"];

/// Owns the log file handle. Rows are encoded outside the lock and written
/// with one `write_all`, so concurrent appenders never interleave. A write
/// that fails partway is cut back off, so the file only ever holds whole rows.
pub struct CsvLog {
    path: PathBuf,
    top_n: usize,
    file: Mutex<File>,
}

impl CsvLog {
    /// Open `path` for appending, writing the header if the file is new.
    /// An existing file must carry the header for the same `top_n`.
    pub fn open(path: &Path, top_n: usize) -> Result<Self, LogError> {
        let open_err = |source| LogError::Open {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)
            .map_err(open_err)?;

        let expected = encode_record(&header(top_n))?;
        let len = file.metadata().map_err(open_err)?.len();
        if len == 0 {
            file.write_all(&expected)?;
            file.flush()?;
            info!("Created {:?} with {} process columns", path, top_n);
        } else {
            let mut first_line = String::new();
            BufReader::new(&file)
                .read_line(&mut first_line)
                .map_err(open_err)?;
            let expected_line = String::from_utf8_lossy(&expected);
            if first_line.trim_end() != expected_line.trim_end() {
                return Err(LogError::HeaderMismatch {
                    path: path.to_path_buf(),
                    found: first_line.trim_end().to_string(),
                    expected: expected_line.trim_end().to_string(),
                });
            }
            match last_newline(&mut file, len)? {
                Some(pos) if pos + 1 == len => {}
                Some(pos) => {
                    // A previous run died mid-row
                    warn!(
                        "{:?} ends with a partial row ({} bytes), discarding it",
                        path,
                        len - pos - 1
                    );
                    file.set_len(pos + 1)?;
                }
                None => {
                    warn!("{:?} header is not newline-terminated, rewriting it", path);
                    file.set_len(0)?;
                    file.write_all(&expected)?;
                    file.flush()?;
                }
            }
            info!("Appending to existing {:?}", path);
        }

        Ok(Self {
            path: path.to_path_buf(),
            top_n,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Append one row. The file lock is held only for the write itself.
    pub fn append(&self, sample: &MetricsSample) -> Result<(), LogError> {
        let row = encode_record(&self.row(sample))?;
        let mut file = self.file.lock().map_err(|_| LogError::Poisoned)?;
        write_whole_row(&mut *file, &row)
    }

    /// Flattened fields for one sample, padded to the fixed process width.
    pub fn row(&self, sample: &MetricsSample) -> Vec<String> {
        let mut fields = Vec::with_capacity(FIXED_COLUMNS.len() + 3 * self.top_n);
        fields.push(sample.timestamp_string());
        fields.push(format!("{:.1}", sample.cpu_percent));
        fields.push(format!("{:.1}", sample.memory_percent));
        fields.push(format!("{:.1}", sample.disk_percent));
        let mut procs = sample.top_processes.iter();
        for _ in 0..self.top_n {
            match procs.next() {
                Some(p) => {
                    fields.push(p.pid.to_string());
                    fields.push(p.name.clone());
                    fields.push(format!("{:.1}", p.cpu_percent));
                }
                None => fields.extend(std::iter::repeat(String::new()).take(3)),
            }
        }
        fields
    }
}

/// Column names for a log with `top_n` process slots.
pub fn header(top_n: usize) -> Vec<String> {
    let mut columns: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    for i in 1..=top_n {
        columns.push(format!("proc{i}_pid"));
        columns.push(format!("proc{i}_name"));
        columns.push(format!("proc{i}_cpu_percent"));
    }
    columns
}

fn encode_record(fields: &[String]) -> Result<Vec<u8>, LogError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(fields)?;
    wtr.into_inner().map_err(|e| LogError::Io(e.into_error()))
}

/// Byte offset of the last `\n` in the first `len` bytes of `file`.
fn last_newline(file: &mut File, len: u64) -> io::Result<Option<u64>> {
    let mut buf = [0u8; 4096];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(buf.len() as u64);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(i) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(Some(start + i as u64));
        }
        end = start;
    }
    Ok(None)
}

/// A sink whose tail can be cut back after a failed write.
trait Truncate: Write {
    fn end(&mut self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn end(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

fn write_whole_row<W: Truncate>(sink: &mut W, row: &[u8]) -> Result<(), LogError> {
    let start = sink.end()?;
    if let Err(e) = sink.write_all(row).and_then(|()| sink.flush()) {
        if let Err(rollback) = sink.truncate(start) {
            warn!("Failed to remove partial row at offset {}: {}", start, rollback);
        }
        return Err(e.into());
    }
    Ok(())
}
