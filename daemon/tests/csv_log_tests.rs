mod common;

use chrono::Local;
use common::{process, read_records};
use std::fs;
use std::sync::Arc;
use std::thread;
use sysmon_daemon::csv_log::{header, CsvLog};
use sysmon_daemon::error::LogError;
use sysmon_daemon::sample::MetricsSample;
use tempfile::tempdir;

fn sample_with(processes: Vec<sysmon_daemon::collector::ProcessSample>) -> MetricsSample {
    MetricsSample {
        timestamp: Local::now(),
        cpu_percent: 12.34,
        memory_percent: 56.78,
        disk_percent: 90.0,
        top_processes: processes,
    }
}

#[test]
fn test_new_file_gets_header_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.csv");

    let log = CsvLog::open(&path, 3).unwrap();
    assert_eq!(log.top_n(), 3);
    log.append(&sample_with(vec![])).unwrap();
    drop(log);

    let log = CsvLog::open(&path, 3).unwrap();
    log.append(&sample_with(vec![])).unwrap();

    let records = read_records(&path);
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].iter().collect::<Vec<_>>(), header(3));
    assert!(records.iter().skip(1).all(|r| r.get(0) != Some("timestamp")));
}

#[test]
fn test_creates_missing_parent_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/logs/metrics.csv");
    CsvLog::open(&path, 1).unwrap();
    assert!(path.exists());
}

#[test]
fn test_rows_are_padded_to_fixed_width() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.csv");
    let log = CsvLog::open(&path, 3).unwrap();

    log.append(&sample_with(vec![process(7, "init", 2.0)])).unwrap();

    let records = read_records(&path);
    let row = &records[1];
    assert_eq!(row.len(), 4 + 3 * 3);
    assert_eq!(&row[1], "12.3");
    assert_eq!(&row[2], "56.8");
    assert_eq!(&row[3], "90.0");
    assert_eq!(&row[4], "7");
    assert_eq!(&row[5], "init");
    assert_eq!(&row[6], "2.0");
    assert!(row.iter().skip(7).all(|f| f.is_empty()));
}

#[test]
fn test_extra_processes_are_not_written() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.csv");
    let log = CsvLog::open(&path, 1).unwrap();

    log.append(&sample_with(vec![process(1, "a", 9.0), process(2, "b", 1.0)]))
        .unwrap();

    let records = read_records(&path);
    assert_eq!(records[1].len(), 7);
    assert_eq!(&records[1][4], "1");
}

#[test]
fn test_process_names_with_commas_and_quotes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.csv");
    let log = CsvLog::open(&path, 1).unwrap();

    log.append(&sample_with(vec![process(3, "a, \"b\"", 1.0)])).unwrap();

    let records = read_records(&path);
    assert_eq!(&records[1][5], "a, \"b\"");
}

#[test]
fn test_reopen_with_different_width_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.csv");
    CsvLog::open(&path, 3).unwrap();

    let err = CsvLog::open(&path, 5).err().expect("mismatched header must fail");
    assert!(matches!(err, LogError::HeaderMismatch { .. }));
}

#[test]
fn test_unopenable_path_is_an_open_error() {
    let dir = tempdir().unwrap();
    // A directory cannot be opened as the log file
    let err = CsvLog::open(dir.path(), 1).err().expect("directory is not a file");
    assert!(matches!(err, LogError::Open { .. }));
}

#[test]
fn test_partial_last_row_is_discarded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.csv");
    let header_line = header(1).join(",");
    let full_row = "2026-10-18T11:59:58,1.0,2.0,3.0,1,init,0.5";
    fs::write(
        &path,
        format!("{header_line}\n{full_row}\n2026-10-18T12:00:00,1.0,2.0"),
    )
    .unwrap();

    let log = CsvLog::open(&path, 1).unwrap();
    log.append(&sample_with(vec![process(1, "a", 1.0)])).unwrap();

    // A strict reader rejects rows whose width differs from the header
    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "2026-10-18T11:59:58");
    assert_eq!(&rows[1][5], "a");
    assert!(fs::read_to_string(&path).unwrap().ends_with('\n'));
}

#[test]
fn test_unterminated_header_is_rewritten() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.csv");
    fs::write(&path, header(1).join(",")).unwrap();

    let log = CsvLog::open(&path, 1).unwrap();
    log.append(&sample_with(vec![])).unwrap();

    let records = read_records(&path);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].iter().collect::<Vec<_>>(), header(1));
    assert_eq!(records[1].len(), 7);
}

#[test]
fn test_concurrent_writers_never_interleave() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.csv");
    let log = Arc::new(CsvLog::open(&path, 3).unwrap());

    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                let name = format!("writer-{t}-{}", "x".repeat(200));
                for i in 0..50u32 {
                    let procs = vec![
                        process(t * 1000 + i, &name, 3.0),
                        process(t * 1000 + i + 1, &name, 2.0),
                        process(t * 1000 + i + 2, &name, 1.0),
                    ];
                    log.append(&sample_with(procs)).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let records = read_records(&path);
    assert_eq!(records.len(), 1 + 8 * 50);
    for row in records.iter().skip(1) {
        assert_eq!(row.len(), 13);
        // All three slots of a row come from the same writer
        let owner = &row[5];
        assert!(owner.starts_with("writer-"));
        assert_eq!(&row[8], owner);
        assert_eq!(&row[11], owner);
    }
}
