// src/fetchtime/mod.rs

//! Incremental fetch-time report exporter.
//!
//! Periodically writes the metadata items fetched since the previous run
//! to a tab-separated report file. Progress is tracked by a persisted
//! cursor in the metadata store, so each item appears in exactly one
//! report. Reports are written to a temporary file and only renamed into
//! place after the cursor covering them has been persisted; consumers
//! therefore never see a report whose items could be exported again.

pub mod manager;
pub mod schedule;
pub mod store;

pub use manager::ExportManager;
pub use schedule::Frequency;
pub use store::{MemoryStore, MetadataStore, StoreConnection};

use std::env;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::utils::timestamp14;

/// Minimum metadata store schema version the export query requires.
pub const REQUIRED_SCHEMA_VERSION: u32 = 10;

/// Cursor row label under which export progress is persisted.
pub const DEFAULT_CURSOR_LABEL: &str = "export_fetch_time_md_item_seq";

/// Upper bound on report lines per run; the remainder is picked up by
/// the next run through the cursor.
pub const DEFAULT_MAX_ITEMS_PER_FILE: usize = 100_000;

/// Default directory for report files, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "export/fetchTime";

const REPORT_BASENAME: &str = "fetch_time";
const REPORT_EXTENSION: &str = ".tsv";

/// In-progress reports carry this suffix so report consumers polling the
/// output directory skip them.
const TEMP_SUFFIX: &str = ".ignore";

/// Server name used in report lines when none is configured.
pub fn default_server_name() -> String {
    env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// Settings for the incremental exporter.
#[derive(Debug, Clone)]
pub struct FetchTimeOptions {
    /// Whether the export task does anything at all.
    pub enabled: bool,
    /// Name identifying this server in every report line.
    pub server_name: String,
    /// Directory the report files are written to.
    pub output_dir: PathBuf,
    /// Label of the persisted cursor row.
    pub cursor_label: String,
    /// Maximum report lines written per run.
    pub max_items_per_file: usize,
    /// How often the task should be scheduled.
    pub frequency: Frequency,
}

impl Default for FetchTimeOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            server_name: default_server_name(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            cursor_label: DEFAULT_CURSOR_LABEL.to_string(),
            max_items_per_file: DEFAULT_MAX_ITEMS_PER_FILE,
            frequency: Frequency::default(),
        }
    }
}

/// Outcome of one export run, as seen by the scheduler.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    /// Whether the scheduler should treat the task as done. Always true:
    /// a failed run is not retried, its items are covered by the cursor
    /// on the next scheduled run.
    pub executed: bool,
    /// Report lines written and committed.
    pub rows_exported: u64,
    /// Cursor value after the run, when the store was reachable.
    pub cursor: Option<i64>,
    /// Final path of the committed report file, when one was produced.
    pub report_path: Option<PathBuf>,
    /// Description of the failure that ended the run early, if any.
    pub error: Option<String>,
}

/// Writes one incremental fetch-time report per invocation.
pub struct FetchTimeExporter {
    options: FetchTimeOptions,
    #[cfg(test)]
    fail_after_lines: Option<u64>,
}

impl FetchTimeExporter {
    pub fn new(options: FetchTimeOptions) -> Self {
        Self {
            options,
            #[cfg(test)]
            fail_after_lines: None,
        }
    }

    pub fn options(&self) -> &FetchTimeOptions {
        &self.options
    }

    /// Perform one export run. Never propagates an error to the caller:
    /// failures are logged, recorded in the report, and the task counts
    /// as executed so the scheduler moves on to the next cadence slot.
    pub fn run(&self, store: &dyn MetadataStore) -> RunReport {
        if !self.options.enabled {
            debug!("fetch-time export is disabled");
            return RunReport {
                executed: true,
                ..Default::default()
            };
        }
        match self.process(store) {
            Ok(report) => report,
            Err(e) => {
                warn!("fetch-time export run failed: {}", e);
                RunReport {
                    executed: true,
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }

    fn process(&self, store: &dyn MetadataStore) -> Result<RunReport> {
        let mut conn = store.connect()?;

        let version = conn.schema_version()?;
        if version < REQUIRED_SCHEMA_VERSION {
            return Err(AppError::store(format!(
                "metadata store schema version {} is below required {}",
                version, REQUIRED_SCHEMA_VERSION
            )));
        }

        fs::create_dir_all(&self.options.output_dir)?;

        let label = &self.options.cursor_label;
        let cursor = match conn.read_cursor(label)? {
            Some(value) => value,
            None => {
                conn.init_cursor(label, -1)?;
                -1
            }
        };
        debug!("exporting items with id > {}", cursor);

        let rows = conn.fetched_after(cursor, self.options.max_items_per_file)?;

        let stamp = timestamp14(Utc::now());
        let final_name = format!(
            "{}-{}-{}{}",
            REPORT_BASENAME, self.options.server_name, stamp, REPORT_EXTENSION
        );
        let final_path = self.options.output_dir.join(&final_name);
        let temp_path = self.options.output_dir.join(format!("{final_name}{TEMP_SUFFIX}"));

        let mut writer = BufWriter::new(File::create(&temp_path)?);
        let mut written = 0u64;
        let mut last_id = cursor;
        let outcome = self
            .write_rows(&mut writer, &rows, &mut written, &mut last_id)
            .and_then(|_| Ok(writer.flush()?));
        drop(writer);
        if let Err(e) = outcome {
            // A partial report must not become visible, and the cursor
            // must not move past its rows.
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        if written == 0 {
            debug!("no new items to export");
            fs::remove_file(&temp_path)?;
            return Ok(RunReport {
                executed: true,
                cursor: Some(cursor),
                ..Default::default()
            });
        }

        // Cursor first, rename second. A crash between the two loses one
        // report file but never exports an item twice.
        if let Err(e) = conn.update_cursor(label, last_id) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        fs::rename(&temp_path, &final_path)?;
        info!("exported {} fetch-time items to {}", written, final_path.display());

        Ok(RunReport {
            executed: true,
            rows_exported: written,
            cursor: Some(last_id),
            report_path: Some(final_path),
            error: None,
        })
    }

    fn write_rows(
        &self,
        writer: &mut impl Write,
        rows: &[crate::models::FetchRecord],
        written: &mut u64,
        last_id: &mut i64,
    ) -> Result<()> {
        for row in rows {
            if row.fetch_time < 0 {
                debug!("skipping item {} with uninitialized fetch time", row.id);
                continue;
            }
            writeln!(writer, "{}", row.to_line(&self.options.server_name))?;
            *written += 1;
            *last_id = row.id;
            #[cfg(test)]
            if self.fail_after_lines == Some(*written) {
                return Err(AppError::export(
                    "fetch-time report",
                    "injected write failure",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchRecord;
    use crate::models::record::EXPORT_SCHEMA_VERSION;
    use tempfile::TempDir;

    fn row(id: i64, fetch_time: i64) -> FetchRecord {
        FetchRecord {
            id,
            fetch_time,
            publisher_name: format!("publisher-{id}"),
            ..Default::default()
        }
    }

    fn options(dir: &TempDir) -> FetchTimeOptions {
        FetchTimeOptions {
            enabled: true,
            server_name: "host1".to_string(),
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    fn report_files(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn first_run_initializes_cursor_and_exports() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(REQUIRED_SCHEMA_VERSION);
        for id in 1..=3 {
            store.push_row(row(id, id * 1000));
        }
        let exporter = FetchTimeExporter::new(options(&dir));

        let report = exporter.run(&store);
        assert!(report.executed);
        assert_eq!(report.rows_exported, 3);
        assert_eq!(report.cursor, Some(3));
        assert_eq!(store.cursor(DEFAULT_CURSOR_LABEL), Some(3));
        assert!(report.error.is_none());

        let path = report.report_path.unwrap();
        assert!(path.file_name().unwrap().to_str().unwrap().ends_with(".tsv"));
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let cols: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(cols.len(), 22);
        assert_eq!(cols[0], EXPORT_SCHEMA_VERSION.to_string());
        assert_eq!(cols[1], "host1");
    }

    #[test]
    fn second_run_with_no_new_rows_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(REQUIRED_SCHEMA_VERSION);
        store.push_row(row(1, 1000));
        let exporter = FetchTimeExporter::new(options(&dir));

        exporter.run(&store);
        let second = exporter.run(&store);
        assert!(second.executed);
        assert_eq!(second.rows_exported, 0);
        assert_eq!(second.cursor, Some(1));
        assert!(second.report_path.is_none());

        // One committed report, no leftover temporary.
        let names = report_files(&dir);
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".tsv"));
    }

    #[test]
    fn connect_failure_is_considered_executed() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(REQUIRED_SCHEMA_VERSION);
        store.set_fail_connect(true);
        let exporter = FetchTimeExporter::new(options(&dir));

        let report = exporter.run(&store);
        assert!(report.executed);
        assert_eq!(report.rows_exported, 0);
        assert!(report.error.is_some());
        assert!(report_files(&dir).is_empty());
    }

    #[test]
    fn old_store_schema_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(REQUIRED_SCHEMA_VERSION - 1);
        store.push_row(row(1, 1000));
        let exporter = FetchTimeExporter::new(options(&dir));

        let report = exporter.run(&store);
        assert!(report.executed);
        assert!(report.error.unwrap().contains("schema version"));
        assert_eq!(store.cursor(DEFAULT_CURSOR_LABEL), None);
        assert!(report_files(&dir).is_empty());
    }

    #[test]
    fn uninitialized_fetch_times_are_skipped_without_cursor_advance() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(REQUIRED_SCHEMA_VERSION);
        store.push_row(row(1, -1));
        let exporter = FetchTimeExporter::new(options(&dir));

        let report = exporter.run(&store);
        assert_eq!(report.rows_exported, 0);
        assert_eq!(report.cursor, Some(-1));
        assert_eq!(store.cursor(DEFAULT_CURSOR_LABEL), Some(-1));
        assert!(report_files(&dir).is_empty());

        // Once the fetch time is initialized the item is picked up.
        store.push_row(row(2, 2000));
        let report = exporter.run(&store);
        assert_eq!(report.rows_exported, 1);
        assert_eq!(report.cursor, Some(2));
    }

    #[test]
    fn write_failure_discards_temp_and_keeps_cursor() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(REQUIRED_SCHEMA_VERSION);
        for id in 1..=3 {
            store.push_row(row(id, id * 1000));
        }
        let mut exporter = FetchTimeExporter::new(options(&dir));
        exporter.fail_after_lines = Some(2);

        let report = exporter.run(&store);
        assert!(report.executed);
        assert_eq!(report.rows_exported, 0);
        assert!(report.error.is_some());
        // Cursor was initialized but never advanced past the failed batch.
        assert_eq!(store.cursor(DEFAULT_CURSOR_LABEL), Some(-1));
        assert!(report_files(&dir).is_empty());

        // The next run re-exports the full batch.
        exporter.fail_after_lines = None;
        let report = exporter.run(&store);
        assert_eq!(report.rows_exported, 3);
        assert_eq!(report.cursor, Some(3));
    }

    #[test]
    fn item_cap_splits_batches_across_runs() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(REQUIRED_SCHEMA_VERSION);
        for id in 1..=3 {
            store.push_row(row(id, id * 1000));
        }
        let mut opts = options(&dir);
        opts.max_items_per_file = 2;
        let exporter = FetchTimeExporter::new(opts);

        let first = exporter.run(&store);
        assert_eq!(first.rows_exported, 2);
        assert_eq!(first.cursor, Some(2));

        let second = exporter.run(&store);
        assert_eq!(second.rows_exported, 1);
        assert_eq!(second.cursor, Some(3));
        let content = std::fs::read_to_string(second.report_path.unwrap()).unwrap();
        assert!(content.starts_with(&format!("{}\thost1\tpublisher-3", EXPORT_SCHEMA_VERSION)));
    }

    #[test]
    fn disabled_exporter_does_nothing_but_counts_as_executed() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(REQUIRED_SCHEMA_VERSION);
        store.push_row(row(1, 1000));
        let mut opts = options(&dir);
        opts.enabled = false;
        let exporter = FetchTimeExporter::new(opts);

        let report = exporter.run(&store);
        assert!(report.executed);
        assert_eq!(report.rows_exported, 0);
        assert_eq!(store.cursor(DEFAULT_CURSOR_LABEL), None);
        assert!(report_files(&dir).is_empty());
    }
}
