//! Top-level bulk export orchestration.
//!
//! One `export()` call walks every content node of an archival unit and
//! feeds up to `max_versions` versions per node to the selected container
//! writer. A bad record is logged and recorded, never fatal; the caller
//! gets the full error list back in the report. There are no retries
//! inside a call, and a call is not safe to run concurrently against the
//! same output directory and prefix.

use serde::Serialize;

use crate::error::Result;
use crate::models::ArchivalUnit;

use super::{ExportOptions, WriterRegistry};

/// Outcome of one export invocation, including every accumulated
/// per-record error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    /// Nodes with material content that were visited.
    pub nodes: u64,
    /// Versions successfully framed into the archive.
    pub versions_written: u64,
    /// Physical output segments opened.
    pub segments: u32,
    /// Per-record and open/close failures, in occurrence order.
    pub errors: Vec<String>,
}

impl ExportReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Export every node of `unit` using the format selected in `options`.
///
/// Configuration problems (missing output directory or prefix, unknown
/// format) fail immediately, before any I/O. Everything after that is
/// error-isolated per version and reported, not thrown.
pub fn export(
    unit: &dyn ArchivalUnit,
    options: &ExportOptions,
    registry: &WriterRegistry,
) -> Result<ExportReport> {
    options.validate()?;
    let mut writer = registry.create(&options.format, options, unit.name())?;

    std::fs::create_dir_all(&options.output_dir)?;
    log::info!(
        "Exporting unit '{}' as {} to {}",
        unit.name(),
        options.format,
        options.output_dir.display()
    );

    let mut report = ExportReport::default();

    if let Err(e) = writer.open() {
        log::error!("Cannot open {} writer: {}", options.format, e);
        report.errors.push(format!("open: {e}"));
        report.segments = writer.segments();
        return Ok(report);
    }

    for node in unit.nodes()? {
        if !node.has_content() {
            continue;
        }
        report.nodes += 1;

        let versions = match node.versions(options.max_versions) {
            Ok(versions) => versions,
            Err(e) => {
                log::warn!("Cannot resolve versions of {}: {}", node.url(), e);
                report.errors.push(format!("{}: {e}", node.url()));
                continue;
            }
        };

        for version in versions {
            match writer.write_version(version.as_ref()) {
                Ok(()) => report.versions_written += 1,
                Err(e) => {
                    log::warn!("Skipping version of {}: {}", version.url(), e);
                    report.errors.push(format!("{}: {e}", version.url()));
                }
            }
        }
    }

    // Closed exactly once; a close failure is recorded, not thrown, and
    // does not invalidate records already written.
    if let Err(e) = writer.close() {
        log::error!("Error closing {} writer: {}", options.format, e);
        report.errors.push(format!("close: {e}"));
    }

    report.segments = writer.segments();
    log::info!(
        "Export done: {} versions across {} nodes in {} segments, {} errors",
        report.versions_written,
        report.nodes,
        report.segments,
        report.errors.len()
    );
    Ok(report)
}
