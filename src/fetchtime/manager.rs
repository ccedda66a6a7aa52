// src/fetchtime/manager.rs

//! Scheduling surface for the fetch-time export task.

use chrono::{DateTime, Utc};
use log::debug;

use super::schedule::Frequency;
use super::{FetchTimeExporter, FetchTimeOptions, MetadataStore, RunReport};

/// Owns the exporter and answers the two questions an external scheduler
/// asks: when should the task run next, and run it now.
pub struct ExportManager {
    exporter: FetchTimeExporter,
}

impl ExportManager {
    pub fn new(options: FetchTimeOptions) -> Self {
        Self {
            exporter: FetchTimeExporter::new(options),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.exporter.options().enabled
    }

    pub fn frequency(&self) -> Frequency {
        self.exporter.options().frequency
    }

    /// The instant the task should next fire after `last`.
    pub fn next_run(&self, last: DateTime<Utc>) -> DateTime<Utc> {
        self.frequency().next_time(last)
    }

    /// Run one export pass. The report always says executed, so a failed
    /// pass waits for its next cadence slot instead of being retried.
    pub fn run_once(&self, store: &dyn MetadataStore) -> RunReport {
        debug!("starting fetch-time export pass");
        self.exporter.run(store)
    }
}
