// src/config.rs

//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::export::{ExportOptions, RecordMode, TranslateMode};
use crate::fetchtime::{FetchTimeOptions, Frequency, default_server_name};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Bulk archival export settings
    #[serde(default)]
    pub export: ExportSection,

    /// Incremental fetch-time report settings
    #[serde(default)]
    pub fetch_time: FetchTimeSection,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.export.max_versions == 0 {
            return Err(AppError::validation("export.max_versions must be > 0"));
        }
        if self.fetch_time.cursor_label.trim().is_empty() {
            return Err(AppError::validation("fetch_time.cursor_label is empty"));
        }
        if self.fetch_time.max_items_per_file == 0 {
            return Err(AppError::validation(
                "fetch_time.max_items_per_file must be > 0",
            ));
        }
        Ok(())
    }
}

/// Bulk archival export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSection {
    /// Directory receiving output segments
    #[serde(default = "defaults::export_dir")]
    pub output_dir: PathBuf,

    /// Container format: arc, warc or zip
    #[serde(default = "defaults::format")]
    pub format: String,

    /// Response vs. resource record framing
    #[serde(default)]
    pub mode: RecordMode,

    /// Versions exported per URL, most recent first
    #[serde(default = "defaults::max_versions")]
    pub max_versions: usize,

    /// Segment size cap in bytes; 0 disables rotation
    #[serde(default)]
    pub max_segment_size: u64,

    /// Entry-name translation for ZIP output
    #[serde(default)]
    pub translate: TranslateMode,

    /// Writer IP recorded in archive metadata
    #[serde(default = "defaults::ip")]
    pub ip: String,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            output_dir: defaults::export_dir(),
            format: defaults::format(),
            mode: RecordMode::default(),
            max_versions: defaults::max_versions(),
            max_segment_size: 0,
            translate: TranslateMode::default(),
            ip: defaults::ip(),
        }
    }
}

impl ExportSection {
    /// Settings for one export of the unit named by `prefix`.
    pub fn to_options(&self, prefix: &str) -> ExportOptions {
        let mut options = ExportOptions::new(&self.output_dir, prefix);
        options.format = self.format.clone();
        options.mode = self.mode;
        options.max_versions = self.max_versions;
        options.max_segment_size = match self.max_segment_size {
            0 => None,
            cap => Some(cap),
        };
        options.translate = self.translate;
        options.ip = self.ip.clone();
        options
    }
}

/// Incremental fetch-time report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchTimeSection {
    /// Whether the periodic export task runs at all
    #[serde(default)]
    pub enabled: bool,

    /// Server name in report lines; empty means the local host name
    #[serde(default)]
    pub server_name: String,

    /// Directory receiving report files
    #[serde(default = "defaults::fetch_time_dir")]
    pub output_dir: PathBuf,

    /// Label of the persisted export cursor
    #[serde(default = "defaults::cursor_label")]
    pub cursor_label: String,

    /// Report line cap per run
    #[serde(default = "defaults::max_items_per_file")]
    pub max_items_per_file: usize,

    /// Task cadence: hourly, daily, weekly or monthly
    #[serde(default)]
    pub frequency: Frequency,
}

impl Default for FetchTimeSection {
    fn default() -> Self {
        Self {
            enabled: false,
            server_name: String::new(),
            output_dir: defaults::fetch_time_dir(),
            cursor_label: defaults::cursor_label(),
            max_items_per_file: defaults::max_items_per_file(),
            frequency: Frequency::default(),
        }
    }
}

impl FetchTimeSection {
    pub fn to_options(&self) -> FetchTimeOptions {
        let server_name = if self.server_name.trim().is_empty() {
            default_server_name()
        } else {
            self.server_name.clone()
        };
        FetchTimeOptions {
            enabled: self.enabled,
            server_name,
            output_dir: self.output_dir.clone(),
            cursor_label: self.cursor_label.clone(),
            max_items_per_file: self.max_items_per_file,
            frequency: self.frequency,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use crate::fetchtime;

    // Export defaults
    pub fn export_dir() -> PathBuf {
        PathBuf::from("export")
    }
    pub fn format() -> String {
        "warc".into()
    }
    pub fn max_versions() -> usize {
        1
    }
    pub fn ip() -> String {
        "0.0.0.0".into()
    }

    // Fetch-time defaults
    pub fn fetch_time_dir() -> PathBuf {
        PathBuf::from(fetchtime::DEFAULT_OUTPUT_DIR)
    }
    pub fn cursor_label() -> String {
        fetchtime::DEFAULT_CURSOR_LABEL.into()
    }
    pub fn max_items_per_file() -> usize {
        fetchtime::DEFAULT_MAX_ITEMS_PER_FILE
    }
}
