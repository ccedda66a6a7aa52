//! Bulk archival export: container writers, rotation, and the driver.
//!
//! One [`ContainerWriter`] per output format (ARC, WARC, ZIP), all fed by
//! the [`driver`] and all rotating output segments through the shared
//! [`rotate`] accounting. Formats are looked up in an open
//! [`WriterRegistry`], so a new container format is one `register` call
//! away instead of a change to a closed enumeration.

pub mod arc;
pub mod driver;
pub mod headers;
pub mod rotate;
pub mod warc;
pub mod xlate;
pub mod zip;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ContentVersion;

// Re-export for convenience
pub use driver::{ExportReport, export};
pub use xlate::TranslateMode;

/// How a version is framed into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Synthetic HTTP response: status line + filtered headers + body.
    #[default]
    Response,
    /// Raw content only, under the version's stored content type.
    Resource,
}

impl std::str::FromStr for RecordMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "response" => Ok(RecordMode::Response),
            "resource" => Ok(RecordMode::Resource),
            other => Err(format!("unknown record mode '{other}'")),
        }
    }
}

/// Settings for one bulk export invocation.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Directory receiving the output segments.
    pub output_dir: PathBuf,
    /// File-name prefix for output segments.
    pub prefix: String,
    /// Container format tag, resolved through the registry.
    pub format: String,
    /// Response vs. resource framing.
    pub mode: RecordMode,
    /// Versions exported per node, most recent first.
    pub max_versions: usize,
    /// Maximum segment size in bytes; `None` disables rotation.
    pub max_segment_size: Option<u64>,
    /// Entry-name translation for ZIP output.
    pub translate: TranslateMode,
    /// User agent recorded in WARC metadata blocks.
    pub user_agent: String,
    /// Writer IP recorded in ARC records and WARC metadata blocks.
    pub ip: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::new(),
            prefix: String::new(),
            format: "warc".to_string(),
            mode: RecordMode::Response,
            max_versions: 1,
            max_segment_size: None,
            translate: TranslateMode::None,
            user_agent: default_user_agent(),
            ip: "0.0.0.0".to_string(),
        }
    }
}

impl ExportOptions {
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Check required settings. Fails before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(AppError::config("export output directory is not set"));
        }
        if self.prefix.trim().is_empty() {
            return Err(AppError::config("export file-name prefix is not set"));
        }
        if self.max_versions == 0 {
            return Err(AppError::config("max_versions must be > 0"));
        }
        Ok(())
    }
}

/// Software signature recorded in export output.
pub fn default_user_agent() -> String {
    format!("conserv/{}", env!("CARGO_PKG_VERSION"))
}

/// A format-specific record framer with an open/write/close lifecycle.
pub trait ContainerWriter {
    /// Prepare the writer. Formats that materialize a file up front do so
    /// here; ZIP defers until the first entry.
    fn open(&mut self) -> Result<()>;

    /// Frame one version into the current segment, rotating first if the
    /// size cap was reached.
    fn write_version(&mut self, version: &dyn ContentVersion) -> Result<()>;

    /// Flush trailers and close the current segment.
    fn close(&mut self) -> Result<()>;

    /// Number of physical segments opened so far.
    fn segments(&self) -> u32;
}

/// Constructor for a container writer, given export settings and the
/// archival unit's name.
pub type WriterFactory = fn(&ExportOptions, &str) -> Result<Box<dyn ContainerWriter>>;

/// Open mapping from format tag to writer constructor.
pub struct WriterRegistry {
    factories: HashMap<String, WriterFactory>,
}

impl WriterRegistry {
    /// Registry with the built-in formats: `arc`, `warc`, `zip`.
    pub fn builtin() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("arc", arc::ArcWriter::factory);
        registry.register("warc", warc::WarcWriter::factory);
        registry.register("zip", zip::ZipWriter::factory);
        registry
    }

    /// Register (or replace) a format constructor.
    pub fn register(&mut self, tag: impl Into<String>, factory: WriterFactory) {
        self.factories.insert(tag.into(), factory);
    }

    /// Instantiate a writer for the given format tag.
    pub fn create(
        &self,
        tag: &str,
        options: &ExportOptions,
        unit_name: &str,
    ) -> Result<Box<dyn ContainerWriter>> {
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| AppError::config(format!("unknown export format '{tag}'")))?;
        factory(options, unit_name)
    }

    /// Registered format tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl Default for WriterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
