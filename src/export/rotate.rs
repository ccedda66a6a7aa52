//! Size-based output rotation shared by all container writers.
//!
//! A rotation check happens before each record, never during one, so a
//! segment can overshoot the configured maximum by at most one record.
//! Segments are named `<prefix>-<run-timestamp>-<serial><ext>` with a
//! zero-padded 4-digit serial; past 9999 the serial simply grows wider.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::utils::timestamp14;

/// A `Write` wrapper that counts bytes physically written, for rotation
/// accounting.
pub struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Generates successive segment paths for one export run.
#[derive(Debug, Clone)]
pub struct SegmentNamer {
    dir: PathBuf,
    prefix: String,
    extension: String,
    run_stamp: String,
    serial: u32,
}

impl SegmentNamer {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: extension.to_string(),
            run_stamp: timestamp14(Utc::now()),
            serial: 0,
        }
    }

    /// Path for the next segment, advancing the serial.
    pub fn next_path(&mut self) -> PathBuf {
        self.serial += 1;
        let name = format!(
            "{}-{}-{:04}{}",
            self.prefix, self.run_stamp, self.serial, self.extension
        );
        self.dir.join(name)
    }

    /// Number of segments named so far this run.
    pub fn segments(&self) -> u32 {
        self.serial
    }
}

/// Whether the current segment has reached the configured size cap.
pub fn reached_cap(written: u64, max_size: Option<u64>) -> bool {
    match max_size {
        Some(max) => written >= max,
        None => false,
    }
}

/// Rotating byte-stream output for line-and-payload record formats.
///
/// ZIP manages its own files through [`SegmentNamer`] and
/// [`CountingWriter`] directly, because each segment needs a central
/// directory trailer before the file closes.
pub struct RotatingOutput {
    namer: SegmentNamer,
    max_size: Option<u64>,
    current: Option<CountingWriter<BufWriter<File>>>,
    current_path: Option<PathBuf>,
    records_in_segment: u64,
}

impl RotatingOutput {
    pub fn new(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        extension: &str,
        max_size: Option<u64>,
    ) -> Self {
        Self {
            namer: SegmentNamer::new(dir, prefix, extension),
            max_size,
            current: None,
            current_path: None,
            records_in_segment: 0,
        }
    }

    fn open_new(&mut self) -> Result<()> {
        self.close()?;
        let path = self.namer.next_path();
        log::debug!("Opening segment {}", path.display());
        let file = File::create(&path)?;
        self.current = Some(CountingWriter::new(BufWriter::new(file)));
        self.current_path = Some(path);
        self.records_in_segment = 0;
        Ok(())
    }

    /// Ensure a segment is open, never rotating. Returns `true` when a
    /// new physical file was opened, so formats with per-file preambles
    /// know to write one.
    pub fn ensure_open(&mut self) -> Result<bool> {
        if self.current.is_some() {
            return Ok(false);
        }
        self.open_new()?;
        Ok(true)
    }

    /// Pre-record rotation check: rotate when the cap is reached, unless
    /// the segment has taken no record yet. A segment whose preamble
    /// alone crosses the cap must still hold its first record, or
    /// rotation would spin out record-less files. Returns `true` when a
    /// new physical file was opened.
    pub fn checkpoint(&mut self) -> Result<bool> {
        let rotate = match &self.current {
            None => true,
            Some(w) => {
                self.records_in_segment > 0 && reached_cap(w.written(), self.max_size)
            }
        };
        if rotate {
            self.open_new()?;
        }
        self.records_in_segment += 1;
        Ok(rotate)
    }

    /// The open segment's writer. Only valid after a `checkpoint`.
    pub fn writer(&mut self) -> Result<&mut CountingWriter<BufWriter<File>>> {
        self.current
            .as_mut()
            .ok_or_else(|| AppError::export("rotation", "no open segment"))
    }

    /// Path of the segment currently being written.
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Number of physical segments opened this run.
    pub fn segments(&self) -> u32 {
        self.namer.segments()
    }

    /// Flush and close the open segment, if any.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut w) = self.current.take() {
            w.flush()?;
        }
        Ok(())
    }
}
