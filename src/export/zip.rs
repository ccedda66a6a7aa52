//! ZIP container framing.
//!
//! Entries use the stored (uncompressed) method so the entry body is
//! byte-for-byte the original content; the synthetic HTTP head lives in
//! the entry's central-directory comment instead. Entry names are the
//! (optionally translated) URL strings and are NOT deduplicated across
//! versions of one URL, which is legal ZIP. The physical file is only
//! created once the first entry is written, so an empty unit never
//! materializes an empty archive.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};

use crate::error::{AppError, Result};
use crate::models::ContentVersion;

use super::headers::response_head;
use super::rotate::{CountingWriter, SegmentNamer, reached_cap};
use super::xlate::TranslateMode;
use super::{ContainerWriter, ExportOptions};

const ZIP_EXTENSION: &str = ".zip";

const LOCAL_HEADER_SIG: u32 = 0x04034b50;
const CENTRAL_HEADER_SIG: u32 = 0x02014b50;
const EOCD_SIG: u32 = 0x06054b50;

// Stored entries need only format version 1.0; names and comments are UTF-8.
const VERSION_NEEDED: u16 = 10;
const VERSION_MADE_BY: u16 = 20;
const FLAG_UTF8: u16 = 0x0800;
const METHOD_STORED: u16 = 0;

struct CdEntry {
    name: Vec<u8>,
    comment: Vec<u8>,
    crc: u32,
    size: u32,
    dos_time: u16,
    dos_date: u16,
    offset: u32,
}

struct ZipSegment {
    out: CountingWriter<BufWriter<File>>,
    entries: Vec<CdEntry>,
}

pub struct ZipWriter {
    namer: SegmentNamer,
    max_size: Option<u64>,
    translate: TranslateMode,
    current: Option<ZipSegment>,
}

impl ZipWriter {
    pub fn factory(options: &ExportOptions, _unit_name: &str) -> Result<Box<dyn ContainerWriter>> {
        Ok(Box::new(ZipWriter {
            namer: SegmentNamer::new(&options.output_dir, options.prefix.clone(), ZIP_EXTENSION),
            max_size: options.max_segment_size,
            translate: options.translate,
            current: None,
        }))
    }

    fn open_segment(&mut self) -> Result<PathBuf> {
        let path = self.namer.next_path();
        log::debug!("Opening segment {}", path.display());
        let file = File::create(&path)?;
        self.current = Some(ZipSegment {
            out: CountingWriter::new(BufWriter::new(file)),
            entries: Vec::new(),
        });
        Ok(path)
    }

    /// Write the central directory and end record, then drop the file.
    fn finish_segment(&mut self) -> Result<()> {
        let Some(mut seg) = self.current.take() else {
            return Ok(());
        };

        let cd_offset = seg.out.written();
        for entry in &seg.entries {
            let mut header = Vec::with_capacity(46 + entry.name.len() + entry.comment.len());
            header.extend_from_slice(&CENTRAL_HEADER_SIG.to_le_bytes());
            header.extend_from_slice(&VERSION_MADE_BY.to_le_bytes());
            header.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
            header.extend_from_slice(&FLAG_UTF8.to_le_bytes());
            header.extend_from_slice(&METHOD_STORED.to_le_bytes());
            header.extend_from_slice(&entry.dos_time.to_le_bytes());
            header.extend_from_slice(&entry.dos_date.to_le_bytes());
            header.extend_from_slice(&entry.crc.to_le_bytes());
            header.extend_from_slice(&entry.size.to_le_bytes()); // compressed
            header.extend_from_slice(&entry.size.to_le_bytes()); // uncompressed
            header.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            header.extend_from_slice(&0u16.to_le_bytes()); // extra
            header.extend_from_slice(&(entry.comment.len() as u16).to_le_bytes());
            header.extend_from_slice(&0u16.to_le_bytes()); // disk number
            header.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            header.extend_from_slice(&0u32.to_le_bytes()); // external attrs
            header.extend_from_slice(&entry.offset.to_le_bytes());
            header.extend_from_slice(&entry.name);
            header.extend_from_slice(&entry.comment);
            seg.out.write_all(&header)?;
        }
        let cd_size = seg.out.written() - cd_offset;

        let eocd = eocd_record(seg.entries.len(), cd_size, cd_offset)?;
        seg.out.write_all(&eocd)?;
        seg.out.flush()?;
        Ok(())
    }
}

/// End-of-central-directory record. The classic format caps the entry
/// count at u16 and the directory size/offset at u32; past that the
/// archive would need ZIP64, which these exports do not emit, so the
/// overflow surfaces as an error instead of a truncated trailer.
fn eocd_record(entries: usize, cd_size: u64, cd_offset: u64) -> Result<Vec<u8>> {
    let count = u16::try_from(entries)
        .map_err(|_| AppError::export("zip segment", "more than 65535 entries"))?;
    let cd_size = u32::try_from(cd_size)
        .map_err(|_| AppError::export("zip segment", "central directory exceeds 4 GiB ZIP limit"))?;
    let cd_offset = u32::try_from(cd_offset).map_err(|_| {
        AppError::export("zip segment", "central directory offset exceeds 4 GiB ZIP limit")
    })?;

    let mut eocd = Vec::with_capacity(22);
    eocd.extend_from_slice(&EOCD_SIG.to_le_bytes());
    eocd.extend_from_slice(&0u16.to_le_bytes()); // this disk
    eocd.extend_from_slice(&0u16.to_le_bytes()); // cd disk
    eocd.extend_from_slice(&count.to_le_bytes());
    eocd.extend_from_slice(&count.to_le_bytes());
    eocd.extend_from_slice(&cd_size.to_le_bytes());
    eocd.extend_from_slice(&cd_offset.to_le_bytes());
    eocd.extend_from_slice(&0u16.to_le_bytes()); // archive comment
    Ok(eocd)
}

impl ContainerWriter for ZipWriter {
    fn open(&mut self) -> Result<()> {
        // File creation is deferred until the first successful entry.
        Ok(())
    }

    fn write_version(&mut self, version: &dyn ContentVersion) -> Result<()> {
        if let Some(seg) = &self.current {
            if reached_cap(seg.out.written(), self.max_size) {
                self.finish_segment()?;
            }
        }

        // Stage the entry fully before touching the file, so a failing
        // version never leaves a truncated entry (or an empty archive).
        let name = self.translate.translate(version.url()).into_bytes();
        let comment = truncate_comment(response_head(version));

        let mut body = Vec::with_capacity(version.size() as usize);
        version.open()?.read_to_end(&mut body)?;
        let size = u32::try_from(body.len())
            .map_err(|_| AppError::export(version.url(), "entry exceeds 4 GiB ZIP limit"))?;
        let crc = crc32fast::hash(&body);
        let (dos_time, dos_date) = dos_datetime(entry_mtime(version));

        if self.current.is_none() {
            self.open_segment()?;
        }
        let seg = self
            .current
            .as_mut()
            .ok_or_else(|| AppError::export(version.url(), "no open segment"))?;

        let offset = u32::try_from(seg.out.written())
            .map_err(|_| AppError::export(version.url(), "segment exceeds 4 GiB ZIP limit"))?;

        let mut header = Vec::with_capacity(30 + name.len());
        header.extend_from_slice(&LOCAL_HEADER_SIG.to_le_bytes());
        header.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
        header.extend_from_slice(&FLAG_UTF8.to_le_bytes());
        header.extend_from_slice(&METHOD_STORED.to_le_bytes());
        header.extend_from_slice(&dos_time.to_le_bytes());
        header.extend_from_slice(&dos_date.to_le_bytes());
        header.extend_from_slice(&crc.to_le_bytes());
        header.extend_from_slice(&size.to_le_bytes()); // compressed
        header.extend_from_slice(&size.to_le_bytes()); // uncompressed
        header.extend_from_slice(&(name.len() as u16).to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes()); // extra
        header.extend_from_slice(&name);

        seg.out.write_all(&header)?;
        seg.out.write_all(&body)?;

        seg.entries.push(CdEntry {
            name,
            comment,
            crc,
            size,
            dos_time,
            dos_date,
            offset,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.finish_segment()
    }

    fn segments(&self) -> u32 {
        self.namer.segments()
    }
}

/// Entry timestamp: a parseable stored `Last-Modified` header wins,
/// anything else silently falls back to now.
fn entry_mtime(version: &dyn ContentVersion) -> NaiveDateTime {
    version
        .header("last-modified")
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|t| t.naive_utc())
        .unwrap_or_else(|| Utc::now().naive_utc())
}

/// MS-DOS packed date/time, clamped to the 1980 epoch floor.
fn dos_datetime(t: NaiveDateTime) -> (u16, u16) {
    let year = t.year().max(1980);
    let date = (((year - 1980) as u16) << 9) | ((t.month() as u16) << 5) | (t.day() as u16);
    let time =
        ((t.hour() as u16) << 11) | ((t.minute() as u16) << 5) | ((t.second() as u16) / 2);
    (time, date)
}

/// Comment fields are length-prefixed with a u16.
fn truncate_comment(mut comment: Vec<u8>) -> Vec<u8> {
    comment.truncate(u16::MAX as usize);
    comment
}
