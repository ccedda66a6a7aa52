//! ARC container framing.
//!
//! Each record is a space-delimited header line followed by the raw
//! payload. The declared length in the header line must equal the exact
//! payload byte count; a mismatch corrupts record-boundary parsing for
//! every downstream reader. Physical segments open with a `filedesc://`
//! version record so standard ARC tooling accepts them.

use std::io::Write;

use crate::error::{AppError, Result};
use crate::models::ContentVersion;
use crate::utils::timestamp14;

use super::headers::{response_head, strip_params};
use super::rotate::RotatingOutput;
use super::{ContainerWriter, ExportOptions, RecordMode};

const ARC_EXTENSION: &str = ".arc";
const NO_TYPE: &str = "no-type";

pub struct ArcWriter {
    out: RotatingOutput,
    mode: RecordMode,
    ip: String,
}

impl ArcWriter {
    pub fn factory(options: &ExportOptions, _unit_name: &str) -> Result<Box<dyn ContainerWriter>> {
        Ok(Box::new(ArcWriter {
            out: RotatingOutput::new(
                &options.output_dir,
                options.prefix.clone(),
                ARC_EXTENSION,
                options.max_segment_size,
            ),
            mode: options.mode,
            ip: options.ip.clone(),
        }))
    }

    /// Rotate if needed; a fresh segment gets its version record.
    fn ensure_segment(&mut self) -> Result<()> {
        if self.out.checkpoint()? {
            self.write_filedesc()?;
        }
        Ok(())
    }

    /// ARC version-1 block identifying the file, first record of every
    /// physical segment.
    fn write_filedesc(&mut self) -> Result<()> {
        let name = self
            .out
            .current_path()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("export.arc")
            .to_string();
        let body = format!(
            "1 0 {}\nURL IP-address Archive-date Content-type Archive-length\n",
            super::default_user_agent()
        );
        let line = format!(
            "filedesc://{} {} {} text/plain {}\n",
            name,
            self.ip,
            timestamp14(chrono::Utc::now()),
            body.len()
        );

        let w = self.out.writer()?;
        w.write_all(line.as_bytes())?;
        w.write_all(body.as_bytes())?;
        w.write_all(b"\n")?;
        Ok(())
    }

    fn write_record(
        &mut self,
        url: &str,
        content_type: &str,
        timestamp: &str,
        head: &[u8],
        version: &dyn ContentVersion,
    ) -> Result<()> {
        let declared = head.len() as u64 + version.size();
        let line = format!(
            "{} {} {} {} {}\n",
            url, content_type, self.ip, timestamp, declared
        );

        let mut stream = version.open()?;
        let w = self.out.writer()?;
        w.write_all(line.as_bytes())?;
        w.write_all(head)?;
        let copied = std::io::copy(&mut stream, w)?;
        if copied != version.size() {
            return Err(AppError::export(
                url,
                format!(
                    "content stream yielded {copied} bytes, stored length is {}",
                    version.size()
                ),
            ));
        }
        w.write_all(b"\n")?;
        Ok(())
    }
}

impl ContainerWriter for ArcWriter {
    fn open(&mut self) -> Result<()> {
        if self.out.ensure_open()? {
            self.write_filedesc()?;
        }
        Ok(())
    }

    fn write_version(&mut self, version: &dyn ContentVersion) -> Result<()> {
        self.ensure_segment()?;

        let url = version.url().to_string();
        let timestamp = timestamp14(version.fetch_time());
        let stored_type = version.content_type().map(strip_params);

        match self.mode {
            RecordMode::Response => {
                let head = response_head(version);
                let content_type = stored_type.unwrap_or(NO_TYPE).to_string();
                self.write_record(&url, &content_type, &timestamp, &head, version)
            }
            RecordMode::Resource => {
                let content_type = stored_type.unwrap_or(NO_TYPE).to_string();
                self.write_record(&url, &content_type, &timestamp, &[], version)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.out.close()
    }

    fn segments(&self) -> u32 {
        self.out.segments()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemoryVersion;
    use tempfile::TempDir;

    fn make_writer(dir: &std::path::Path, mode: RecordMode) -> Box<dyn ContainerWriter> {
        let options = ExportOptions {
            mode,
            ..ExportOptions::new(dir, "unit")
        };
        ArcWriter::factory(&options, "test-unit").unwrap()
    }

    fn read_single_segment(dir: &std::path::Path) -> String {
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(paths.len(), 1);
        paths.sort();
        String::from_utf8(std::fs::read(&paths[0]).unwrap()).unwrap()
    }

    #[test]
    fn response_record_declares_exact_payload_length() {
        let tmp = TempDir::new().unwrap();
        let mut writer = make_writer(tmp.path(), RecordMode::Response);

        let v = MemoryVersion::new("https://example.com/page", b"0123456789".to_vec())
            .with_content_type("text/html")
            .with_header("Content-Type", "text/html");

        writer.open().unwrap();
        writer.write_version(&v).unwrap();
        writer.close().unwrap();

        let content = read_single_segment(tmp.path());
        assert!(content.starts_with("filedesc://"));

        let head = response_head(&v);
        let expected = head.len() + 10;
        let record_line = content
            .lines()
            .find(|l| l.starts_with("https://example.com/page"))
            .unwrap();
        assert!(record_line.ends_with(&format!(" {expected}")));
        assert!(record_line.contains(" text/html 0.0.0.0 "));
        assert!(content.contains("HTTP/1.1 200 OK\r\n"));
        assert!(content.contains("0123456789"));
    }

    #[test]
    fn resource_record_carries_raw_content_only() {
        let tmp = TempDir::new().unwrap();
        let mut writer = make_writer(tmp.path(), RecordMode::Resource);

        let v = MemoryVersion::new("https://example.com/data", b"payload".to_vec())
            .with_content_type("application/pdf");

        writer.open().unwrap();
        writer.write_version(&v).unwrap();
        writer.close().unwrap();

        let content = read_single_segment(tmp.path());
        let record_line = content
            .lines()
            .find(|l| l.starts_with("https://example.com/data"))
            .unwrap();
        assert!(record_line.ends_with(" 7"));
        assert!(record_line.contains(" application/pdf "));
        assert!(!content.contains("HTTP/1.1"));
    }

    #[test]
    fn missing_content_type_becomes_no_type() {
        let tmp = TempDir::new().unwrap();
        let mut writer = make_writer(tmp.path(), RecordMode::Resource);

        let v = MemoryVersion::new("https://example.com/x", b"abc".to_vec());
        writer.open().unwrap();
        writer.write_version(&v).unwrap();
        writer.close().unwrap();

        let content = read_single_segment(tmp.path());
        assert!(content.contains("https://example.com/x no-type "));
    }

    #[test]
    fn segment_count_matches_size_cap() {
        let tmp = TempDir::new().unwrap();
        let options = ExportOptions {
            mode: RecordMode::Resource,
            max_segment_size: Some(200),
            ..ExportOptions::new(tmp.path(), "unit")
        };
        let mut writer = ArcWriter::factory(&options, "u").unwrap();

        writer.open().unwrap();
        for i in 0..4 {
            let v = MemoryVersion::new(format!("https://example.com/{i}"), vec![b'x'; 150]);
            writer.write_version(&v).unwrap();
        }
        writer.close().unwrap();

        // Each record (plus the filedesc preamble) crosses the 200-byte
        // cap, so every version lands in its own segment.
        assert_eq!(writer.segments(), 4);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 4);
    }

    #[test]
    fn short_stream_is_reported_per_record() {
        // A version lying about its size must surface as a record error.
        struct Lying(MemoryVersion);
        impl ContentVersion for Lying {
            fn url(&self) -> &str {
                self.0.url()
            }
            fn size(&self) -> u64 {
                99
            }
            fn fetch_time(&self) -> chrono::DateTime<chrono::Utc> {
                self.0.fetch_time()
            }
            fn content_type(&self) -> Option<&str> {
                self.0.content_type()
            }
            fn headers(&self) -> &[(String, String)] {
                self.0.headers()
            }
            fn open(&self) -> Result<Box<dyn std::io::Read + '_>> {
                self.0.open()
            }
        }

        let tmp = TempDir::new().unwrap();
        let mut writer = make_writer(tmp.path(), RecordMode::Resource);
        let v = Lying(MemoryVersion::new("https://example.com/lie", b"tiny".to_vec()));

        writer.open().unwrap();
        assert!(writer.write_version(&v).is_err());
    }
}
