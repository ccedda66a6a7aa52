//! WARC 1.0 container framing.
//!
//! Every physical segment opens with a `warcinfo` record describing the
//! writer and the archival unit; content goes out as `response` records
//! (synthetic HTTP message payload) or `resource` records (raw content).
//! Each record carries a fresh `urn:uuid` id, a date derived from the
//! stored fetch time, and a sha256 digest of its block.

use std::io::{Read, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::ContentVersion;

use super::headers::{response_head, strip_params};
use super::rotate::RotatingOutput;
use super::{ContainerWriter, ExportOptions, RecordMode};

const WARC_EXTENSION: &str = ".warc";
const WARC_VERSION: &str = "WARC/1.0";
const CRLF: &str = "\r\n";

pub struct WarcWriter {
    out: RotatingOutput,
    mode: RecordMode,
    unit_name: String,
    user_agent: String,
    ip: String,
}

impl WarcWriter {
    pub fn factory(options: &ExportOptions, unit_name: &str) -> Result<Box<dyn ContainerWriter>> {
        Ok(Box::new(WarcWriter {
            out: RotatingOutput::new(
                &options.output_dir,
                options.prefix.clone(),
                WARC_EXTENSION,
                options.max_segment_size,
            ),
            mode: options.mode,
            unit_name: unit_name.to_string(),
            user_agent: options.user_agent.clone(),
            ip: options.ip.clone(),
        }))
    }

    fn ensure_segment(&mut self) -> Result<()> {
        if self.out.checkpoint()? {
            self.write_warcinfo()?;
        }
        Ok(())
    }

    /// Descriptive metadata block, once per physical file on (re)open.
    fn write_warcinfo(&mut self) -> Result<()> {
        let file_name = self
            .out
            .current_path()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("export.warc")
            .to_string();
        let now = Utc::now();

        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let mut fields = String::new();
        fields.push_str(&format!("software: {}{CRLF}", super::default_user_agent()));
        fields.push_str(&format!("ip: {}{CRLF}", self.ip));
        fields.push_str(&format!("hostname: {hostname}{CRLF}"));
        fields.push_str(&format!("created: {}{CRLF}", warc_date(now)));
        fields.push_str(&format!("isPartOf: {}{CRLF}", self.unit_name));
        fields.push_str(&format!("robots: ignore{CRLF}"));
        fields.push_str(&format!("http-header-user-agent: {}{CRLF}", self.user_agent));
        let block = fields.into_bytes();

        let mut header = String::new();
        header.push_str(WARC_VERSION);
        header.push_str(CRLF);
        header.push_str(&format!("WARC-Type: warcinfo{CRLF}"));
        header.push_str(&format!("WARC-Record-ID: {}{CRLF}", new_record_id()));
        header.push_str(&format!("WARC-Date: {}{CRLF}", warc_date(now)));
        header.push_str(&format!("WARC-Filename: {file_name}{CRLF}"));
        header.push_str(&format!("Content-Type: application/warc-fields{CRLF}"));
        header.push_str(&format!("Content-Length: {}{CRLF}", block.len()));
        header.push_str(CRLF);

        let w = self.out.writer()?;
        w.write_all(header.as_bytes())?;
        w.write_all(&block)?;
        w.write_all(CRLF.as_bytes())?;
        w.write_all(CRLF.as_bytes())?;
        Ok(())
    }

    fn write_record(
        &mut self,
        warc_type: &str,
        content_type: &str,
        head: &[u8],
        version: &dyn ContentVersion,
    ) -> Result<()> {
        // First pass over the content computes the block digest and the
        // true block length; the second pass writes the bytes. Versions
        // are immutable, so both passes see the same content.
        let (digest, body_len) = digest_block(head, version)?;
        let block_len = head.len() as u64 + body_len;

        let mut header = String::new();
        header.push_str(WARC_VERSION);
        header.push_str(CRLF);
        header.push_str(&format!("WARC-Type: {warc_type}{CRLF}"));
        header.push_str(&format!("WARC-Record-ID: {}{CRLF}", new_record_id()));
        header.push_str(&format!("WARC-Date: {}{CRLF}", warc_date(version.fetch_time())));
        header.push_str(&format!("WARC-Target-URI: {}{CRLF}", version.url()));
        header.push_str(&format!("WARC-IP-Address: {}{CRLF}", self.ip));
        header.push_str(&format!("WARC-Block-Digest: sha256:{digest}{CRLF}"));
        header.push_str(&format!("Content-Type: {content_type}{CRLF}"));
        header.push_str(&format!("Content-Length: {block_len}{CRLF}"));
        header.push_str(CRLF);

        let mut stream = version.open()?;
        let w = self.out.writer()?;
        w.write_all(header.as_bytes())?;
        w.write_all(head)?;
        let copied = std::io::copy(&mut stream, w)?;
        if copied != body_len {
            return Err(AppError::export(
                version.url(),
                format!("content stream yielded {copied} bytes, digest pass saw {body_len}"),
            ));
        }
        w.write_all(CRLF.as_bytes())?;
        w.write_all(CRLF.as_bytes())?;
        Ok(())
    }
}

impl ContainerWriter for WarcWriter {
    fn open(&mut self) -> Result<()> {
        if self.out.ensure_open()? {
            self.write_warcinfo()?;
        }
        Ok(())
    }

    fn write_version(&mut self, version: &dyn ContentVersion) -> Result<()> {
        self.ensure_segment()?;

        match self.mode {
            RecordMode::Response => {
                let head = response_head(version);
                self.write_record("response", "application/http; msgtype=response", &head, version)
            }
            RecordMode::Resource => {
                let content_type = version
                    .content_type()
                    .map(strip_params)
                    .unwrap_or("application/octet-stream")
                    .to_string();
                self.write_record("resource", &content_type, &[], version)
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

/// Freshly generated unique record identifier.
fn new_record_id() -> String {
    format!("<urn:uuid:{}>", Uuid::new_v4())
}

/// UTC timestamp in the WARC-Date profile of ISO 8601.
fn warc_date(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Sha256 over head + content, with the observed content length.
fn digest_block(head: &[u8], version: &dyn ContentVersion) -> Result<(String, u64)> {
    let mut hasher = Sha256::new();
    hasher.update(head);

    let mut stream = version.open()?;
    let mut buf = [0u8; 8192];
    let mut body_len = 0u64;
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        body_len += n as u64;
    }
    Ok((hex::encode(hasher.finalize()), body_len))
}
