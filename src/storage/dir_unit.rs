// src/storage/dir_unit.rs

//! Archival unit backed by a plain directory tree.
//!
//! Every regular file under the root becomes a single-version node. The
//! node URL is the configured base URL joined with the file's relative
//! path, and the synthesized response headers carry the content type
//! inferred from the file extension, the byte length, and the file's
//! modification time. This is the simplest real content backend and the
//! one the command line exports from.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ArchivalUnit, ContentNode, ContentVersion};

/// Directory tree presented as an archival unit.
pub struct DirectoryUnit {
    name: String,
    root: PathBuf,
    base_url: Url,
}

impl DirectoryUnit {
    /// `base_url` is the URL the root directory maps to; relative file
    /// paths are joined onto it.
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(AppError::validation(format!(
                "content root {} is not a directory",
                root.display()
            )));
        }
        // Url::join treats a base without a trailing slash as a file,
        // which would drop the last path segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        Ok(Self {
            name,
            root,
            base_url,
        })
    }

    fn node_url(&self, path: &Path) -> Result<String> {
        let rel = path.strip_prefix(&self.root).map_err(|_| {
            AppError::validation(format!("{} is outside the content root", path.display()))
        })?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Ok(self.base_url.join(&rel)?.to_string())
    }
}

impl ArchivalUnit for DirectoryUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn nodes(&self) -> Result<Vec<Box<dyn ContentNode + '_>>> {
        let mut files = Vec::new();
        collect_files(&self.root, &mut files)?;
        files.sort();
        files
            .into_iter()
            .map(|path| {
                let url = self.node_url(&path)?;
                Ok(Box::new(FileNode { path, url }) as Box<dyn ContentNode>)
            })
            .collect()
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

struct FileNode {
    path: PathBuf,
    url: String,
}

impl ContentNode for FileNode {
    fn url(&self) -> &str {
        &self.url
    }

    fn has_content(&self) -> bool {
        true
    }

    fn versions(&self, max: usize) -> Result<Vec<Box<dyn ContentVersion + '_>>> {
        if max == 0 {
            return Ok(Vec::new());
        }
        // A plain file carries exactly one version.
        let meta = fs::metadata(&self.path)?;
        let size = meta.len();
        let fetch_time: DateTime<Utc> = meta.modified()?.into();
        let content_type = content_type_for(&self.path);

        let mut headers = Vec::new();
        if let Some(ct) = content_type {
            headers.push(("Content-Type".to_string(), ct.to_string()));
        }
        headers.push(("Content-Length".to_string(), size.to_string()));
        headers.push((
            "Last-Modified".to_string(),
            fetch_time.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        ));

        Ok(vec![Box::new(FileVersion {
            url: self.url.clone(),
            path: self.path.clone(),
            size,
            fetch_time,
            content_type: content_type.map(str::to_string),
            headers,
        })])
    }
}

struct FileVersion {
    url: String,
    path: PathBuf,
    size: u64,
    fetch_time: DateTime<Utc>,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
}

impl ContentVersion for FileVersion {
    fn url(&self) -> &str {
        &self.url
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn fetch_time(&self) -> DateTime<Utc> {
        self.fetch_time
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn open(&self) -> Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// Content type inferred from the file extension.
fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let ct = match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "txt" => "text/plain",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        _ => return None,
    };
    Some(ct)
}
