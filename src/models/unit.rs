//! Capability traits over preserved content.
//!
//! An archival unit is an opaque, read-only collection of URLs, each with
//! an ordered list of immutable captured versions. The export pipelines
//! only ever consume these traits, so any content backend (an in-memory
//! fixture, a directory tree, a full repository) can be plugged in
//! without the exporters knowing about it.

use std::io::{Cursor, Read};

use chrono::{DateTime, Utc};

use crate::error::Result;

/// One immutable captured representation of a URL.
pub trait ContentVersion {
    /// The URL this version was captured from.
    fn url(&self) -> &str;

    /// Exact byte length of the content.
    fn size(&self) -> u64;

    /// Instant the content was fetched.
    fn fetch_time(&self) -> DateTime<Utc>;

    /// Stored content type, if any.
    fn content_type(&self) -> Option<&str>;

    /// Captured response headers, in stored order.
    fn headers(&self) -> &[(String, String)];

    /// Open the content byte stream. The stream is released when the
    /// returned reader is dropped, on every exit path.
    fn open(&self) -> Result<Box<dyn Read + '_>>;

    /// Look up a single header value, case-insensitively.
    fn header(&self, name: &str) -> Option<&str> {
        self.headers()
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A URL within an archival unit, carrying its version history.
pub trait ContentNode {
    /// The node's URL.
    fn url(&self) -> &str;

    /// Whether the node has any material content to export.
    fn has_content(&self) -> bool;

    /// Up to `max` versions, most recent first.
    fn versions(&self, max: usize) -> Result<Vec<Box<dyn ContentVersion + '_>>>;
}

/// A read-only collection of content nodes. Export never mutates it.
pub trait ArchivalUnit {
    /// Human-readable name of the unit.
    fn name(&self) -> &str;

    /// Enumerate all nodes in the unit.
    fn nodes(&self) -> Result<Vec<Box<dyn ContentNode + '_>>>;
}

/// In-memory content version, for fixtures and small units.
#[derive(Debug, Clone)]
pub struct MemoryVersion {
    url: String,
    body: Vec<u8>,
    fetch_time: DateTime<Utc>,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
}

impl MemoryVersion {
    pub fn new(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            fetch_time: Utc::now(),
            content_type: None,
            headers: Vec::new(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_fetch_time(mut self, fetch_time: DateTime<Utc>) -> Self {
        self.fetch_time = fetch_time;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl ContentVersion for MemoryVersion {
    fn url(&self) -> &str {
        &self.url
    }

    fn size(&self) -> u64 {
        self.body.len() as u64
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
        Ok(Box::new(Cursor::new(self.body.as_slice())))
    }
}

/// In-memory content node holding its versions most recent first.
#[derive(Debug, Clone)]
pub struct MemoryNode {
    url: String,
    versions: Vec<MemoryVersion>,
}

impl MemoryNode {
    /// Create a node from versions ordered most recent first.
    pub fn new(url: impl Into<String>, versions: Vec<MemoryVersion>) -> Self {
        Self {
            url: url.into(),
            versions,
        }
    }
}

impl ContentNode for MemoryNode {
    fn url(&self) -> &str {
        &self.url
    }

    fn has_content(&self) -> bool {
        !self.versions.is_empty()
    }

    fn versions(&self, max: usize) -> Result<Vec<Box<dyn ContentVersion + '_>>> {
        Ok(self
            .versions
            .iter()
            .take(max)
            .map(|v| Box::new(v.clone()) as Box<dyn ContentVersion>)
            .collect())
    }
}

/// In-memory archival unit.
#[derive(Debug, Clone, Default)]
pub struct MemoryUnit {
    name: String,
    nodes: Vec<MemoryNode>,
}

impl MemoryUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: MemoryNode) -> Self {
        self.nodes.push(node);
        self
    }
}

impl ArchivalUnit for MemoryUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn nodes(&self) -> Result<Vec<Box<dyn ContentNode + '_>>> {
        Ok(self
            .nodes
            .iter()
            .map(|n| Box::new(n.clone()) as Box<dyn ContentNode>)
            .collect())
    }
}
