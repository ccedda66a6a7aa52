//! Core data model: archival unit capability traits and the fetch-time
//! metadata record.

pub mod record;
pub mod unit;

pub use record::{EXPORT_SCHEMA_VERSION, FetchRecord};
pub use unit::{ArchivalUnit, ContentNode, ContentVersion, MemoryNode, MemoryUnit, MemoryVersion};
