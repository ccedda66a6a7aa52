// src/lib.rs

//! Conserv: archival content export toolkit.
//!
//! Exports preserved web content as ARC, WARC or ZIP containers and
//! writes incremental fetch-time reports driven by a persisted cursor.

pub mod config;
pub mod error;
pub mod export;
pub mod fetchtime;
pub mod models;
pub mod storage;
pub mod utils;
