// src/storage/mod.rs

//! Content backends implementing the archival unit traits.

pub mod dir_unit;

pub use dir_unit::DirectoryUnit;
