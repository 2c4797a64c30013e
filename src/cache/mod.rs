//! Content-addressed cache of dependency packages
//!
//! Each distinct dependencies manifest gets a store entry named after the
//! SHA-256 of its content. The entry holds the generated package, the
//! toolchain build products and the recorded invocation.
//!
//! # Layout
//!
//! | Path | Description |
//! |------|-------------|
//! | `store/<hash>/Package.swift` | Generated manifest |
//! | `store/<hash>/empty.swift` | Placeholder target source |
//! | `store/<hash>/invocation.json` | Recorded toolchain invocation |
//! | `store/<hash>/.build/` | Toolchain build products |
//! | `markers/<name>--<discriminator>` | Link to `../store/<hash>` |
//!
//! Markers are only used for cleaning: an entry no marker points at is
//! unused and can be removed.

pub mod entry;
pub mod marker;
pub mod store;

pub use entry::CacheEntry;
pub use marker::{Marker, ScriptIdentity, UnusedReport};
pub use store::{CacheStore, DEFAULT_STALENESS};

use std::path::Path;
use walkdir::WalkDir;

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Total size of the regular files under `path`, without following links
pub fn disk_usage(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}
