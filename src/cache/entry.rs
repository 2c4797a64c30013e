//! Persisted resolution records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File holding the record inside a store entry
pub const ENTRY_FILE: &str = "invocation.json";

/// Resolved toolchain invocation of one store entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hex hash of the manifest the entry was resolved for
    pub hash: String,

    /// Store directory of the entry
    pub directory: PathBuf,

    /// Arguments to pass to the toolchain before the script path
    pub invocation_args: Vec<String>,

    /// Whether dependencies were built in release mode
    #[serde(default)]
    pub release_mode: bool,

    /// When the toolchain produced the invocation
    pub resolved_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        hash: impl Into<String>,
        directory: impl Into<PathBuf>,
        invocation_args: Vec<String>,
        release_mode: bool,
    ) -> Self {
        Self {
            hash: hash.into(),
            directory: directory.into(),
            invocation_args,
            release_mode,
            resolved_at: Utc::now(),
        }
    }

    /// Path of the record file
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(ENTRY_FILE)
    }

    /// Name of the build configuration the dependencies were built with
    pub fn configuration(&self) -> &'static str {
        if self.release_mode {
            "release"
        } else {
            "debug"
        }
    }
}
