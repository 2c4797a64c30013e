//! Content-addressed store of dependency packages
//!
//! Entries are never locked: two runs resolving the same hash at the same
//! time both run the toolchain in the same directory and the last record
//! written wins.

use crate::cache::entry::{CacheEntry, ENTRY_FILE};
use crate::error::{SwiftShError, SwiftShResult};
use crate::manifest::{Manifest, MANIFEST_FILE, PLACEHOLDER_SOURCE};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, trace, warn};

/// Directory of store entries under the cache root
pub const STORE_DIR: &str = "store";

/// Directory of alias markers under the cache root
pub const MARKERS_DIR: &str = "markers";

/// Build products directory the toolchain creates in an entry
pub const BUILD_DIR: &str = ".build";

/// Default age after which a manifest is rewritten
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Handle on the cache root
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    staleness: Duration,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>, staleness: Duration) -> Self {
        Self {
            root: root.into(),
            staleness,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root.join(STORE_DIR)
    }

    pub fn markers_dir(&self) -> PathBuf {
        self.root.join(MARKERS_DIR)
    }

    /// Directory of the entry for `hash`, created if absent
    pub async fn resolve(&self, hash: &str) -> SwiftShResult<PathBuf> {
        let dir = self.store_dir().join(hash);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| SwiftShError::cache_dir(&dir, e))?;
        trace!("Store entry at {}", dir.display());
        Ok(dir)
    }

    /// Whether the manifest in `dir` must be (re)written
    ///
    /// True when it is missing, differs from `manifest`, or was last written
    /// longer ago than the staleness threshold.
    pub async fn needs_refresh(&self, dir: &Path, manifest: &[u8]) -> SwiftShResult<bool> {
        let path = dir.join(MANIFEST_FILE);

        let existing = match fs::read(&path).await {
            Ok(existing) => existing,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No manifest in {}", dir.display());
                return Ok(true);
            }
            Err(e) => {
                return Err(SwiftShError::io(
                    format!("reading manifest {}", path.display()),
                    e,
                ))
            }
        };

        if existing != manifest {
            debug!("Manifest in {} differs", dir.display());
            return Ok(true);
        }

        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| SwiftShError::io(format!("reading metadata of {}", path.display()), e))?;
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .unwrap_or_default();

        if age > self.staleness {
            debug!("Manifest in {} is stale ({}s old)", dir.display(), age.as_secs());
            return Ok(true);
        }
        Ok(false)
    }

    /// Write the manifest and the placeholder source into `dir`
    pub async fn materialize(&self, dir: &Path, manifest: &Manifest) -> SwiftShResult<()> {
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, manifest.as_bytes())
            .await
            .map_err(|e| SwiftShError::io(format!("writing manifest {}", path.display()), e))?;
        self.ensure_placeholder(dir).await
    }

    /// Create the empty source file of the dependencies target if missing
    pub async fn ensure_placeholder(&self, dir: &Path) -> SwiftShResult<()> {
        let path = dir.join(PLACEHOLDER_SOURCE);
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }
        fs::write(&path, b"")
            .await
            .map_err(|e| SwiftShError::io(format!("writing {}", path.display()), e))
    }

    /// Recorded invocation of the entry in `dir`, if still usable
    ///
    /// Missing, unreadable or mismatched records, and entries whose build
    /// directory is gone, yield `None`.
    pub async fn load_entry(&self, dir: &Path, hash: &str) -> Option<CacheEntry> {
        let path = dir.join(ENTRY_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Cannot read {}: {}", path.display(), e);
                }
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring corrupt record {}: {}", path.display(), e);
                return None;
            }
        };

        if entry.hash != hash {
            debug!("Record in {} is for another manifest", dir.display());
            return None;
        }
        if !fs::try_exists(dir.join(BUILD_DIR)).await.unwrap_or(false) {
            debug!("Build directory missing in {}", dir.display());
            return None;
        }
        Some(entry)
    }

    /// Persist the resolution record of an entry
    pub async fn save_entry(&self, entry: &CacheEntry) -> SwiftShResult<()> {
        let path = entry.file_path();
        let content = serde_json::to_string_pretty(entry)?;
        fs::write(&path, content)
            .await
            .map_err(|e| SwiftShError::io(format!("writing record {}", path.display()), e))?;
        debug!("Saved invocation record {}", path.display());
        Ok(())
    }

    /// Remove a file, directory tree or link, ignoring missing paths
    pub async fn remove_path(path: &Path) -> SwiftShResult<bool> {
        let metadata = match fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(SwiftShError::io(format!("inspecting {}", path.display()), e))
            }
        };

        let result = if metadata.is_dir() {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_file(path).await
        };
        result.map_err(|e| SwiftShError::io(format!("removing {}", path.display()), e))?;
        debug!("Removed {}", path.display());
        Ok(true)
    }

    /// Remove the whole cache
    pub async fn remove_all(&self) -> SwiftShResult<bool> {
        Self::remove_path(&self.root).await
    }
}
