//! Alias markers from scripts to store entries
//!
//! A marker is a relative symbolic link `markers/<name>--<discriminator>`
//! pointing at `../store/<hash>`. Markers are advisory: nothing reads them
//! when running a script, they only tell `clean` which entries are in use.

use crate::cache::store::{CacheStore, STORE_DIR};
use crate::error::{SwiftShError, SwiftShResult};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Marker name of scripts read from stdin or a pipe
pub const STDIN_NAME: &str = "stdin";

/// Marker name of scripts given inline with `-c`
pub const INLINE_CONTENT_NAME: &str = "inline-content";

const SEPARATOR: &str = "--";

/// Name under which a script is recorded in the marker index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptIdentity {
    name: String,
    discriminator: String,
}

impl ScriptIdentity {
    /// Identity of a script file, from its stem and absolute path
    pub fn for_path(absolute_path: &Path) -> Self {
        let name = absolute_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        let discriminator = hex::encode(Sha256::digest(
            absolute_path.as_os_str().as_encoded_bytes(),
        ));
        Self {
            name,
            discriminator,
        }
    }

    /// Identity of a script read from stdin, keyed by its content hash
    pub fn stdin(content_hash: &str) -> Self {
        Self {
            name: STDIN_NAME.to_string(),
            discriminator: content_hash.to_string(),
        }
    }

    /// Identity of inline script content, keyed by its content hash
    pub fn inline_content(content_hash: &str) -> Self {
        Self {
            name: INLINE_CONTENT_NAME.to_string(),
            discriminator: content_hash.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name of the marker
    pub fn marker_name(&self) -> String {
        format!("{}{}{}", self.name, SEPARATOR, self.discriminator)
    }
}

impl fmt::Display for ScriptIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marker_name())
    }
}

/// One link found in the markers directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub path: PathBuf,
    /// Hash of the store entry the link points at, when readable
    pub entry_hash: Option<String>,
    /// Whether the link target exists
    pub live: bool,
}

impl Marker {
    /// Whether the marker belongs to stdin or inline content
    pub fn is_ephemeral(&self) -> bool {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy())
            .is_some_and(|name| {
                [STDIN_NAME, INLINE_CONTENT_NAME]
                    .iter()
                    .any(|prefix| name.starts_with(&format!("{}{}", prefix, SEPARATOR)))
            })
    }
}

/// Store entries and markers not needed by any script
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnusedReport {
    /// Store entries no marker points at
    pub entries: Vec<PathBuf>,
    /// Markers whose entry is gone
    pub dangling_markers: Vec<PathBuf>,
}

impl CacheStore {
    /// Location of the marker for `identity`
    pub fn marker_path(&self, identity: &ScriptIdentity) -> PathBuf {
        self.markers_dir().join(identity.marker_name())
    }

    /// Point the marker of `identity` at the entry for `hash`
    ///
    /// Best-effort: failures are logged and otherwise ignored.
    pub async fn write_marker(&self, identity: &ScriptIdentity, hash: &str) {
        let path = self.marker_path(identity);
        if let Err(e) = self.try_write_marker(&path, hash).await {
            warn!("Failed to create marker {}: {}", path.display(), e);
        }
    }

    async fn try_write_marker(&self, path: &Path, hash: &str) -> std::io::Result<()> {
        fs::create_dir_all(self.markers_dir()).await?;
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        let target = Path::new("..").join(STORE_DIR).join(hash);
        fs::symlink(&target, path).await?;
        debug!("Marker {} -> {}", path.display(), target.display());
        Ok(())
    }

    /// Every marker in the index, sorted by path
    pub async fn markers(&self) -> SwiftShResult<Vec<Marker>> {
        let dir = self.markers_dir();
        let mut markers = Vec::new();

        for path in list_dir(&dir).await? {
            let (entry_hash, live) = match fs::read_link(&path).await {
                Ok(target) => {
                    let hash = target
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned());
                    let live = fs::try_exists(dir.join(&target)).await.unwrap_or(false);
                    (hash, live)
                }
                Err(_) => (None, false),
            };
            markers.push(Marker {
                path,
                entry_hash,
                live,
            });
        }
        Ok(markers)
    }

    /// Markers of stdin and inline-content scripts
    pub async fn ephemeral_markers(&self) -> SwiftShResult<Vec<Marker>> {
        Ok(self
            .markers()
            .await?
            .into_iter()
            .filter(Marker::is_ephemeral)
            .collect())
    }

    /// Entries not referenced by a live marker, and markers pointing nowhere
    pub async fn unused(&self) -> SwiftShResult<UnusedReport> {
        let markers = self.markers().await?;
        let referenced: HashSet<&str> = markers
            .iter()
            .filter(|m| m.live)
            .filter_map(|m| m.entry_hash.as_deref())
            .collect();

        let entries = list_dir(&self.store_dir())
            .await?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy())
                    .is_some_and(|name| !referenced.contains(&*name))
            })
            .collect();

        let dangling_markers = markers
            .iter()
            .filter(|m| !m.live)
            .map(|m| m.path.clone())
            .collect();

        Ok(UnusedReport {
            entries,
            dangling_markers,
        })
    }
}

/// Sorted children of `dir`; a missing directory has none
async fn list_dir(dir: &Path) -> SwiftShResult<Vec<PathBuf>> {
    let mut read_dir = match fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SwiftShError::io(format!("listing {}", dir.display()), e)),
    };

    let mut paths = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| SwiftShError::io(format!("listing {}", dir.display()), e))?
    {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}
