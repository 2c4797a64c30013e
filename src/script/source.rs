//! Where a script's content comes from

use crate::cache::ScriptIdentity;
use crate::error::{SwiftShError, SwiftShResult};
use std::fs::Permissions;
use std::io::{ErrorKind, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::io::AsyncRead;
use tracing::debug;

/// Argument naming stdin instead of a script path
pub const STDIN_SENTINEL: &str = "-";

const TEMP_PREFIX: &str = "swift-sh-inline-content-";
const TEMP_SUFFIX: &str = ".swift";

/// Kind of script source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Regular file, read again by the toolchain
    File,
    /// Named pipe or character device, readable once
    Pipe,
    /// Standard input
    Stdin,
    /// Content given on the command line, or a private copy of a script
    Inline,
}

/// A script to parse and run
#[derive(Debug)]
pub struct ScriptSource {
    kind: SourceKind,
    /// File the toolchain runs; `None` when the content must be piped
    run_path: Option<PathBuf>,
    /// Absolute path the user named, if any
    origin_path: Option<PathBuf>,
    /// Directory relative dependency paths are resolved against
    script_folder: PathBuf,
    /// Temporary file deleted with the source
    _temp: Option<TempPath>,
}

impl ScriptSource {
    /// Source for a path given on the command line (`-` is stdin)
    pub fn from_path(path: &Path) -> SwiftShResult<Self> {
        if path == Path::new(STDIN_SENTINEL) {
            return Self::from_stdin();
        }

        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SwiftShError::ScriptNotFound(path.to_path_buf()),
            _ => SwiftShError::io(format!("reading metadata of {}", path.display()), e),
        })?;
        if metadata.is_dir() {
            return Err(SwiftShError::ScriptIsDirectory(path.to_path_buf()));
        }

        let absolute = absolute_path(path)?;
        let script_folder = absolute
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        let (kind, run_path) = if metadata.is_file() {
            (SourceKind::File, Some(absolute.clone()))
        } else {
            debug!("{} is not a regular file, reading it once", path.display());
            (SourceKind::Pipe, None)
        };

        Ok(Self {
            kind,
            run_path,
            origin_path: Some(absolute),
            script_folder,
            _temp: None,
        })
    }

    /// Source reading the script from stdin
    pub fn from_stdin() -> SwiftShResult<Self> {
        Ok(Self {
            kind: SourceKind::Stdin,
            run_path: None,
            origin_path: None,
            script_folder: current_dir()?,
            _temp: None,
        })
    }

    /// Source for inline content, written to a read-only temporary file
    pub fn from_content(content: &str) -> SwiftShResult<Self> {
        let temp = write_temp(content.as_bytes(), 0o400)?;
        Ok(Self {
            kind: SourceKind::Inline,
            run_path: Some(temp.to_path_buf()),
            origin_path: None,
            script_folder: current_dir()?,
            _temp: Some(temp),
        })
    }

    /// Private temporary copy of the script at `path` (`-` is stdin)
    ///
    /// Relative dependency paths still resolve against the original
    /// script's directory.
    pub async fn copying(path: &Path) -> SwiftShResult<Self> {
        let (content, origin_path, script_folder) = if path == Path::new(STDIN_SENTINEL) {
            let mut content = Vec::new();
            tokio::io::AsyncReadExt::read_to_end(&mut tokio::io::stdin(), &mut content)
                .await
                .map_err(|e| SwiftShError::io("reading script from stdin", e))?;
            (content, None, current_dir()?)
        } else {
            let original = Self::from_path(path)?;
            let content = tokio::fs::read(path)
                .await
                .map_err(|e| SwiftShError::io(format!("reading script {}", path.display()), e))?;
            (content, original.origin_path, original.script_folder)
        };

        let temp = write_temp(&content, 0o600)?;
        Ok(Self {
            kind: SourceKind::Inline,
            run_path: Some(temp.to_path_buf()),
            origin_path,
            script_folder,
            _temp: Some(temp),
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Whether the toolchain can read the script from a file itself
    pub fn is_replayable(&self) -> bool {
        self.run_path.is_some()
    }

    pub fn run_path(&self) -> Option<&Path> {
        self.run_path.as_deref()
    }

    pub fn origin_path(&self) -> Option<&Path> {
        self.origin_path.as_deref()
    }

    pub fn script_folder(&self) -> &Path {
        &self.script_folder
    }

    /// Script argument for the toolchain: the file path, or `-` for stdin
    pub fn script_arg(&self) -> String {
        match &self.run_path {
            Some(path) => path.display().to_string(),
            None => STDIN_SENTINEL.to_string(),
        }
    }

    /// Marker identity of the script, given the hash of its content
    pub fn identity(&self, content_hash: &str) -> ScriptIdentity {
        match (self.kind, &self.origin_path) {
            (SourceKind::File, Some(path)) => ScriptIdentity::for_path(path),
            (SourceKind::Inline, _) => ScriptIdentity::inline_content(content_hash),
            _ => ScriptIdentity::stdin(content_hash),
        }
    }

    /// Open the script content for reading
    pub async fn reader(&self) -> SwiftShResult<Box<dyn AsyncRead + Unpin + Send>> {
        let path = match (&self.run_path, &self.origin_path) {
            (Some(path), _) | (None, Some(path)) => path,
            (None, None) => return Ok(Box::new(tokio::io::stdin())),
        };
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| SwiftShError::io(format!("opening script {}", path.display()), e))?;
        Ok(Box::new(file))
    }
}

fn current_dir() -> SwiftShResult<PathBuf> {
    std::env::current_dir().map_err(|e| SwiftShError::io("reading current directory", e))
}

fn absolute_path(path: &Path) -> SwiftShResult<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| SwiftShError::io(format!("resolving {}", path.display()), e))
}

fn write_temp(content: &[u8], mode: u32) -> SwiftShResult<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile()
        .map_err(|e| SwiftShError::io("creating temporary script", e))?;
    file.write_all(content)
        .and_then(|()| file.flush())
        .map_err(|e| SwiftShError::io("writing temporary script", e))?;

    let path = file.into_temp_path();
    std::fs::set_permissions(&path, Permissions::from_mode(mode))
        .map_err(|e| SwiftShError::io("restricting temporary script permissions", e))?;
    debug!("Temporary script at {}", path.display());
    Ok(path)
}
