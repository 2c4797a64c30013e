//! Error types for swift-sh
//!
//! All modules use `SwiftShResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for swift-sh operations
pub type SwiftShResult<T> = Result<T, SwiftShError>;

/// All errors that can occur in swift-sh
#[derive(Error, Debug)]
pub enum SwiftShError {
    // Script source errors
    #[error("Script not found: {0}")]
    ScriptNotFound(PathBuf),

    #[error("Script path is a directory: {0}")]
    ScriptIsDirectory(PathBuf),

    #[error("Cannot compile a script that does not have an extension: {0}")]
    ScriptWithoutExtension(PathBuf),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Toolchain errors
    #[error("Failed to launch {program}")]
    ToolchainSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot allocate a pseudo-terminal: {0}")]
    PtyAllocation(#[source] nix::Error),

    #[error("Cannot find the REPL invocation of the dependencies package. swift stderr:\n{stderr}")]
    ResolutionFailed { stderr: String },

    #[error("Interrupted by signal {0}")]
    Interrupted(i32),

    #[error("Compilation failed: {command}, exit code: {code}")]
    CompilationFailed { command: String, code: i32 },

    // Cache errors
    #[error("Failed to prepare cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwiftShError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a cache directory error
    pub fn cache_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CacheDir {
            path: path.into(),
            source,
        }
    }

    /// Process exit code reported for this error
    ///
    /// Scripts own every other exit code, so tool failures stay in a small
    /// fixed range.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ScriptNotFound(_) | Self::ScriptIsDirectory(_) | Self::ScriptWithoutExtension(_) => 2,
            Self::ToolchainSpawn { .. } | Self::PtyAllocation(_) | Self::ResolutionFailed { .. } => 3,
            Self::CacheDir { .. } | Self::Io { .. } | Self::CommandFailed { .. } => 4,
            Self::ConfigInvalid { .. }
            | Self::ConfigDirCreate { .. }
            | Self::Json(_)
            | Self::TomlSerialize(_) => 5,
            Self::CompilationFailed { .. } => 6,
            Self::Interrupted(signal) => (128 + signal).clamp(0, 255) as u8,
            Self::Internal(_) => 1,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ToolchainSpawn { .. } => {
                Some("Install a Swift toolchain or point to it with --swift-path")
            }
            Self::ResolutionFailed { .. } => {
                Some("Run with -vv to see the toolchain output, or clean the cache: swift-sh clean all")
            }
            Self::PtyAllocation(_) => Some("Check that /dev/ptmx is available"),
            _ => None,
        }
    }
}
