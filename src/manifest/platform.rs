//! Deployment platform written into the generated manifest

use std::fmt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Highest macOS version the 5.7 tools format can name
const MAX_MACOS_MAJOR: u64 = 13;

/// Platform clause of the dependencies package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformSpec {
    /// Running on macOS at the given version
    MacOs { major: u64, minor: u64 },
    /// No platform constraint (`nil`)
    Unspecified,
}

impl PlatformSpec {
    /// Detect the host platform
    ///
    /// Off macOS this is always `Unspecified`. On macOS the version comes
    /// from `sw_vers`; if that fails the clause is left unspecified.
    pub async fn detect() -> Self {
        if !cfg!(target_os = "macos") {
            return Self::Unspecified;
        }

        let output = match Command::new("sw_vers").arg("-productVersion").output().await {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                warn!("sw_vers exited with {}", output.status);
                return Self::Unspecified;
            }
            Err(e) => {
                warn!("Cannot run sw_vers: {}", e);
                return Self::Unspecified;
            }
        };

        let version = String::from_utf8_lossy(&output.stdout);
        match Self::parse_product_version(&version) {
            Some(platform) => {
                debug!("Detected platform {}", platform);
                platform
            }
            None => {
                warn!("Unexpected sw_vers output: {}", version.trim());
                Self::Unspecified
            }
        }
    }

    /// Parse `14.2.1`-style product versions
    pub fn parse_product_version(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(minor) => minor.parse().ok()?,
            None => 0,
        };
        Some(Self::MacOs { major, minor })
    }
}

impl fmt::Display for PlatformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::MacOs { major, minor } if major <= 10 => {
                write!(f, "[.macOS(.v{}_{})]", major, minor)
            }
            Self::MacOs { major, .. } => write!(f, "[.macOS(.v{})]", major.min(MAX_MACOS_MAJOR)),
            Self::Unspecified => write!(f, "nil"),
        }
    }
}
