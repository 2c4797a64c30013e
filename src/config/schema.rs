//! Configuration schema for swift-sh
//!
//! Configuration is stored at `~/.config/swift-sh/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Toolchain settings
    pub toolchain: ToolchainConfig,

    /// Dependency declaration settings
    pub dependencies: DependenciesConfig,

    /// Cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Swift toolchain settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// `swift` driver; `swiftc` is looked up next to it
    pub swift_path: PathBuf,

    /// Build dependencies with `-c release`
    pub build_dependencies_in_release_mode: bool,

    /// Pass `--disable-sandbox` when resolving dependencies
    pub disable_sandbox_for_package_resolution: bool,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            swift_path: PathBuf::from("swift"),
            build_dependencies_in_release_mode: true,
            disable_sandbox_for_package_resolution: false,
        }
    }
}

/// Dependency settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependenciesConfig {
    /// Fetch `@owner/repo` dependencies over SSH
    pub use_ssh_for_github: bool,

    /// Run scripts without dependencies directly, without a package
    pub skip_package_on_no_remote_modules: bool,
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            use_ssh_for_github: false,
            skip_package_on_no_remote_modules: true,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root (default: platform cache directory)
    pub root: Option<PathBuf>,

    /// Hours after which a dependencies manifest is rewritten
    pub staleness_hours: u64,

    /// Reuse the recorded invocation of a fresh entry without the toolchain
    pub reuse_resolved_invocation: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            staleness_hours: 168,
            reuse_resolved_invocation: true,
        }
    }
}

impl CacheConfig {
    /// Cache root, defaulting to `<cache dir>/swift-sh`
    pub fn resolved_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("swift-sh")
        })
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_hours.saturating_mul(3600))
    }
}
