//! Configuration file for swift-sh
//!
//! Every setting has a default, so a missing file is not an error. Command
//! line flags are merged over the loaded values by the commands.

pub mod schema;

pub use schema::Config;

use crate::error::{SwiftShError, SwiftShResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Location of the TOML settings, from `--config` or the user config dir
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    /// The explicit path if given, else `<config dir>/swift-sh/config.toml`
    pub fn locate(explicit: Option<PathBuf>) -> Self {
        let path = explicit.unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("swift-sh")
                .join("config.toml")
        });
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    pub async fn load(&self) -> SwiftShResult<Config> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", self.path.display());
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(SwiftShError::io(
                    format!("reading config from {}", self.path.display()),
                    e,
                ))
            }
        };

        toml::from_str(&content).map_err(|e| SwiftShError::ConfigInvalid {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Write `config`, creating the directory when needed
    pub async fn save(&self, config: &Config) -> SwiftShResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|source| SwiftShError::ConfigDirCreate {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.path, content)
            .await
            .map_err(|e| SwiftShError::io(format!("writing config to {}", self.path.display()), e))?;
        info!("Configuration written to {}", self.path.display());
        Ok(())
    }
}
