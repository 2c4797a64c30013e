//! Clean command - remove cached dependency packages

use super::open_store;
use crate::cache::{disk_usage, format_bytes, CacheStore, ScriptIdentity};
use crate::cli::args::CleanArgs;
use crate::config::Config;
use crate::error::{SwiftShError, SwiftShResult};
use console::style;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What a clean pass removes
#[derive(Debug, Clone, PartialEq, Eq)]
enum CleanTarget {
    /// The marker of one script
    Script(PathBuf),
    /// Entries no script refers to, and markers pointing nowhere
    Unused,
    /// Markers of stdin and inline-content scripts
    Ephemeral,
    /// The whole cache
    All,
}

impl CleanTarget {
    fn parse(arg: &str) -> Self {
        match arg {
            "unused" => Self::Unused,
            "ephemeral" => Self::Ephemeral,
            "all" => Self::All,
            path => Self::Script(PathBuf::from(path)),
        }
    }
}

/// Ordered targets for the given arguments
fn plan(args: &[String], end_with_unused: bool) -> Vec<CleanTarget> {
    let mut targets: Vec<CleanTarget> = args.iter().map(|a| CleanTarget::parse(a)).collect();
    if targets.contains(&CleanTarget::All) {
        return vec![CleanTarget::All];
    }
    if targets.is_empty() {
        targets.push(CleanTarget::Ephemeral);
    }

    let mut planned = Vec::with_capacity(targets.len() + 1);
    for target in targets {
        if target == CleanTarget::Unused && end_with_unused {
            continue;
        }
        if !planned.contains(&target) {
            planned.push(target);
        }
    }
    if end_with_unused {
        planned.push(CleanTarget::Unused);
    }
    planned
}

/// Execute the clean command
pub async fn execute(args: CleanArgs, config: &Config) -> SwiftShResult<()> {
    let store = open_store(config);
    let mut cleaner = Cleaner::new(&store, args.dry_run);

    for target in plan(&args.targets, !args.no_end_by_cleaning_unused) {
        debug!("Cleaning {:?}", target);
        match target {
            CleanTarget::All => {
                cleaner.remove(store.root()).await?;
            }
            CleanTarget::Ephemeral => {
                for marker in store.ephemeral_markers().await? {
                    cleaner.remove(&marker.path).await?;
                }
            }
            CleanTarget::Unused => {
                let report = store.unused().await?;
                for path in report.dangling_markers.iter().chain(&report.entries) {
                    cleaner.remove(path).await?;
                }
            }
            CleanTarget::Script(path) => {
                let absolute = std::path::absolute(&path)
                    .map_err(|e| SwiftShError::io(format!("resolving {}", path.display()), e))?;
                let marker = store.marker_path(&ScriptIdentity::for_path(&absolute));
                if !cleaner.remove(&marker).await? {
                    println!("No cache entry for {}", path.display());
                }
            }
        }
    }

    cleaner.summarize();
    Ok(())
}

/// Removes paths, or only reports them in a dry run
struct Cleaner<'a> {
    store: &'a CacheStore,
    dry_run: bool,
    removed: usize,
    freed: u64,
}

impl<'a> Cleaner<'a> {
    fn new(store: &'a CacheStore, dry_run: bool) -> Self {
        Self {
            store,
            dry_run,
            removed: 0,
            freed: 0,
        }
    }

    /// Remove `path`; returns whether it existed
    async fn remove(&mut self, path: &Path) -> SwiftShResult<bool> {
        let Ok(metadata) = tokio::fs::symlink_metadata(path).await else {
            return Ok(false);
        };
        let size = if metadata.is_dir() { disk_usage(path) } else { 0 };

        let shown = path.strip_prefix(self.store.root()).unwrap_or(path);
        let shown = if shown.as_os_str().is_empty() { path } else { shown };
        if self.dry_run {
            println!("  {} {} ({})", style("•").yellow(), shown.display(), format_bytes(size));
        } else {
            if !CacheStore::remove_path(path).await? {
                return Ok(false);
            }
            println!("  {} {} ({})", style("•").red(), shown.display(), format_bytes(size));
        }

        self.removed += 1;
        self.freed += size;
        Ok(true)
    }

    fn summarize(&self) {
        if self.removed == 0 {
            println!("Nothing to clean.");
        } else if self.dry_run {
            println!();
            println!(
                "Dry run - would remove {} item(s), {}.",
                self.removed,
                format_bytes(self.freed)
            );
        } else {
            println!(
                "{} removed {} item(s), freed {}",
                style("✓").green(),
                self.removed,
                format_bytes(self.freed)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_STALENESS;
    use tempfile::TempDir;

    fn targets(args: &[&str], end_with_unused: bool) -> Vec<CleanTarget> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        plan(&args, end_with_unused)
    }

    #[test]
    fn default_plan() {
        assert_eq!(
            targets(&[], true),
            [CleanTarget::Ephemeral, CleanTarget::Unused]
        );
        assert_eq!(targets(&[], false), [CleanTarget::Ephemeral]);
    }

    #[test]
    fn unused_moves_to_the_end() {
        assert_eq!(
            targets(&["unused", "a.swift", "a.swift"], true),
            [CleanTarget::Script(PathBuf::from("a.swift")), CleanTarget::Unused]
        );
        assert_eq!(
            targets(&["unused", "ephemeral"], false),
            [CleanTarget::Unused, CleanTarget::Ephemeral]
        );
    }

    #[test]
    fn all_supersedes_everything() {
        assert_eq!(targets(&["a.swift", "all", "unused"], true), [CleanTarget::All]);
    }

    #[tokio::test]
    async fn dry_run_keeps_files() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("cache"), DEFAULT_STALENESS);
        let dir = store.resolve("abc").await.unwrap();
        std::fs::write(dir.join("Package.swift"), "x".repeat(100)).unwrap();

        let mut cleaner = Cleaner::new(&store, true);
        assert!(cleaner.remove(&dir).await.unwrap());
        assert!(dir.exists());
        assert_eq!(cleaner.freed, 100);

        let mut cleaner = Cleaner::new(&store, false);
        assert!(cleaner.remove(&dir).await.unwrap());
        assert!(!dir.exists());
        assert!(!cleaner.remove(&dir).await.unwrap());
        assert_eq!(cleaner.removed, 1);
    }

    #[tokio::test]
    async fn ephemeral_then_unused_frees_entries() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("cache"), DEFAULT_STALENESS);
        store.resolve("kept").await.unwrap();
        store.resolve("piped").await.unwrap();
        store
            .write_marker(&ScriptIdentity::for_path(Path::new("/s/tool.swift")), "kept")
            .await;
        store
            .write_marker(&ScriptIdentity::stdin("c0ffee"), "piped")
            .await;

        let args = CleanArgs {
            targets: Vec::new(),
            no_end_by_cleaning_unused: false,
            dry_run: false,
        };
        let mut config = Config::default();
        config.cache.root = Some(store.root().to_path_buf());
        execute(args, &config).await.unwrap();

        assert!(store.store_dir().join("kept").exists());
        assert!(!store.store_dir().join("piped").exists());
        assert_eq!(store.markers().await.unwrap().len(), 1);
    }
}
