//! Preparation shared by `run` and `build`
//!
//! Scans the script, synthesizes the dependencies manifest, and returns the
//! toolchain arguments for it, from the cache when possible.

use crate::cache::{CacheEntry, CacheStore};
use crate::error::{SwiftShError, SwiftShResult};
use crate::import::{ParseContext, ParseNotices};
use crate::manifest::{Manifest, ManifestOptions, PlatformSpec};
use crate::script::{scan_script, ScriptSource};
use crate::signals::ForwardedSignals;
use crate::toolchain::{resolve_invocation, ResolveOptions};
use semver::Version;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Knobs of a preparation, merged from config and flags
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub swift_path: PathBuf,
    pub release_mode: bool,
    pub disable_sandbox: bool,
    pub use_ssh_for_github: bool,
    pub skip_package_on_no_remote_modules: bool,
    pub reuse_resolved_invocation: bool,
    /// Record which entry the script uses, for `clean`
    pub write_marker: bool,
}

/// Everything needed to hand the script to the toolchain
#[derive(Debug)]
pub struct Prepared {
    /// Arguments to put before the script argument
    pub toolchain_args: Vec<String>,
    /// Script path, or `-` when the content is piped
    pub script_arg: String,
    /// Buffered content for sources that cannot be read twice
    pub stdin: Option<Vec<u8>>,
    /// Cache entry backing the arguments; `None` when no package was needed
    pub entry: Option<CacheEntry>,
}

/// Version of this tool, pinned for bare helpers imports
pub fn tool_version() -> SwiftShResult<Version> {
    Version::parse(env!("CARGO_PKG_VERSION"))
        .map_err(|e| SwiftShError::Internal(format!("invalid package version: {}", e)))
}

/// Scan `source` and resolve the invocation for its dependencies
///
/// `progress` receives short status messages while slow steps run. Signals
/// arriving while the toolchain resolves are passed on to it.
pub async fn prepare(
    source: &ScriptSource,
    options: &PipelineOptions,
    store: &CacheStore,
    forwarded: &mut ForwardedSignals,
    progress: impl Fn(&str),
) -> SwiftShResult<Prepared> {
    let version = tool_version()?;
    let notices = ParseNotices::new();
    let ctx = ParseContext {
        script_folder: source.script_folder(),
        tool_version: &version,
        notices: &notices,
    };

    let reader = source.reader().await?;
    let scan = scan_script(reader, &ctx, !source.is_replayable()).await?;
    debug!(
        "Found {} dependencies in {:?} script",
        scan.specs.len(),
        source.kind()
    );

    let mut prepared = Prepared {
        toolchain_args: Vec::new(),
        script_arg: source.script_arg(),
        stdin: scan.content,
        entry: None,
    };

    if scan.specs.is_empty() && options.skip_package_on_no_remote_modules {
        info!("No dependencies declared, running the script directly");
        return Ok(prepared);
    }

    let manifest_options = ManifestOptions {
        use_ssh_for_github: options.use_ssh_for_github,
        platform: PlatformSpec::detect().await,
    };
    let manifest = Manifest::synthesize(&scan.specs, &manifest_options);
    let dir = store.resolve(manifest.hash()).await?;

    let refreshed = store.needs_refresh(&dir, manifest.as_bytes()).await?;
    if refreshed {
        store.materialize(&dir, &manifest).await?;
    } else {
        store.ensure_placeholder(&dir).await?;
    }

    let reusable = if options.reuse_resolved_invocation && !refreshed {
        store
            .load_entry(&dir, manifest.hash())
            .await
            .filter(|entry| entry.release_mode == options.release_mode)
    } else {
        None
    };

    let entry = match reusable {
        Some(entry) => {
            info!("Reusing invocation resolved at {}", entry.resolved_at);
            entry
        }
        None => {
            progress("Resolving dependencies...");
            let resolve_options = ResolveOptions {
                swift_path: options.swift_path.clone(),
                release_mode: options.release_mode,
                disable_sandbox: options.disable_sandbox,
            };
            let args = resolve_invocation(&dir, &resolve_options, forwarded).await?;
            let entry = CacheEntry::new(manifest.hash(), &dir, args, options.release_mode);
            if let Err(e) = store.save_entry(&entry).await {
                warn!("Cannot record resolved invocation: {}", e);
            }
            entry
        }
    };

    if options.write_marker {
        store
            .write_marker(&source.identity(&scan.content_hash), manifest.hash())
            .await;
    }

    prepared.toolchain_args = entry.invocation_args.clone();
    prepared.entry = Some(entry);
    Ok(prepared)
}
