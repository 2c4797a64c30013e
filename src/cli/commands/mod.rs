//! CLI command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod config;
pub mod run;

pub use build::execute as build;
pub use clean::execute as clean;
pub use completions::execute as completions;
pub use config::execute as config;
pub use run::execute as run;

use crate::cache::CacheStore;
use crate::cli::args::PrepareArgs;
use crate::config::Config;
use crate::error::SwiftShResult;
use crate::pipeline::PipelineOptions;
use crate::script::ScriptSource;
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::OnceCell;
use std::path::Path;

/// Configuration values overridden by the flags that were given
fn pipeline_options(args: &PrepareArgs, config: &Config, write_marker: bool) -> PipelineOptions {
    PipelineOptions {
        swift_path: args
            .swift_path
            .clone()
            .unwrap_or_else(|| config.toolchain.swift_path.clone()),
        release_mode: args
            .release_mode()
            .unwrap_or(config.toolchain.build_dependencies_in_release_mode),
        disable_sandbox: args
            .disable_sandbox()
            .unwrap_or(config.toolchain.disable_sandbox_for_package_resolution),
        use_ssh_for_github: args.use_ssh_for_github || config.dependencies.use_ssh_for_github,
        skip_package_on_no_remote_modules: args
            .skip_package()
            .unwrap_or(config.dependencies.skip_package_on_no_remote_modules),
        reuse_resolved_invocation: config.cache.reuse_resolved_invocation,
        write_marker,
    }
}

fn open_store(config: &Config) -> CacheStore {
    CacheStore::new(config.cache.resolved_root(), config.cache.staleness())
}

/// Source for the script argument of `run`
fn script_source(args: &PrepareArgs, script: &str) -> SwiftShResult<ScriptSource> {
    if args.content {
        ScriptSource::from_content(script)
    } else {
        ScriptSource::from_path(Path::new(script))
    }
}

/// Spinner shown only once a slow step starts
#[derive(Default)]
struct LazySpinner {
    bar: OnceCell<ProgressBar>,
}

impl LazySpinner {
    fn set_message(&self, msg: &str) {
        self.bar
            .get_or_init(|| create_progress_bar(msg))
            .set_message(msg.to_string());
    }

    fn finish(&self) {
        if let Some(pb) = self.bar.get() {
            pb.finish_and_clear();
        }
    }
}

fn create_progress_bar(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
