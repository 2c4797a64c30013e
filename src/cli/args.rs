//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;
use std::ffi::OsString;
use std::path::PathBuf;

/// swift-sh - Run Swift scripts with dependencies
///
/// Declare dependencies in a comment next to their import
/// (`import Foo // @owner/repo ~> 1.0`) and run the script directly.
#[derive(Parser, Debug)]
#[command(name = "swift-sh")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(long, global = true, env = "SWIFT_SH_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a script (default when no subcommand is given)
    Run(RunArgs),

    /// Compile a script into an executable next to it
    Build(BuildArgs),

    /// Remove cached dependency packages
    Clean(CleanArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

impl Commands {
    /// Names accepted as the first positional argument
    pub const NAMES: [&'static str; 6] = ["run", "build", "clean", "config", "completions", "help"];
}

/// Options shared by `run` and `build`
#[derive(Args, Debug, Default, Clone)]
pub struct PrepareArgs {
    /// Treat the script argument as the script content
    #[arg(short = 'c', long = "script-is-content")]
    pub content: bool,

    /// Fetch @owner/repo dependencies over SSH
    #[arg(long = "use-ssh-for-github-dependencies")]
    pub use_ssh_for_github: bool,

    /// Run scripts without dependencies without building a package
    #[arg(long, overrides_with = "no_skip_package_on_no_remote_modules")]
    pub skip_package_on_no_remote_modules: bool,

    #[arg(long, overrides_with = "skip_package_on_no_remote_modules", hide = true)]
    pub no_skip_package_on_no_remote_modules: bool,

    /// Pass --disable-sandbox to the toolchain when resolving dependencies
    #[arg(long, overrides_with = "no_disable_sandbox_for_package_resolution")]
    pub disable_sandbox_for_package_resolution: bool,

    #[arg(long, overrides_with = "disable_sandbox_for_package_resolution", hide = true)]
    pub no_disable_sandbox_for_package_resolution: bool,

    /// Build dependencies in release mode
    #[arg(long, overrides_with = "no_build_dependencies_in_release_mode")]
    pub build_dependencies_in_release_mode: bool,

    #[arg(long, overrides_with = "build_dependencies_in_release_mode", hide = true)]
    pub no_build_dependencies_in_release_mode: bool,

    /// Path to the swift driver
    #[arg(long, value_name = "PATH")]
    pub swift_path: Option<PathBuf>,
}

impl PrepareArgs {
    pub fn skip_package(&self) -> Option<bool> {
        flag(
            self.skip_package_on_no_remote_modules,
            self.no_skip_package_on_no_remote_modules,
        )
    }

    pub fn disable_sandbox(&self) -> Option<bool> {
        flag(
            self.disable_sandbox_for_package_resolution,
            self.no_disable_sandbox_for_package_resolution,
        )
    }

    pub fn release_mode(&self) -> Option<bool> {
        flag(
            self.build_dependencies_in_release_mode,
            self.no_build_dependencies_in_release_mode,
        )
    }
}

/// Value of a `--x` / `--no-x` pair, `None` when neither was given
fn flag(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub prepare: PrepareArgs,

    /// Script path (`-` for stdin), or its content with -c
    #[arg(default_value = "-")]
    pub script: String,

    /// Arguments passed to the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub prepare: PrepareArgs,

    /// Script path (`-` for stdin), or its content with -c
    #[arg(default_value = "-")]
    pub script: String,
}

/// Arguments for the clean command
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Script paths, or `unused`, `ephemeral`, `all` (default: ephemeral)
    pub targets: Vec<String>,

    /// Do not remove unused entries after the given targets
    #[arg(long)]
    pub no_end_by_cleaning_unused: bool,

    /// Show what would be removed without removing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Insert the `run` subcommand when none is named
///
/// Lets shebang lines call `swift-sh script.swift args...` directly. Global
/// options before the script are left in place, and a `--` after the script
/// keeps its arguments away from swift-sh's own options.
pub fn with_default_subcommand<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().collect();

    let mut idx = 1;
    while let Some(arg) = args.get(idx).and_then(|a| a.to_str()) {
        if arg == "--config" {
            idx += 2;
        } else if arg.starts_with("--config=") || is_verbose_flag(arg) {
            idx += 1;
        } else {
            break;
        }
    }

    let first = args.get(idx).and_then(|a| a.to_str());
    let explicit = first.is_some_and(|arg| {
        Commands::NAMES.contains(&arg) || matches!(arg, "-h" | "--help" | "-V" | "--version")
    });
    let run_named = first == Some("run");
    if !explicit {
        args.insert(idx.min(args.len()), OsString::from("run"));
    } else if !run_named {
        return args;
    }

    if let Some(script) = script_position(&args, idx + 1) {
        if script + 1 < args.len() {
            args.insert(script + 1, OsString::from("--"));
        }
    }
    args
}

/// Index of the script argument of `run`, scanning from `start`
///
/// Everything after the script belongs to the script, so the caller ends
/// option parsing there.
fn script_position(args: &[OsString], start: usize) -> Option<usize> {
    let mut idx = start;
    while let Some(arg) = args.get(idx) {
        match arg.to_str() {
            Some("--") => return None,
            Some("--config" | "--swift-path") => idx += 2,
            Some(flag) if flag.len() > 1 && flag.starts_with('-') => idx += 1,
            _ => return Some(idx),
        }
    }
    None
}

fn is_verbose_flag(arg: &str) -> bool {
    arg == "--verbose" || (arg.len() > 1 && arg.starts_with('-') && arg[1..].chars().all(|c| c == 'v'))
}
