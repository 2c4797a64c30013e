//! swift-sh - Run Swift scripts with dependencies
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use swift_sh::cli::{with_default_subcommand, Cli, Commands};
use swift_sh::config::ConfigFile;
use swift_sh::error::SwiftShResult;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> SwiftShResult<u8> {
    let cli = Cli::parse_from(with_default_subcommand(std::env::args_os()));

    if let Commands::Completions(args) = cli.command {
        swift_sh::cli::commands::completions(args);
        return Ok(0);
    }

    let config_file = ConfigFile::locate(cli.config.clone());
    let config = config_file.load().await;
    init_logging(
        cli.verbose,
        config.as_ref().map_or("text", |c| c.general.log_format.as_str()),
    );
    let config = config?;

    match cli.command {
        Commands::Completions(_) => unreachable!("Completions handled above"),
        Commands::Run(args) => swift_sh::cli::commands::run(args, &config).await,
        Commands::Build(args) => swift_sh::cli::commands::build(args, &config).await.map(|()| 0),
        Commands::Clean(args) => swift_sh::cli::commands::clean(args, &config).await.map(|()| 0),
        Commands::Config(args) => swift_sh::cli::commands::config(args, &config, &config_file)
            .await
            .map(|()| 0),
    }
}

/// Initialize logging: 0 = warn, 1 = info, 2+ = debug; RUST_LOG wins
fn init_logging(verbose: u8, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("swift_sh=warn"),
        1 => EnvFilter::new("swift_sh=info"),
        _ => EnvFilter::new("swift_sh=debug"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
