//! Run command - run a script with its dependencies

use super::{open_store, pipeline_options, script_source, LazySpinner};
use crate::cli::args::RunArgs;
use crate::config::Config;
use crate::error::SwiftShResult;
use crate::pipeline;
use crate::runner::{self, Invocation};
use crate::signals::ForwardedSignals;
use tracing::debug;

/// Execute the run command, returning the script's exit code
pub async fn execute(args: RunArgs, config: &Config) -> SwiftShResult<u8> {
    let options = pipeline_options(&args.prepare, config, true);
    let store = open_store(config);
    let source = script_source(&args.prepare, &args.script)?;
    let mut signals = ForwardedSignals::install()?;

    let spinner = LazySpinner::default();
    let prepared = pipeline::prepare(&source, &options, &store, &mut signals, |msg| {
        spinner.set_message(msg)
    })
    .await;
    spinner.finish();
    let prepared = prepared?;

    let mut invocation_args = prepared.toolchain_args;
    invocation_args.push(prepared.script_arg);
    invocation_args.extend(args.args);
    debug!("Running {:?} script with {} arguments", source.kind(), invocation_args.len());

    let outcome = runner::execute(
        Invocation {
            program: options.swift_path,
            args: invocation_args,
            stdin: prepared.stdin,
        },
        &mut signals,
    )
    .await?;

    Ok(outcome.exit_code())
}
