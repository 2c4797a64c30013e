//! Build command - compile a script into an executable

use super::{open_store, pipeline_options, LazySpinner};
use crate::cache::store::BUILD_DIR;
use crate::cli::args::BuildArgs;
use crate::config::Config;
use crate::error::{SwiftShError, SwiftShResult};
use crate::pipeline;
use crate::script::{ScriptSource, STDIN_SENTINEL};
use crate::signals::{self, ForwardedSignals};
use console::style;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Executable name used when the script has no path
const DEFAULT_OUTPUT: &str = "main";

/// How the linker is told where to find the dependencies at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkerStyle {
    /// rpath added afterwards with `install_name_tool`
    Darwin,
    /// rpath passed to the linker
    Elf,
}

impl LinkerStyle {
    fn host() -> Self {
        if cfg!(target_os = "macos") {
            Self::Darwin
        } else {
            Self::Elf
        }
    }
}

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> SwiftShResult<()> {
    let options = pipeline_options(&args.prepare, config, false);
    let store = open_store(config);

    let source = if args.prepare.content {
        ScriptSource::from_content(&args.script)?
    } else {
        let path = Path::new(&args.script);
        if path != Path::new(STDIN_SENTINEL) && path.extension().is_none() {
            return Err(SwiftShError::ScriptWithoutExtension(path.to_path_buf()));
        }
        ScriptSource::copying(path).await?
    };
    let output = output_path(source.origin_path());
    let mut signals = ForwardedSignals::install()?;

    let spinner = LazySpinner::default();
    let prepared = pipeline::prepare(&source, &options, &store, &mut signals, |msg| {
        spinner.set_message(msg)
    })
    .await;
    spinner.finish();
    let prepared = prepared?;

    let linker = LinkerStyle::host();
    let rpath = prepared
        .entry
        .as_ref()
        .map(|entry| entry.directory.join(BUILD_DIR).join(entry.configuration()));
    let compile = compile_args(
        prepared.toolchain_args,
        &prepared.script_arg,
        &output,
        rpath.as_deref(),
        linker,
    );

    let compiler = compiler_path(&options.swift_path);
    info!("Compiling to {}", output.display());
    run_tool(&compiler, &compile, &mut signals).await?;

    if let (LinkerStyle::Darwin, Some(rpath)) = (linker, rpath) {
        let args = vec![
            "-add_rpath".to_string(),
            rpath.display().to_string(),
            output.display().to_string(),
        ];
        run_tool(Path::new("install_name_tool"), &args, &mut signals).await?;
    }

    eprintln!(
        "{} Built {}",
        style("✓").green(),
        style(output.display()).bold()
    );
    Ok(())
}

/// `swiftc` next to the configured `swift`
fn compiler_path(swift_path: &Path) -> PathBuf {
    let mut name = swift_path.as_os_str().to_owned();
    name.push("c");
    PathBuf::from(name)
}

/// Script path without its extension, or `main` in the current directory
fn output_path(origin: Option<&Path>) -> PathBuf {
    match origin {
        Some(path) => path.with_extension(""),
        None => PathBuf::from(DEFAULT_OUTPUT),
    }
}

fn compile_args(
    mut args: Vec<String>,
    script_arg: &str,
    output: &Path,
    rpath: Option<&Path>,
    linker: LinkerStyle,
) -> Vec<String> {
    match (linker, rpath) {
        (LinkerStyle::Darwin, _) => {
            args.extend(["-Xlinker", "-headerpad_max_install_names"].map(String::from));
        }
        (LinkerStyle::Elf, Some(rpath)) => {
            args.extend(["-Xlinker", "-rpath", "-Xlinker"].map(String::from));
            args.push(rpath.display().to_string());
        }
        (LinkerStyle::Elf, None) => {}
    }
    args.push(script_arg.to_string());
    args.push("-o".to_string());
    args.push(output.display().to_string());
    args
}

/// Run a toolchain program with inherited output, failing on non-zero exit
///
/// Signals received meanwhile are passed on; the build then stops with
/// `Interrupted` once the program has exited.
async fn run_tool(
    program: &Path,
    args: &[String],
    forwarded: &mut ForwardedSignals,
) -> SwiftShResult<()> {
    let command_line = format!("{} {}", program.display(), args.join(" "));
    debug!("Running {}", command_line);

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| SwiftShError::ToolchainSpawn {
            program: program.display().to_string(),
            source,
        })?;
    let pid = child.id();

    let mut interrupted = None;
    let status = loop {
        tokio::select! {
            status = child.wait() => {
                break status.map_err(|e| SwiftShError::command_failed(command_line.clone(), e))?;
            }
            Some(signal) = forwarded.next() => {
                signals::forward(pid, signal);
                interrupted = Some(signal);
            }
        }
    };

    if let Some(signal) = interrupted {
        return Err(SwiftShError::Interrupted(signal as i32));
    }
    if !status.success() {
        return Err(SwiftShError::CompilationFailed {
            command: command_line,
            code: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn compiler_is_next_to_swift() {
        assert_eq!(compiler_path(Path::new("swift")), PathBuf::from("swiftc"));
        assert_eq!(
            compiler_path(Path::new("/usr/bin/swift")),
            PathBuf::from("/usr/bin/swiftc")
        );
    }

    #[test]
    fn output_drops_extension() {
        assert_eq!(
            output_path(Some(Path::new("/tmp/tool.swift"))),
            PathBuf::from("/tmp/tool")
        );
        assert_eq!(output_path(None), PathBuf::from("main"));
    }

    #[test]
    fn elf_gets_rpath_from_linker() {
        let args = compile_args(
            vec!["-I/deps".to_string()],
            "/tmp/x.swift",
            Path::new("/tmp/x"),
            Some(Path::new("/cache/store/abc/.build/release")),
            LinkerStyle::Elf,
        );
        assert_eq!(
            args,
            [
                "-I/deps",
                "-Xlinker",
                "-rpath",
                "-Xlinker",
                "/cache/store/abc/.build/release",
                "/tmp/x.swift",
                "-o",
                "/tmp/x"
            ]
        );
    }

    #[test]
    fn darwin_leaves_room_for_rpath() {
        let args = compile_args(
            Vec::new(),
            "x.swift",
            Path::new("x"),
            Some(Path::new("/r")),
            LinkerStyle::Darwin,
        );
        assert_eq!(
            args,
            ["-Xlinker", "-headerpad_max_install_names", "x.swift", "-o", "x"]
        );
    }

    #[test]
    fn no_dependencies_no_rpath() {
        let args = compile_args(Vec::new(), "x.swift", Path::new("x"), None, LinkerStyle::Elf);
        assert_eq!(args, ["x.swift", "-o", "x"]);
    }

    #[tokio::test]
    #[serial]
    async fn failing_tool_reports_exit_code() {
        let temp = TempDir::new().unwrap();
        let tool = temp.path().join("swiftc");
        std::fs::write(&tool, "#!/bin/sh\nexit 4\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut signals = ForwardedSignals::install().unwrap();
        let err = run_tool(&tool, &["a.swift".to_string()], &mut signals)
            .await
            .unwrap_err();
        match err {
            SwiftShError::CompilationFailed { code, command } => {
                assert_eq!(code, 4);
                assert!(command.ends_with("swiftc a.swift"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
