//! Toolchain invocation resolution
//!
//! Runs `swift run --repl` in a dependencies package with its stdout on a
//! pseudo-terminal. The toolchain fetches and builds every dependency, then
//! prints the REPL command line it would use; those arguments are what a
//! script needs to be run with the dependencies linked.

pub mod patch;
pub mod stream;

use crate::error::{SwiftShError, SwiftShResult};
use crate::signals::{self, ForwardedSignals};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use stream::{spawn_producers, Pty, StreamLine};
use tokio::process::Command;
use tracing::{debug, trace, warn};

/// Marker preceding the arguments in the toolchain's REPL line
const REPL_MARKER: &str = ": repl ";

/// Signal the toolchain is sometimes reported killed by after a good run
const TOLERATED_SIGNAL: i32 = 9;

/// How to run the toolchain for resolution
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Path or name of the `swift` driver
    pub swift_path: PathBuf,
    /// Build dependencies with `-c release`
    pub release_mode: bool,
    /// Pass `--disable-sandbox`
    pub disable_sandbox: bool,
}

impl ResolveOptions {
    /// Arguments of the resolution command
    pub fn args(&self) -> Vec<&'static str> {
        let mut args = vec!["run", "--repl"];
        if self.release_mode {
            args.extend(["-c", "release"]);
        }
        if self.disable_sandbox {
            args.push("--disable-sandbox");
        }
        args
    }
}

/// Resolve the invocation for the package in `package_dir`
///
/// The package must already be materialized. The returned arguments are
/// patched and ready to be put in front of a script path. A termination
/// signal is passed on to the toolchain and ends resolution with
/// `Interrupted` once it has exited.
pub async fn resolve_invocation(
    package_dir: &Path,
    options: &ResolveOptions,
    forwarded: &mut ForwardedSignals,
) -> SwiftShResult<Vec<String>> {
    let args = capture_repl_args(package_dir, options, forwarded).await?;
    patch::check_suspicious(&args);
    let patched = patch::patch_invocation(args, package_dir);
    debug!("Resolved invocation: {}", patched.join(" "));
    Ok(patched)
}

async fn capture_repl_args(
    package_dir: &Path,
    options: &ResolveOptions,
    forwarded: &mut ForwardedSignals,
) -> SwiftShResult<Vec<String>> {
    let program = options.swift_path.display().to_string();
    let args = options.args();
    debug!("Running {} {} in {}", program, args.join(" "), package_dir.display());

    let (master, terminal) = Pty::open()?.split();
    let mut command = Command::new(&options.swift_path);
    command
        .args(&args)
        .current_dir(package_dir)
        .stdin(Stdio::null())
        .stdout(terminal)
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|source| SwiftShError::ToolchainSpawn {
            program: program.clone(),
            source,
        })?;
    drop(command);

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SwiftShError::Internal("toolchain stderr not captured".to_string()))?;
    let mut lines = spawn_producers(master, stderr);
    let pid = child.id();

    let mut invocation: Option<Vec<String>> = None;
    let mut stderr_lines = Vec::new();
    let mut interrupted = None;
    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            Some(signal) = forwarded.next() => {
                signals::forward(pid, signal);
                interrupted = Some(signal);
                continue;
            }
        };
        let Some(line) = line else { break };
        match line {
            StreamLine::Terminal(line) => {
                debug!("swift stdout: {}", line);
                let Some(args) = parse_repl_line(&line) else {
                    trace!("Ignoring non-REPL output");
                    continue;
                };
                if let Some(previous) = &invocation {
                    warn!(
                        "Got multiple lines matching REPL arguments, taking the last one (previous: {})",
                        previous.join(" ")
                    );
                }
                invocation = Some(args);
            }
            StreamLine::Stderr(line) => {
                debug!("swift stderr: {}", line);
                stderr_lines.push(line);
            }
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| SwiftShError::command_failed(program.clone(), e))?;

    if let Some(signal) = interrupted {
        warn!("Dependency resolution interrupted by {}", signal);
        return Err(SwiftShError::Interrupted(signal as i32));
    }

    let failure = || SwiftShError::ResolutionFailed {
        stderr: stderr_lines.join("\n"),
    };
    if !is_expected_termination(status) {
        warn!("{} exited unexpectedly: {}", program, status);
        return Err(failure());
    }
    invocation.ok_or_else(failure)
}

/// Arguments of a `<prefix>: repl <args>` line
fn parse_repl_line(line: &str) -> Option<Vec<String>> {
    let idx = line.rfind(REPL_MARKER)?;
    let rest = &line[idx + REPL_MARKER.len()..];
    if idx == 0 || rest.is_empty() {
        return None;
    }
    Some(
        rest.split(' ')
            .filter(|arg| !arg.is_empty())
            .map(String::from)
            .collect(),
    )
}

fn is_expected_termination(status: ExitStatus) -> bool {
    status.success() || status.signal() == Some(TOLERATED_SIGNAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::{kill, raise, Signal};
    use nix::unistd::Pid;
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn resolve(package_dir: &Path, options: &ResolveOptions) -> SwiftShResult<Vec<String>> {
        let mut signals = ForwardedSignals::install().unwrap();
        resolve_invocation(package_dir, options, &mut signals).await
    }

    /// Write an executable shell script standing in for `swift`
    fn fake_swift(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("swift");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn options(swift_path: PathBuf) -> ResolveOptions {
        ResolveOptions {
            swift_path,
            release_mode: true,
            disable_sandbox: false,
        }
    }

    #[test]
    fn repl_line_parsing() {
        assert_eq!(
            parse_repl_line("Launching Swift REPL with arguments: repl -I/a -L/b -lFoo"),
            Some(vec![
                "-I/a".to_string(),
                "-L/b".to_string(),
                "-lFoo".to_string()
            ])
        );
        assert_eq!(parse_repl_line(": repl -I/a"), None);
        assert_eq!(parse_repl_line("x: repl "), None);
        assert_eq!(parse_repl_line("Compiling Foo"), None);
    }

    #[test]
    fn resolution_arguments() {
        let mut opts = options(PathBuf::from("swift"));
        assert_eq!(opts.args(), vec!["run", "--repl", "-c", "release"]);
        opts.release_mode = false;
        opts.disable_sandbox = true;
        assert_eq!(opts.args(), vec!["run", "--repl", "--disable-sandbox"]);
    }

    #[tokio::test]
    #[serial]
    async fn last_repl_line_wins() {
        let tmp = TempDir::new().unwrap();
        let swift = fake_swift(
            tmp.path(),
            "echo 'Building'\n\
             echo 'first: repl -I/old'\n\
             echo 'warning: something' >&2\n\
             echo \"$(pwd): repl -I/new -L/lib -lDeps $1 $2 $3 $4\"",
        );

        let args = resolve(tmp.path(), &options(swift)).await.unwrap();
        assert_eq!(
            args,
            vec!["-I/new", "-L/lib", "-lDeps", "run", "--repl", "-c", "release"]
        );
    }

    #[tokio::test]
    #[serial]
    async fn failure_carries_stderr() {
        let tmp = TempDir::new().unwrap();
        let swift = fake_swift(
            tmp.path(),
            "echo 'error: dependency not found' >&2\necho 'x: repl -I/a'\nexit 1",
        );

        let err = resolve(tmp.path(), &options(swift)).await.unwrap_err();
        match err {
            SwiftShError::ResolutionFailed { stderr } => {
                assert_eq!(stderr, "error: dependency not found")
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    #[serial]
    async fn missing_repl_line_fails() {
        let tmp = TempDir::new().unwrap();
        let swift = fake_swift(tmp.path(), "echo nothing here");

        let err = resolve(tmp.path(), &options(swift)).await.unwrap_err();
        assert!(matches!(err, SwiftShError::ResolutionFailed { .. }));
    }

    #[tokio::test]
    #[serial]
    async fn killed_by_sigkill_is_tolerated() {
        let tmp = TempDir::new().unwrap();
        let swift = fake_swift(tmp.path(), "echo 'x: repl -I/a -L/b -lc'\nkill -9 $$");

        let args = resolve(tmp.path(), &options(swift)).await.unwrap();
        assert_eq!(args, vec!["-I/a", "-L/b", "-lc"]);
    }

    #[tokio::test]
    #[serial]
    async fn missing_toolchain_is_a_spawn_error() {
        let tmp = TempDir::new().unwrap();
        let err = resolve(
            tmp.path(),
            &options(tmp.path().join("no-such-swift")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SwiftShError::ToolchainSpawn { .. }));
    }

    #[tokio::test]
    #[serial]
    async fn termination_stops_the_toolchain() {
        let tmp = TempDir::new().unwrap();
        let pid_file = tmp.path().join("swift.pid");
        let swift = fake_swift(
            tmp.path(),
            &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
        );

        let mut signals = ForwardedSignals::install().unwrap();
        let watched = pid_file.clone();
        let raiser = tokio::spawn(async move {
            while std::fs::read_to_string(&watched).map_or(true, |s| s.trim().is_empty()) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            raise(Signal::SIGTERM).unwrap();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(20),
            resolve_invocation(tmp.path(), &options(swift), &mut signals),
        )
        .await
        .unwrap()
        .unwrap_err();
        raiser.await.unwrap();

        assert!(matches!(err, SwiftShError::Interrupted(15)));
        let pid: i32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        assert!(kill(Pid::from_raw(pid), None).is_err());
    }
}
