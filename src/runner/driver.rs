//! Child process driver
//!
//! Runs the toolchain on the script with inherited stdout and stderr. Stdin
//! is inherited, or fed from the buffered script content when the script
//! itself came from stdin. Termination signals received while the child runs
//! are forwarded to it.

use crate::error::{SwiftShError, SwiftShResult};
use crate::signals::{self, ForwardedSignals};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tracing::{debug, info, trace, warn};

const STDIN_CHUNK: usize = 16 * 1024;

/// A fully resolved command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Bytes to write to the child's stdin instead of inheriting it
    pub stdin: Option<Vec<u8>>,
}

/// How the child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Exited(i32),
    Signaled(i32),
}

impl Outcome {
    fn from_status(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Exited(code),
            (None, Some(signal)) => Self::Signaled(signal),
            (None, None) => Self::Exited(1),
        }
    }

    /// Exit code to mirror, `128 + N` for death by signal N
    pub fn exit_code(&self) -> u8 {
        match *self {
            Self::Exited(code) => (code & 0xff) as u8,
            Self::Signaled(signal) => (128 + signal).clamp(0, 255) as u8,
        }
    }
}

/// Run `invocation` to completion
pub async fn execute(
    invocation: Invocation,
    forwarded: &mut ForwardedSignals,
) -> SwiftShResult<Outcome> {
    let program = invocation.program.display().to_string();
    trace!("Invocation: {} {}", program, invocation.args.join(" "));

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::inherit()
        })
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    let mut child = command
        .spawn()
        .map_err(|source| SwiftShError::ToolchainSpawn {
            program: program.clone(),
            source,
        })?;
    let pid = child.id();

    let feeder = match (child.stdin.take(), invocation.stdin) {
        (Some(stdin), Some(bytes)) => Some(tokio::spawn(feed_stdin(stdin, bytes))),
        _ => None,
    };

    let status = loop {
        tokio::select! {
            status = child.wait() => {
                break status.map_err(|e| SwiftShError::command_failed(program.clone(), e))?;
            }
            Some(signal) = forwarded.next() => signals::forward(pid, signal),
        }
    };

    if let Some(feeder) = feeder {
        feeder.abort();
    }

    let outcome = Outcome::from_status(status);
    if let Outcome::Signaled(signal) = outcome {
        info!("Script received uncaught signal {}", signal);
    }
    debug!("Script finished: {:?}", outcome);
    Ok(outcome)
}

/// Write `bytes` to the child's stdin, then close it
///
/// The child may exit without reading everything; a broken pipe only ends
/// the feeding.
async fn feed_stdin(mut stdin: ChildStdin, bytes: Vec<u8>) {
    for chunk in bytes.chunks(STDIN_CHUNK) {
        if let Err(e) = stdin.write_all(chunk).await {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                debug!("Script closed its stdin early");
            } else {
                warn!("Failed writing script to stdin: {}", e);
            }
            return;
        }
    }
    if let Err(e) = stdin.shutdown().await {
        debug!("Closing script stdin: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::{raise, Signal};
    use serial_test::serial;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn run(invocation: Invocation) -> SwiftShResult<Outcome> {
        let mut signals = ForwardedSignals::install().unwrap();
        execute(invocation, &mut signals).await
    }

    fn sh(script: &str, stdin: Option<&[u8]>) -> Invocation {
        Invocation {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            stdin: stdin.map(<[u8]>::to_vec),
        }
    }

    #[test]
    fn exit_code_mapping() {
        assert_eq!(Outcome::Exited(0).exit_code(), 0);
        assert_eq!(Outcome::Exited(42).exit_code(), 42);
        assert_eq!(Outcome::Signaled(15).exit_code(), 143);
        assert_eq!(Outcome::Signaled(9).exit_code(), 137);
    }

    #[tokio::test]
    #[serial]
    async fn mirrors_exit_code() {
        let outcome = run(sh("exit 7", None)).await.unwrap();
        assert_eq!(outcome, Outcome::Exited(7));
    }

    #[tokio::test]
    #[serial]
    async fn reports_signal_death() {
        let outcome = run(sh("kill -TERM $$", None)).await.unwrap();
        assert_eq!(outcome, Outcome::Signaled(15));
        assert_eq!(outcome.exit_code(), 143);
    }

    #[tokio::test]
    #[serial]
    async fn feeds_buffered_stdin() {
        let content = vec![b'x'; 100_000];
        let outcome = run(sh(
            "test \"$(wc -c | tr -d ' ')\" = 100000",
            Some(&content),
        ))
        .await
        .unwrap();
        assert_eq!(outcome, Outcome::Exited(0));
    }

    #[tokio::test]
    #[serial]
    async fn child_closing_stdin_early_is_fine() {
        let content = vec![b'x'; 1_000_000];
        let outcome = run(sh("exit 3", Some(&content))).await.unwrap();
        assert_eq!(outcome, Outcome::Exited(3));
    }

    #[tokio::test]
    #[serial]
    async fn missing_program_is_a_spawn_error() {
        let invocation = Invocation {
            program: PathBuf::from("/no/such/swift"),
            args: Vec::new(),
            stdin: None,
        };
        let err = run(invocation).await.unwrap_err();
        assert!(matches!(err, SwiftShError::ToolchainSpawn { .. }));
    }

    #[tokio::test]
    #[serial]
    async fn interrupt_reaches_child_as_terminate() {
        let tmp = TempDir::new().unwrap();
        let ready = tmp.path().join("ready");
        let script = format!(
            "trap 'exit 42' TERM; trap 'exit 7' INT; touch '{}'; while :; do sleep 0.1; done",
            ready.display()
        );

        let mut signals = ForwardedSignals::install().unwrap();
        let raiser = tokio::spawn(async move {
            while !ready.exists() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            raise(Signal::SIGINT).unwrap();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(20),
            execute(sh(&script, None), &mut signals),
        )
        .await
        .unwrap()
        .unwrap();
        raiser.await.unwrap();

        assert_eq!(outcome, Outcome::Exited(42));
    }
}
