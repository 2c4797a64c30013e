//! Line capture of a toolchain process writing to a pseudo-terminal

use nix::pty::{openpty, Winsize};
use nix::sys::termios::Termios;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::os::fd::OwnedFd;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader as AsyncBufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{SwiftShError, SwiftShResult};

const CHANNEL_CAPACITY: usize = 64;

/// Both ends of a freshly opened pseudo-terminal
pub struct Pty {
    master: OwnedFd,
    slave: OwnedFd,
}

impl Pty {
    pub fn open() -> SwiftShResult<Self> {
        let pty = openpty(None::<&Winsize>, None::<&Termios>).map_err(SwiftShError::PtyAllocation)?;
        Ok(Self {
            master: pty.master,
            slave: pty.slave,
        })
    }

    /// Split into the master end and a `Stdio` for the child's terminal end
    ///
    /// The parent's copy of the terminal end lives in the `Command` it is
    /// given to; drop the command once spawned so end-of-stream is seen when
    /// the child exits.
    pub fn split(self) -> (OwnedFd, Stdio) {
        (self.master, Stdio::from(self.slave))
    }
}

/// A line captured from one of the child's outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    /// Output written to the pseudo-terminal
    Terminal(String),
    Stderr(String),
}

/// Start producers for the terminal master and stderr
///
/// The receiver yields lines from both in arrival order and closes once
/// both outputs have reached end of stream.
pub fn spawn_producers<E>(master: OwnedFd, stderr: E) -> mpsc::Receiver<StreamLine>
where
    E: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    let terminal_tx = tx.clone();
    tokio::task::spawn_blocking(move || read_terminal(File::from(master), terminal_tx));

    tokio::spawn(async move {
        let mut reader = AsyncBufReader::new(stderr);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(trim_eol(&buf)).into_owned();
                    if tx.send(StreamLine::Stderr(line)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("Stopped reading toolchain stderr: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

/// Blocking read loop on the terminal master
///
/// Once every terminal end is closed, reads fail with `EIO` on Linux; that
/// is the end of stream.
fn read_terminal(master: File, tx: mpsc::Sender<StreamLine>) {
    let mut reader = BufReader::new(master);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let Ok(line) = std::str::from_utf8(trim_eol(&buf)) else {
                    warn!("Non UTF-8 toolchain output: {}", hex::encode(&buf));
                    continue;
                };
                if tx.blocking_send(StreamLine::Terminal(line.to_string())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                if e.raw_os_error() != Some(nix::libc::EIO) {
                    debug!("Stopped reading toolchain terminal: {}", e);
                }
                break;
            }
        }
    }
}

/// Strip `\n` and the `\r` terminals add before it
fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
