//! Termination signals relayed to toolchain children
//!
//! Installed once per command, before anything is spawned, so a signal
//! never kills swift-sh with its children still running. SIGINT becomes
//! SIGTERM since the toolchain ignores interrupts.

use crate::error::{SwiftShError, SwiftShResult};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

/// Signal streams watched while a child runs
pub struct ForwardedSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

impl ForwardedSignals {
    pub fn install() -> SwiftShResult<Self> {
        let listen = |kind: SignalKind| {
            signal(kind).map_err(|e| SwiftShError::io("installing signal handler", e))
        };
        Ok(Self {
            interrupt: listen(SignalKind::interrupt())?,
            terminate: listen(SignalKind::terminate())?,
            hangup: listen(SignalKind::hangup())?,
            quit: listen(SignalKind::quit())?,
        })
    }

    /// Next signal to send to the child
    pub async fn next(&mut self) -> Option<Signal> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some(Signal::SIGTERM),
            Some(()) = self.terminate.recv() => Some(Signal::SIGTERM),
            Some(()) = self.hangup.recv() => Some(Signal::SIGHUP),
            Some(()) = self.quit.recv() => Some(Signal::SIGQUIT),
            else => None,
        }
    }
}

/// Send `signal` to the child with OS id `id`, if it is still known
pub fn forward(id: Option<u32>, signal: Signal) {
    let Some(pid) = id.and_then(|id| i32::try_from(id).ok()).map(Pid::from_raw) else {
        debug!("No child to forward {} to", signal);
        return;
    };
    debug!("Forwarding {} to {}", signal, pid);
    if let Err(e) = kill(pid, signal) {
        debug!("Cannot forward {} to {}: {}", signal, pid, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::raise;
    use serial_test::serial;
    use std::time::Duration;

    #[tokio::test]
    #[serial]
    async fn interrupt_is_remapped_to_terminate() {
        let mut signals = ForwardedSignals::install().unwrap();
        raise(Signal::SIGINT).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), signals.next())
            .await
            .unwrap();
        assert_eq!(received, Some(Signal::SIGTERM));
    }

    #[tokio::test]
    #[serial]
    async fn hangup_is_forwarded_as_is() {
        let mut signals = ForwardedSignals::install().unwrap();
        raise(Signal::SIGHUP).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), signals.next())
            .await
            .unwrap();
        assert_eq!(received, Some(Signal::SIGHUP));
    }

    #[test]
    fn forwarding_without_child_is_a_no_op() {
        forward(None, Signal::SIGTERM);
    }
}
