//! Zero-signal liveness probes and signal delivery.

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use super::errors::ProcessError;

/// Probes `pid` with the null signal.
///
/// Only `ESRCH` proves the process is gone. `EPERM` and any other failure
/// mean something still answers to the pid.
#[must_use]
pub fn is_alive(pid: Pid) -> bool {
    !matches!(kill(pid, None), Err(Errno::ESRCH))
}

/// Delivers `signal` to `pid`.
pub fn send(pid: Pid, signal: Signal) -> Result<(), ProcessError> {
    kill(pid, signal).map_err(|source| ProcessError::Signal { pid, source })
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_alive(Pid::this()));
    }

    #[test]
    fn reaped_child_is_not_alive() {
        let mut child = Command::new("true").spawn().expect("spawn true");
        let pid = Pid::from_raw(i32::try_from(child.id()).expect("pid fits in i32"));
        child.wait().expect("reap child");

        assert!(!is_alive(pid));
    }
}
