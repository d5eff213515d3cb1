//! Closing a co-process stream and collecting the child

use crate::error::{FinishError, FinishResult, NoChildCause};
use crate::slot::Slot;
use crate::stream::Stream;
use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::{trace, warn};

/// Blocking wait on a specific child.
///
/// [`SystemWaiter`] is the real `waitpid(2)`; other implementations let the
/// reap loop be driven by a script, e.g. to inject `EINTR`.
pub trait Waiter {
    /// Wait for `pid` to change state.
    fn wait(&mut self, pid: Pid) -> nix::Result<WaitStatus>;
}

/// `waitpid(pid, 0)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWaiter;

impl Waiter for SystemWaiter {
    fn wait(&mut self, pid: Pid) -> nix::Result<WaitStatus> {
        waitpid(pid, None)
    }
}

/// Validate `stream` against `slot`, close it and reap the child.
///
/// A stream that fails validation is handed back inside the error and the
/// slot is left as it was. Past validation the slot is cleared on every path.
pub(crate) fn finish<W: Waiter + ?Sized>(
    slot: &mut Slot,
    stream: Stream,
    waiter: &mut W,
) -> FinishResult<i32> {
    let Some(child) = slot.child() else {
        return Err(FinishError::NotLaunched { stream });
    };
    let Some(tracked) = slot.stream() else {
        return Err(FinishError::InvalidArgument {
            reason: "no stream is outstanding".to_string(),
            stream,
        });
    };
    if stream.id() != tracked {
        return Err(FinishError::InvalidArgument {
            reason: format!("{} is not the outstanding {}", stream.id(), tracked),
            stream,
        });
    }

    if let Err(err) = stream.close() {
        // The child is not reaped on this path.
        warn!(pid = child.as_raw(), error = %err, "closing co-process stream failed");
        slot.clear();
        return Err(FinishError::CloseFailed(err));
    }

    let result = reap(child, waiter);
    slot.clear();
    result
}

/// Wait for `pid` to terminate and return its exit code.
///
/// `EINTR` is retried. Any other wait failure, or termination by anything
/// other than a normal exit, is [`FinishError::NoChild`].
pub fn reap<W: Waiter + ?Sized>(pid: Pid, waiter: &mut W) -> FinishResult<i32> {
    loop {
        match waiter.wait(pid) {
            Err(Errno::EINTR) => {
                trace!(pid = pid.as_raw(), "waitpid interrupted, retrying");
            }
            Err(errno) => {
                warn!(pid = pid.as_raw(), %errno, "waitpid failed");
                return Err(FinishError::NoChild(NoChildCause::WaitFailed(errno)));
            }
            Ok(status) if status.pid() != Some(pid) => {
                trace!(pid = pid.as_raw(), ?status, "ignoring unrelated wait status");
            }
            Ok(WaitStatus::Exited(_, code)) => {
                trace!(pid = pid.as_raw(), code, "child exited");
                return Ok(code);
            }
            Ok(status) => {
                let how = describe(&status);
                warn!(pid = pid.as_raw(), how = %how, "child terminated abnormally");
                return Err(FinishError::NoChild(NoChildCause::AbnormalTermination(
                    how,
                )));
            }
        }
    }
}

fn describe(status: &WaitStatus) -> String {
    match status {
        WaitStatus::Signaled(_, signal, true) => format!("killed by {:?} (core dumped)", signal),
        WaitStatus::Signaled(_, signal, false) => format!("killed by {:?}", signal),
        WaitStatus::Stopped(_, signal) => format!("stopped by {:?}", signal),
        WaitStatus::Continued(_) => "continued".to_string(),
        other => format!("{:?}", other),
    }
}
