//! Pipe, fork and parent-side stream setup

use crate::child::{ChildSetup, ShellCommand, fork_child};
use crate::config::LaunchConfig;
use crate::direction::Direction;
use crate::error::{LaunchError, LaunchResult};
use crate::slot::Slot;
use crate::stream::Stream;
use crate::terminator::{SystemWaiter, reap};
use nix::errno::Errno;
use nix::unistd::Pid;
use std::os::fd::{AsRawFd, OwnedFd};
use tracing::{debug, warn};

/// Start `command` under the configured shell and return the caller's end
/// of the pipe. Preconditions on `slot` are checked by the caller.
pub(crate) fn start(
    slot: &mut Slot,
    config: &LaunchConfig,
    command: &str,
    direction: Direction,
) -> LaunchResult<Stream> {
    let capacity = config.buffer_capacity;
    start_with(slot, config, command, direction, |fd, child| {
        Stream::from_fd(fd, direction, child, capacity)
    })
}

/// [`start`] with the parent's stream construction supplied by the caller.
///
/// `wrap` owns the retained descriptor; on error it must have closed it.
fn start_with<F>(
    slot: &mut Slot,
    config: &LaunchConfig,
    command: &str,
    direction: Direction,
    wrap: F,
) -> LaunchResult<Stream>
where
    F: FnOnce(OwnedFd, Pid) -> Result<Stream, Errno>,
{
    let shell = ShellCommand::new(config, command)?;

    let (read_end, write_end) = create_pipe().map_err(|errno| {
        warn!(%errno, "pipe creation failed");
        LaunchError::PipeCreationFailed(errno)
    })?;
    let (parent_end, child_end) = match direction {
        Direction::ReadFromChild => (read_end, write_end),
        Direction::WriteToChild => (write_end, read_end),
    };

    let setup = ChildSetup {
        command: shell,
        keep: child_end.as_raw_fd(),
        discard: parent_end.as_raw_fd(),
        target: direction.child_fd(),
        failure_exit_code: config.failure_exit_code,
    };

    let child = match fork_child(setup) {
        Ok(pid) => pid,
        Err(errno) => {
            warn!(%errno, "fork failed");
            drop(parent_end);
            drop(child_end);
            return Err(LaunchError::ForkFailed(errno));
        }
    };

    slot.record_child(child);
    drop(child_end);

    match wrap(parent_end, child) {
        Ok(stream) => {
            slot.record_stream(stream.id());
            debug!(
                pid = child.as_raw(),
                %direction,
                stream = %stream.id(),
                "launched co-process"
            );
            Ok(stream)
        }
        Err(errno) => {
            // The descriptor is already closed, so the child sees EOF or a
            // broken pipe and winds down; collect it so the slot is free.
            warn!(pid = child.as_raw(), %errno, "stream setup failed, reaping child");
            if let Err(err) = reap(child, &mut SystemWaiter) {
                warn!(pid = child.as_raw(), error = %err, "could not reap child");
            }
            slot.clear();
            Err(LaunchError::StreamSetupFailed(errno))
        }
    }
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "illumos",
    target_os = "solaris"
))]
fn create_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "illumos",
    target_os = "solaris"
)))]
fn create_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    use nix::fcntl::{FcntlArg, FdFlag, fcntl};

    let (read_end, write_end) = nix::unistd::pipe()?;
    for fd in [&read_end, &write_end] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((read_end, write_end))
}
