//! Fork boundary and the child's side of the pipe
//!
//! Everything the child needs is prepared before `fork(2)`. After the fork
//! the child only makes async-signal-safe calls and never returns: it
//! either becomes the shell or leaves through `_exit(2)`.

#![allow(unsafe_code)]

use crate::config::LaunchConfig;
use crate::error::LaunchError;
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::unistd::{ForkResult, Pid, close, dup2, fork};
use std::ffi::{CString, c_char};
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;

/// Shell path and argv for `sh -c <command>`, NUL-checked up front.
///
/// The NULL-terminated pointer array is built here so the child does not
/// allocate before exec.
#[derive(Debug)]
pub(crate) struct ShellCommand {
    shell: CString,
    /// Owns the buffers behind `argv_ptrs`
    #[allow(dead_code)]
    argv: [CString; 3],
    argv_ptrs: [*const c_char; 4],
}

impl ShellCommand {
    pub(crate) fn new(config: &LaunchConfig, command: &str) -> Result<Self, LaunchError> {
        let shell = CString::new(config.shell.as_os_str().as_bytes()).map_err(|_| {
            LaunchError::InvalidArgument("shell path contains a NUL byte".to_string())
        })?;
        let name = CString::new(config.shell_name.as_bytes()).map_err(|_| {
            LaunchError::InvalidArgument("shell name contains a NUL byte".to_string())
        })?;
        let command = CString::new(command)
            .map_err(|_| LaunchError::InvalidArgument("command contains a NUL byte".to_string()))?;

        let argv = [name, c"-c".to_owned(), command];
        // Pointers target the CStrings' heap buffers, which stay put when
        // `argv` moves into the struct.
        let argv_ptrs = [
            argv[0].as_ptr(),
            argv[1].as_ptr(),
            argv[2].as_ptr(),
            std::ptr::null(),
        ];

        Ok(Self {
            shell,
            argv,
            argv_ptrs,
        })
    }
}

/// What the child does between fork and exec.
#[derive(Debug)]
pub(crate) struct ChildSetup {
    pub(crate) command: ShellCommand,
    /// Pipe end the child keeps
    pub(crate) keep: RawFd,
    /// Pipe end that belongs to the parent
    pub(crate) discard: RawFd,
    /// Standard stream number `keep` must end up on
    pub(crate) target: RawFd,
    pub(crate) failure_exit_code: i32,
}

impl ChildSetup {
    /// Wire up the descriptors and exec the shell. Never returns.
    fn run(self) -> ! {
        if self.redirect().is_ok() {
            // SAFETY: shell and argv_ptrs point into CStrings owned by
            // self.command, and argv_ptrs is NULL-terminated.
            unsafe {
                libc::execv(self.command.shell.as_ptr(), self.command.argv_ptrs.as_ptr());
            }
        }
        // SAFETY: _exit is async-signal-safe and skips the atexit handlers
        // and buffered stdio that belong to the parent's image.
        unsafe { libc::_exit(self.failure_exit_code) }
    }

    fn redirect(&self) -> nix::Result<()> {
        let _ = close(self.discard);

        if self.keep != self.target {
            let duped = dup2(self.keep, self.target);
            let _ = close(self.keep);
            duped?;
        } else {
            // Already in place; the pipe was created close-on-exec.
            fcntl(self.keep, FcntlArg::F_SETFD(FdFlag::empty()))?;
        }

        // The Rust runtime ignores SIGPIPE and exec keeps ignored
        // dispositions; the shell should see the default.
        // SAFETY: installing SIG_DFL runs no handler code.
        unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) }?;
        Ok(())
    }
}

/// Fork and run `setup` in the child. Returns the child's pid in the parent.
pub(crate) fn fork_child(setup: ChildSetup) -> nix::Result<Pid> {
    // SAFETY: the child branch only runs ChildSetup::run, which allocates
    // nothing and sticks to async-signal-safe calls until exec or _exit.
    match unsafe { fork() }? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => setup.run(),
    }
}
