//! Explicit co-process session handle

use crate::config::LaunchConfig;
use crate::direction::Direction;
use crate::error::{FinishResult, LaunchError, LaunchResult};
use crate::launcher;
use crate::slot::Slot;
use crate::stream::Stream;
use crate::terminator::{self, SystemWaiter, Waiter};
use nix::unistd::Pid;
use tracing::warn;

/// A single-slot co-process launcher.
///
/// At most one child is outstanding per session: [`Popen::launch`] hands
/// out a [`Stream`], and [`Popen::finish`] must be given that stream back
/// before the session launches again. Independent sessions do not share
/// state, so several of them can run side by side.
///
/// # Example
///
/// ```no_run
/// use std::io::Read;
/// use turbopopen::Popen;
///
/// let mut session = Popen::new();
/// let mut stream = session.launch("echo hello", "r")?;
///
/// let mut output = String::new();
/// stream.read_to_string(&mut output)?;
/// assert_eq!(output, "hello\n");
///
/// assert_eq!(session.finish(stream)?, 0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Default)]
pub struct Popen {
    slot: Slot,
    config: LaunchConfig,
}

impl Popen {
    /// Create a session with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with a custom configuration
    pub fn with_config(config: LaunchConfig) -> Self {
        Self {
            slot: Slot::new(),
            config,
        }
    }

    /// The session's launch configuration
    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Whether a child is outstanding
    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    /// Pid of the outstanding child
    pub fn child_pid(&self) -> Option<Pid> {
        self.slot.child()
    }

    /// Run `command` via the shell, connected in the direction given by the
    /// one-character tag `mode` (`"r"` or `"w"`).
    ///
    /// Checks, in order and before touching any OS resource: an outstanding
    /// stream ([`LaunchError::AlreadyInUse`]), an empty command
    /// ([`LaunchError::InvalidArgument`]), an outstanding child
    /// ([`LaunchError::AlreadyInUse`]) and the mode tag
    /// ([`LaunchError::InvalidArgument`]).
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn launch(&mut self, command: &str, mode: &str) -> LaunchResult<Stream> {
        self.check_available(command)?;
        let direction: Direction = mode.parse()?;
        launcher::start(&mut self.slot, &self.config, command, direction)
    }

    /// Like [`Popen::launch`] with an already parsed direction.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn spawn(&mut self, command: &str, direction: Direction) -> LaunchResult<Stream> {
        self.check_available(command)?;
        launcher::start(&mut self.slot, &self.config, command, direction)
    }

    /// Close `stream` and block until the child exits, returning its exit code.
    ///
    /// A stream this session did not hand out, or any stream while nothing
    /// is outstanding, is refused without being closed; get it back with
    /// [`FinishError::into_stream`](crate::FinishError::into_stream).
    pub fn finish(&mut self, stream: Stream) -> FinishResult<i32> {
        self.finish_with(stream, &mut SystemWaiter)
    }

    /// Like [`Popen::finish`], collecting the child through `waiter`.
    #[tracing::instrument(level = "debug", skip_all, fields(stream = %stream.id()))]
    pub fn finish_with<W: Waiter + ?Sized>(
        &mut self,
        stream: Stream,
        waiter: &mut W,
    ) -> FinishResult<i32> {
        terminator::finish(&mut self.slot, stream, waiter)
    }

    fn check_available(&self, command: &str) -> LaunchResult<()> {
        if self.slot.stream().is_some() {
            return Err(LaunchError::AlreadyInUse);
        }
        if command.is_empty() {
            return Err(LaunchError::InvalidArgument(
                "command must not be empty".to_string(),
            ));
        }
        if self.slot.child().is_some() {
            return Err(LaunchError::AlreadyInUse);
        }
        Ok(())
    }
}

impl Drop for Popen {
    fn drop(&mut self) {
        if let Some(pid) = self.slot.child() {
            warn!(
                pid = pid.as_raw(),
                "co-process session dropped with an outstanding child"
            );
        }
    }
}
