//! Process-wide default slot
//!
//! The free functions here share one [`Popen`] per process, which keeps the
//! classic `popen`/`pclose` contract: one outstanding child at a time, no
//! matter who launched it.

use crate::direction::Direction;
use crate::error::{FinishResult, LaunchResult};
use crate::session::Popen;
use crate::stream::Stream;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError, TryLockError};

static DEFAULT_SESSION: LazyLock<Mutex<Popen>> = LazyLock::new(|| Mutex::new(Popen::new()));

fn session() -> MutexGuard<'static, Popen> {
    // Slot updates never straddle a panic point.
    DEFAULT_SESSION
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Launch `command` on the process-wide slot. See [`Popen::launch`].
pub fn launch(command: &str, mode: &str) -> LaunchResult<Stream> {
    session().launch(command, mode)
}

/// Launch with a parsed direction on the process-wide slot. See [`Popen::spawn`].
pub fn spawn(command: &str, direction: Direction) -> LaunchResult<Stream> {
    session().spawn(command, direction)
}

/// Close the process-wide slot's stream and collect its child. See [`Popen::finish`].
///
/// Blocks until the child exits; other callers of the process-wide slot
/// wait for it.
pub fn finish(stream: Stream) -> FinishResult<i32> {
    session().finish(stream)
}

/// Whether the process-wide slot has an outstanding child.
///
/// Never blocks: while another thread is inside [`launch`] or [`finish`]
/// the slot counts as busy.
pub fn is_busy() -> bool {
    match DEFAULT_SESSION.try_lock() {
        Ok(session) => session.is_busy(),
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_busy(),
        Err(TryLockError::WouldBlock) => true,
    }
}
