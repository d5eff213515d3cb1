//! Error types for co-process operations
//!
//! Each public operation has its own error enum. OS failures carry the
//! underlying [`Errno`] instead of leaving it in a side channel, and every
//! variant can still report the errno value a C `popen`-style caller would
//! have observed via [`LaunchError::raw_os_error`] / [`FinishError::raw_os_error`].

use crate::stream::Stream;
use nix::errno::Errno;
use thiserror::Error;

/// Result type for [`launch`](crate::launch) and friends.
pub type LaunchResult<T> = std::result::Result<T, LaunchError>;

/// Result type for [`finish`](crate::finish) and friends.
pub type FinishResult<T> = std::result::Result<T, FinishError>;

/// Errors returned when starting a co-process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// A previously launched stream (or child) is still outstanding.
    #[error("a co-process is already outstanding; finish it before launching another")]
    AlreadyInUse,

    /// The command, the direction tag or the shell configuration is unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `pipe(2)` failed, usually because the descriptor table is full.
    #[error("failed to create pipe: {0}")]
    PipeCreationFailed(#[source] Errno),

    /// `fork(2)` failed.
    #[error("failed to fork: {0}")]
    ForkFailed(#[source] Errno),

    /// The retained pipe end could not be turned into a stream.
    #[error("failed to set up stream: {0}")]
    StreamSetupFailed(#[source] Errno),
}

impl LaunchError {
    /// The errno a C caller would have seen for this failure.
    pub fn raw_os_error(&self) -> i32 {
        match self {
            Self::AlreadyInUse => Errno::EAGAIN as i32,
            Self::InvalidArgument(_) => Errno::EINVAL as i32,
            Self::PipeCreationFailed(errno)
            | Self::ForkFailed(errno)
            | Self::StreamSetupFailed(errno) => *errno as i32,
        }
    }

    /// Whether the failure happened before any OS resource was touched.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::AlreadyInUse | Self::InvalidArgument(_))
    }
}

/// Why a finish call reported [`FinishError::NoChild`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoChildCause {
    /// `waitpid(2)` failed with something other than `EINTR`.
    WaitFailed(Errno),

    /// The child did not exit on its own (killed by a signal, stopped, ...).
    AbnormalTermination(String),
}

impl std::fmt::Display for NoChildCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaitFailed(errno) => write!(f, "waiting for the child failed: {}", errno),
            Self::AbnormalTermination(how) => write!(f, "child terminated abnormally: {}", how),
        }
    }
}

/// Errors returned when closing a co-process stream.
///
/// When finish refuses a stream before touching it ([`FinishError::NotLaunched`]
/// and [`FinishError::InvalidArgument`]), the stream travels back inside the
/// error. Recover it with [`FinishError::into_stream`] and hand it to the
/// session that launched it.
#[derive(Debug, Error)]
pub enum FinishError {
    /// Nothing is outstanding in this slot, or its child was already collected.
    #[error("no child: no child process is outstanding")]
    NotLaunched {
        /// The refused stream, still open.
        stream: Stream,
    },

    /// The child was waited for but could not be collected normally.
    #[error("no child: {0}")]
    NoChild(NoChildCause),

    /// The stream is not the one currently tracked.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What did not match.
        reason: String,
        /// The refused stream, still open.
        stream: Stream,
    },

    /// Flushing or closing the stream failed; the child was not reaped.
    #[error("failed to close stream: {0}")]
    CloseFailed(#[source] std::io::Error),
}

impl FinishError {
    /// The errno a C caller would have seen for this failure.
    pub fn raw_os_error(&self) -> i32 {
        match self {
            Self::NotLaunched { .. } | Self::NoChild(_) => Errno::ECHILD as i32,
            Self::InvalidArgument { .. } => Errno::EINVAL as i32,
            Self::CloseFailed(err) => err.raw_os_error().unwrap_or(Errno::EIO as i32),
        }
    }

    /// Whether this is one of the "no child" outcomes (`ECHILD`).
    pub fn is_no_child(&self) -> bool {
        matches!(self, Self::NotLaunched { .. } | Self::NoChild(_))
    }

    /// The refused stream, if finish handed it back.
    pub fn stream(&self) -> Option<&Stream> {
        match self {
            Self::NotLaunched { stream } | Self::InvalidArgument { stream, .. } => Some(stream),
            Self::NoChild(_) | Self::CloseFailed(_) => None,
        }
    }

    /// Take back the refused stream, if any.
    pub fn into_stream(self) -> Option<Stream> {
        match self {
            Self::NotLaunched { stream } | Self::InvalidArgument { stream, .. } => Some(stream),
            Self::NoChild(_) | Self::CloseFailed(_) => None,
        }
    }
}
