//! Single-slot co-process launcher for Unix
//!
//! Runs a command line under `/bin/sh -c`, connects one end of a pipe to the
//! child's standard input or output, and hands the other end back as a byte
//! stream. Finishing closes the stream and blocks until the child exits,
//! returning its exit code.
//!
//! # Architecture
//!
//! - **Slot**: records the outstanding child and the stream issued for it
//! - **Launcher**: pipe + fork, descriptor redirection in the child, stream setup in the parent
//! - **Terminator**: validates and closes the stream, then reaps the child
//! - **Session**: [`Popen`] bundles a slot with its [`LaunchConfig`]
//!
//! The free functions [`launch`], [`spawn`], [`finish`] and [`is_busy`] work
//! on one process-wide session. Create your own [`Popen`] values for
//! independent slots.
//!
//! # Usage
//!
//! ```no_run
//! use std::io::Write;
//!
//! let mut stream = turbopopen::launch("tr a-z A-Z", "w")?;
//! stream.write_all(b"shout\n")?;
//! let code = turbopopen::finish(stream)?;
//! assert_eq!(code, 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod child;
pub mod config;
pub mod direction;
pub mod error;
mod global;
mod launcher;
pub mod session;
pub mod slot;
pub mod stream;
pub mod terminator;

// Re-export commonly used types
pub use config::LaunchConfig;
pub use direction::Direction;
pub use error::{FinishError, FinishResult, LaunchError, LaunchResult, NoChildCause};
pub use global::{finish, is_busy, launch, spawn};
pub use session::Popen;
pub use stream::{Stream, StreamId};
pub use terminator::{SystemWaiter, Waiter, reap};

pub use nix::unistd::Pid;
