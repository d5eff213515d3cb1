//! Launch configuration

use std::path::PathBuf;

/// Exit code the child uses when redirection or exec fails.
pub const DEFAULT_FAILURE_EXIT_CODE: i32 = libc::EXIT_FAILURE;

/// Default capacity of the stream's user-space buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Configuration for launching co-processes
///
/// The command itself is always handed to the shell as the single argument
/// following `-c`; the child inherits the caller's environment unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Path to the command shell
    pub shell: PathBuf,

    /// `argv[0]` passed to the shell
    pub shell_name: String,

    /// Exit code used by the child when it cannot exec the shell
    pub failure_exit_code: i32,

    /// Capacity of the stream buffer in bytes
    pub buffer_capacity: usize,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
            shell_name: "sh".to_string(),
            failure_exit_code: DEFAULT_FAILURE_EXIT_CODE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl LaunchConfig {
    /// Create a new launch configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shell path
    ///
    /// `argv[0]` follows the file name of the path unless set explicitly
    /// with [`LaunchConfig::with_shell_name`] afterwards.
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        if let Some(name) = self.shell.file_name() {
            self.shell_name = name.to_string_lossy().into_owned();
        }
        self
    }

    /// Set `argv[0]` for the shell
    pub fn with_shell_name(mut self, name: impl Into<String>) -> Self {
        self.shell_name = name.into();
        self
    }

    /// Set the exit code used when the child cannot exec the shell
    pub fn with_failure_exit_code(mut self, code: i32) -> Self {
        self.failure_exit_code = code;
        self
    }

    /// Set the stream buffer capacity
    ///
    /// A capacity of zero is clamped to one byte.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = std::cmp::max(capacity, 1);
        self
    }
}
