//! Which way bytes flow between the caller and the child

use crate::error::LaunchError;
use std::fmt;
use std::os::fd::RawFd;
use std::str::FromStr;

/// Direction of a co-process pipe.
///
/// Parsed from the one-character tags `"r"` and `"w"`; any other string,
/// including multi-character ones like `"rw"`, is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The caller reads what the child writes to its standard output.
    ReadFromChild,

    /// The caller writes what the child reads from its standard input.
    WriteToChild,
}

impl Direction {
    /// The one-character tag for this direction.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::ReadFromChild => "r",
            Self::WriteToChild => "w",
        }
    }

    /// The standard stream number that gets replaced in the child.
    pub fn child_fd(&self) -> RawFd {
        match self {
            Self::ReadFromChild => libc::STDOUT_FILENO,
            Self::WriteToChild => libc::STDIN_FILENO,
        }
    }
}

impl FromStr for Direction {
    type Err = LaunchError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "r" => Ok(Self::ReadFromChild),
            "w" => Ok(Self::WriteToChild),
            other => Err(LaunchError::InvalidArgument(format!(
                "direction must be \"r\" or \"w\", got {:?}",
                other
            ))),
        }
    }
}

impl TryFrom<&str> for Direction {
    type Error = LaunchError;

    fn try_from(tag: &str) -> Result<Self, Self::Error> {
        tag.parse()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}
