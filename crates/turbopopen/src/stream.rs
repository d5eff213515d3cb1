//! Byte stream connected to a co-process

use crate::direction::Direction;
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::unistd::Pid;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Stream`].
///
/// Used to check that the stream passed to finish is the one that was
/// handed out; descriptor numbers get reused, ids do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    pub(crate) fn next() -> Self {
        Self(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

#[derive(Debug)]
enum Inner {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
}

/// The caller's end of a co-process pipe.
///
/// A stream launched with [`Direction::ReadFromChild`] implements [`Read`]
/// and [`BufRead`] over the child's standard output; one launched with
/// [`Direction::WriteToChild`] implements [`Write`] into the child's
/// standard input. I/O against the other side fails with
/// [`io::ErrorKind::Unsupported`].
///
/// Hand the stream back to finish to close it and collect the exit code.
/// Dropping it closes the pipe but leaves the child outstanding.
#[derive(Debug)]
pub struct Stream {
    id: StreamId,
    direction: Direction,
    child: Pid,
    inner: Inner,
}

impl Stream {
    /// Wrap the retained pipe end, checking that its access mode matches
    /// the direction.
    pub(crate) fn from_fd(
        fd: OwnedFd,
        direction: Direction,
        child: Pid,
        capacity: usize,
    ) -> Result<Self, Errno> {
        check_access_mode(fd.as_raw_fd(), direction)?;

        let file = File::from(fd);
        let inner = match direction {
            Direction::ReadFromChild => Inner::Reader(BufReader::with_capacity(capacity, file)),
            Direction::WriteToChild => Inner::Writer(BufWriter::with_capacity(capacity, file)),
        };

        Ok(Self {
            id: StreamId::next(),
            direction,
            child,
            inner,
        })
    }

    /// Identity of this stream.
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Direction this stream was opened in.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Pid of the child on the other end.
    pub fn child_pid(&self) -> Pid {
        self.child
    }

    /// Flush pending output and close the descriptor.
    ///
    /// The descriptor is closed even when flushing fails.
    pub(crate) fn close(self) -> io::Result<()> {
        let file = match self.inner {
            Inner::Reader(reader) => reader.into_inner(),
            Inner::Writer(writer) => writer.into_inner().map_err(|err| err.into_error())?,
        };
        nix::unistd::close(file.into_raw_fd()).map_err(io::Error::from)
    }

}

fn wrong_side(id: StreamId, direction: Direction) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{} was opened with direction {:?}", id, direction),
    )
}

fn check_access_mode(fd: RawFd, direction: Direction) -> Result<(), Errno> {
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    let mode = flags & OFlag::O_ACCMODE;
    let ok = match direction {
        Direction::ReadFromChild => mode == OFlag::O_RDONLY || mode == OFlag::O_RDWR,
        Direction::WriteToChild => mode == OFlag::O_WRONLY || mode == OFlag::O_RDWR,
    };
    if ok { Ok(()) } else { Err(Errno::EINVAL) }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Reader(reader) => reader.read(buf),
            Inner::Writer(_) => Err(wrong_side(self.id, self.direction)),
        }
    }
}

impl BufRead for Stream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match &mut self.inner {
            Inner::Reader(reader) => reader.fill_buf(),
            Inner::Writer(_) => Err(wrong_side(self.id, self.direction)),
        }
    }

    fn consume(&mut self, amt: usize) {
        if let Inner::Reader(reader) = &mut self.inner {
            reader.consume(amt);
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Writer(writer) => writer.write(buf),
            Inner::Reader(_) => Err(wrong_side(self.id, self.direction)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            Inner::Writer(writer) => writer.flush(),
            Inner::Reader(_) => Ok(()),
        }
    }
}

impl AsFd for Stream {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match &self.inner {
            Inner::Reader(reader) => reader.get_ref().as_fd(),
            Inner::Writer(writer) => writer.get_ref().as_fd(),
        }
    }
}

impl AsRawFd for Stream {
    fn as_raw_fd(&self) -> RawFd {
        self.as_fd().as_raw_fd()
    }
}
