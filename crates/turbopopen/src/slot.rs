//! Bookkeeping for the one outstanding child of a session

use crate::stream::StreamId;
use nix::unistd::Pid;

/// Tracks the outstanding child and the stream handed out for it.
///
/// `stream` is only ever set while `child` is set. Both are cleared together
/// once the child has been reaped or reaping has definitively failed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    child: Option<Pid>,
    stream: Option<StreamId>,
}

impl Slot {
    /// An empty slot.
    pub const fn new() -> Self {
        Self {
            child: None,
            stream: None,
        }
    }

    /// Whether a child or a stream is currently outstanding.
    pub fn is_busy(&self) -> bool {
        self.child.is_some() || self.stream.is_some()
    }

    /// The outstanding child, if any.
    pub fn child(&self) -> Option<Pid> {
        self.child
    }

    /// The stream handed out for the outstanding child, if any.
    pub fn stream(&self) -> Option<StreamId> {
        self.stream
    }

    pub(crate) fn record_child(&mut self, pid: Pid) {
        self.child = Some(pid);
    }

    pub(crate) fn record_stream(&mut self, id: StreamId) {
        debug_assert!(self.child.is_some(), "stream recorded without a child");
        self.stream = Some(id);
    }

    pub(crate) fn clear(&mut self) {
        self.child = None;
        self.stream = None;
    }
}
