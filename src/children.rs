//! Bookkeeping for background children that are still believed to be alive.
//!
//! Every mutation of the registry runs inside a [`SigchldBlock`], so SIGCHLD
//! is never delivered while the set is half updated. A child that exits
//! before its pid is registered simply leaves a pending SIGCHLD behind, and
//! the next reaping pass finds it.

use crate::errors::{ShellError, ShellResult};
use nix::sys::signal::{SigSet, SigmaskHow, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;

/// Blocks SIGCHLD for the calling thread until dropped.
pub struct SigchldBlock {
    previous: SigSet,
}

impl SigchldBlock {
    pub fn new() -> ShellResult<Self> {
        let mut mask = SigSet::empty();
        mask.add(Signal::SIGCHLD);
        let previous = mask
            .thread_swap_mask(SigmaskHow::SIG_BLOCK)
            .map_err(ShellError::SignalMask)?;
        Ok(Self { previous })
    }
}

impl Drop for SigchldBlock {
    fn drop(&mut self) {
        // Restoring a mask we just read back cannot fail in practice.
        let _ = self.previous.thread_set_mask();
    }
}

/// Set of background children awaiting reaping.
///
/// Grows on demand; there is no upper bound on tracked children.
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<Pid>,
}

impl ChildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `pid`. Registering a pid twice keeps a single entry.
    pub fn register(&mut self, pid: Pid) -> ShellResult<()> {
        let _guard = SigchldBlock::new()?;
        self.pids.insert(pid);
        Ok(())
    }

    /// Stop tracking `pid`. Returns whether it was tracked; an unknown pid is
    /// not an error because the child may already have been reaped.
    pub fn unregister(&mut self, pid: Pid) -> ShellResult<bool> {
        let _guard = SigchldBlock::new()?;
        Ok(self.pids.remove(&pid))
    }

    /// Remove and return every tracked pid, alive or not.
    pub fn drain_all(&mut self) -> ShellResult<Vec<Pid>> {
        let _guard = SigchldBlock::new()?;
        Ok(self.pids.drain().collect())
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.pids.contains(&pid)
    }

    /// Snapshot of the tracked pids, in no particular order.
    pub fn pids(&self) -> Vec<Pid> {
        self.pids.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }
}
