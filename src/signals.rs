//! Asynchronous signal routing.
//!
//! The installed handler sets the signal's bit in a process-wide atomic set
//! and writes one byte to a non-blocking wake-up socket. Everything else
//! (dumping history, reaping children, printing notices) happens in the main
//! loop once it observes a non-empty set. The main loop never blocks on stdin
//! alone: it polls stdin together with the wake-up socket, so a signal that
//! lands just before the wait still ends it. Handlers are installed without
//! `SA_RESTART` so that a blocked `waitpid(2)` also wakes up.

use crate::children::ChildRegistry;
use crate::errors::{ShellError, ShellResult};
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use once_cell::sync::OnceCell;
use std::io::Read;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use tracing::{debug, info};

/// Signals left at their default disposition.
///
/// SIGQUIT stays fatal so there is always a way out. The hardware faults
/// would re-fire forever if a handler simply returned. SIGKILL and SIGSTOP
/// cannot be caught at all.
const DEFAULT_DISPOSITION: [Signal; 7] = [
    Signal::SIGQUIT,
    Signal::SIGKILL,
    Signal::SIGSTOP,
    Signal::SIGSEGV,
    Signal::SIGBUS,
    Signal::SIGFPE,
    Signal::SIGILL,
];

static PENDING: AtomicU64 = AtomicU64::new(0);
/// Write end of the wake-up socket, or -1 before [`install`].
static WAKE_TX: AtomicI32 = AtomicI32::new(-1);
static ROUTER: OnceCell<Router> = OnceCell::new();

struct Router {
    signals: Vec<Signal>,
    wake_rx: UnixStream,
    // Kept open for the handler, which only sees its raw fd.
    _wake_tx: UnixStream,
}

extern "C" fn record_signal(signum: libc::c_int) {
    // Only lock-free atomics and write(2) in here.
    if (0..64).contains(&signum) {
        PENDING.fetch_or(1 << signum, Ordering::SeqCst);
    }
    let fd = WAKE_TX.load(Ordering::SeqCst);
    if fd >= 0 {
        let saved = Errno::last_raw();
        let byte = [0u8];
        // A full socket already holds a wake-up, so a failed write is fine.
        // SAFETY: write(2) is async-signal-safe and `byte` outlives the call.
        unsafe {
            libc::write(fd, byte.as_ptr().cast(), 1);
        }
        Errno::set_raw(saved);
    }
}

/// Every signal the router takes over.
pub fn routed_signals() -> impl Iterator<Item = Signal> {
    Signal::iterator().filter(|signal| !DEFAULT_DISPOSITION.contains(signal))
}

/// Install the recording handler for every routed signal.
///
/// Safe to call more than once; only the first call touches the process
/// signal table.
pub fn install() -> ShellResult<&'static [Signal]> {
    ROUTER
        .get_or_try_init(|| {
            let (wake_rx, wake_tx) = UnixStream::pair()?;
            wake_rx.set_nonblocking(true)?;
            wake_tx.set_nonblocking(true)?;
            WAKE_TX.store(wake_tx.as_raw_fd(), Ordering::SeqCst);

            let mut signals = Vec::new();
            for signal in routed_signals() {
                let flags = if signal == Signal::SIGCHLD {
                    SaFlags::SA_NOCLDSTOP
                } else {
                    SaFlags::empty()
                };
                let action = SigAction::new(SigHandler::Handler(record_signal), flags, SigSet::empty());
                // SAFETY: the handler only performs an atomic fetch_or and a write(2).
                unsafe { sigaction(signal, &action) }
                    .map_err(|source| ShellError::SignalSetup { signal, source })?;
                signals.push(signal);
            }
            debug!(count = signals.len(), "signal handlers installed");
            Ok::<_, ShellError>(Router {
                signals,
                wake_rx,
                _wake_tx: wake_tx,
            })
        })
        .map(|router| router.signals.as_slice())
}

/// Read end of the wake-up socket; `None` until [`install`] has run.
pub fn wake_fd() -> Option<BorrowedFd<'static>> {
    ROUTER.get().map(|router| router.wake_rx.as_fd())
}

/// Empty the wake-up socket.
///
/// Returns whether a signal is still waiting to be handled. A leftover byte
/// whose signal was already taken by [`take_pending`] reports `false`.
pub fn consume_wakeups() -> bool {
    if let Some(router) = ROUTER.get() {
        let mut buf = [0u8; 64];
        // Stops at WouldBlock once the socket is empty.
        while let Ok(n) = (&router.wake_rx).read(&mut buf) {
            if n == 0 {
                break;
            }
        }
    }
    is_pending()
}

/// Whether any signal arrived since the last [`take_pending`].
pub fn is_pending() -> bool {
    PENDING.load(Ordering::SeqCst) != 0
}

/// Atomically fetch and clear the set of delivered signals.
pub fn take_pending() -> PendingSignals {
    PendingSignals(PENDING.swap(0, Ordering::SeqCst))
}

/// Snapshot of the signals delivered since the previous snapshot.
///
/// Several deliveries of the same signal collapse into one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingSignals(u64);

impl PendingSignals {
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, signal: Signal) -> bool {
        self.0 & (1 << signal as i32) != 0
    }

    /// Delivered signals in ascending signal-number order.
    pub fn iter(&self) -> impl Iterator<Item = Signal> + '_ {
        (1..64)
            .filter(move |bit| self.0 & (1u64 << bit) != 0)
            .filter_map(|bit| Signal::try_from(bit).ok())
    }
}

/// A background child whose termination was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaped {
    pub pid: Pid,
    /// `None` when the child had already been collected elsewhere.
    pub status: Option<WaitStatus>,
}

/// Collect every tracked child that has terminated, without blocking.
///
/// Each tracked pid is polled on its own so coalesced SIGCHLD deliveries are
/// all accounted for, and no status belonging to an untracked (foreground)
/// child is ever consumed here.
pub fn reap_children(children: &mut ChildRegistry) -> ShellResult<Vec<Reaped>> {
    let mut reaped = Vec::new();
    for pid in children.pids() {
        if let Some(status) = poll_child(pid)? {
            reaped.push(Reaped { pid, status });
        }
    }

    for child in &reaped {
        children.unregister(child.pid)?;
        match child.status {
            Some(WaitStatus::Exited(_, code)) => info!(pid = %child.pid, code, "background child exited"),
            Some(WaitStatus::Signaled(_, signal, _)) => {
                info!(pid = %child.pid, %signal, "background child killed")
            }
            _ => debug!(pid = %child.pid, "background child already collected"),
        }
    }
    Ok(reaped)
}

/// `Ok(None)` while the child runs, `Ok(Some(..))` once it is gone.
fn poll_child(pid: Pid) -> ShellResult<Option<Option<WaitStatus>>> {
    loop {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(status @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => {
                return Ok(Some(Some(status)))
            }
            Ok(_) => return Ok(None),
            Err(Errno::EINTR) => {}
            Err(Errno::ECHILD) => return Ok(Some(None)),
            Err(source) => return Err(ShellError::Wait { pid, source }),
        }
    }
}
