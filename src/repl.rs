use crate::children::ChildRegistry;
use crate::cli::ShellArgs;
use crate::commands::{self, Dispatch};
use crate::errors::ShellResult;
use crate::history::HistoryBuffer;
use crate::signals::{self, PendingSignals};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{kill, Signal};
use std::fs::File;
use std::io::{self, Read, Write};
use std::mem::ManuallyDrop;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd};
use tracing::{debug, info, warn};

/// Bytes requested from stdin per `read(2)`.
pub const READ_CHUNK: usize = 64;

/// Longest line handed to the dispatcher; the rest of the line is discarded.
pub const MAX_LINE_BYTES: usize = 4096;

/// Unbuffered handle on file descriptor 0.
///
/// Every `read` is a single `read(2)`, so EINTR surfaces as
/// [`io::ErrorKind::Interrupted`] instead of being retried, and bytes the
/// shell has not asked for stay in the kernel for the next child to read.
pub struct RawStdin(ManuallyDrop<File>);

impl RawStdin {
    pub fn new() -> Self {
        // SAFETY: fd 0 stays open for the life of the process and the File is
        // never dropped, so it is never closed behind std's back.
        let file = unsafe { File::from_raw_fd(io::stdin().as_raw_fd()) };
        Self(ManuallyDrop::new(file))
    }
}

impl Default for RawStdin {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for RawStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl AsFd for RawStdin {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

/// Blocks until `inner` is readable or a routed signal arrives.
///
/// Waiting happens in `poll(2)` on the input and the signal wake-up socket
/// together, so a signal delivered at any point before or during the wait
/// ends it with [`io::ErrorKind::Interrupted`]. Without installed handlers
/// this is a plain pass-through.
pub struct SignalAwareReader<R> {
    inner: R,
}

impl<R> SignalAwareReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + AsFd> Read for SignalAwareReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(wake) = signals::wake_fd() else {
            return self.inner.read(buf);
        };

        loop {
            let (woken, input_ready) = {
                let mut fds = [
                    PollFd::new(self.inner.as_fd(), PollFlags::POLLIN),
                    PollFd::new(wake, PollFlags::POLLIN),
                ];
                match poll(&mut fds, PollTimeout::NONE) {
                    Ok(_) => {}
                    Err(Errno::EINTR) => continue,
                    Err(e) => return Err(e.into()),
                }
                let ready = |fd: &PollFd<'_>| fd.revents().is_some_and(|r| !r.is_empty());
                (ready(&fds[1]), ready(&fds[0]))
            };

            if woken && signals::consume_wakeups() {
                return Err(io::ErrorKind::Interrupted.into());
            }
            if input_ready {
                // Readiness includes hang-up, which read(2) reports as EOF.
                return self.inner.read(buf);
            }
        }
    }
}

/// Result of waiting for one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete line with its terminator stripped.
    Line(String),
    /// A signal arrived before a line was complete.
    Interrupted,
    /// No more input.
    Eof,
}

/// Reassembles lines from fixed-size reads.
///
/// Bytes are only ever returned as part of a complete line. An interrupted
/// read transfers nothing, so bytes buffered before it are kept for the next
/// call rather than being mistaken for a command.
pub struct LineReader<R> {
    inner: R,
    pending: Vec<u8>,
    discarding: bool,
    eof: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            discarding: false,
            eof: false,
        }
    }

    pub fn read_line(&mut self) -> io::Result<ReadOutcome> {
        loop {
            if let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=end).collect();
                return Ok(ReadOutcome::Line(decode(&line)));
            }
            if self.eof {
                if self.pending.is_empty() {
                    return Ok(ReadOutcome::Eof);
                }
                let line = std::mem::take(&mut self.pending);
                return Ok(ReadOutcome::Line(decode(&line)));
            }
            let mut chunk = [0u8; READ_CHUNK];
            match self.inner.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.accept(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    return Ok(ReadOutcome::Interrupted)
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn accept(&mut self, mut data: &[u8]) {
        if self.discarding {
            match data.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.discarding = false;
                    data = &data[end..];
                }
                None => return,
            }
        }
        self.pending.extend_from_slice(data);

        let line_len = self
            .pending
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(self.pending.len());
        if line_len > MAX_LINE_BYTES {
            warn!(limit = MAX_LINE_BYTES, "input line truncated");
            eprintln!("warning: line longer than {} bytes truncated", MAX_LINE_BYTES);
            let rest = self.pending.split_off(line_len);
            self.pending.truncate(MAX_LINE_BYTES);
            if rest.is_empty() {
                self.discarding = true;
            } else {
                self.pending.extend_from_slice(&rest);
            }
        }
    }
}

fn decode(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(line);
    text.trim_end_matches(['\n', '\r']).to_string()
}

/// Interactive shell state: configuration, history and background children.
pub struct Shell {
    prompt: String,
    max_args: usize,
    history: HistoryBuffer,
    children: ChildRegistry,
    signal_source: fn() -> PendingSignals,
}

impl Shell {
    pub fn new(args: &ShellArgs) -> Self {
        Self {
            prompt: args.prompt.clone(),
            max_args: args.max_args.get(),
            history: HistoryBuffer::new(args.history_size.get()),
            children: ChildRegistry::new(),
            signal_source: signals::take_pending,
        }
    }

    /// Replace where delivered signals are collected from.
    pub fn with_signal_source(mut self, source: fn() -> PendingSignals) -> Self {
        self.signal_source = source;
        self
    }

    pub fn max_args(&self) -> usize {
        self.max_args
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn children(&self) -> &ChildRegistry {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut ChildRegistry {
        &mut self.children
    }

    /// Prompt, read, dispatch until end of input or `exit`.
    ///
    /// Background children still running when the loop ends are killed.
    /// Returns the process exit code.
    pub fn run<R: Read>(&mut self, reader: &mut LineReader<R>) -> ShellResult<i32> {
        let result = self.run_loop(reader);
        self.shutdown();
        result
    }

    fn run_loop<R: Read>(&mut self, reader: &mut LineReader<R>) -> ShellResult<i32> {
        loop {
            self.handle_signals((self.signal_source)());
            self.show_prompt();

            let line = match reader.read_line()? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Interrupted => continue,
                ReadOutcome::Eof => return Ok(0),
            };
            if line.trim().is_empty() {
                continue;
            }

            self.history.record(&line);
            match commands::dispatch(&line, self) {
                Ok(Dispatch::Exit(code)) => return Ok(code),
                Ok(_) => {}
                Err(e) => eprintln!("{}", e),
            }
        }
    }

    fn show_prompt(&self) {
        let mut out = io::stdout();
        // Prompt failures are not fatal.
        let _ = write!(out, "{}", self.prompt).and_then(|()| out.flush());
    }

    /// Do the work deferred by the signal handler.
    pub fn handle_signals(&mut self, pending: PendingSignals) {
        for signal in pending.iter() {
            match signal {
                Signal::SIGINT => {
                    let mut out = io::stdout().lock();
                    let _ = writeln!(out).and_then(|()| self.history.print_all(&mut out));
                }
                Signal::SIGCHLD => {
                    if let Err(e) = signals::reap_children(&mut self.children) {
                        warn!(error = %e, "reaping background children failed");
                    }
                }
                other => {
                    debug!(signal = %other, "unhandled signal");
                    let _ = writeln!(io::stdout(), "\nReceived signal: {}", other as i32);
                }
            }
        }
    }

    /// Forcibly kill every background child that is still registered.
    pub fn shutdown(&mut self) {
        let pids = match self.children.drain_all() {
            Ok(pids) => pids,
            Err(e) => {
                warn!(error = %e, "could not drain child registry");
                self.children.pids()
            }
        };
        for pid in pids {
            match kill(pid, Signal::SIGKILL) {
                Ok(()) => info!(pid = %pid, "killed background child"),
                Err(Errno::ESRCH) => {}
                Err(e) => warn!(pid = %pid, error = %e, "kill failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Hands out scripted read results one call at a time.
    struct Scripted(VecDeque<io::Result<Vec<u8>>>);

    impl Scripted {
        fn new(steps: Vec<io::Result<&str>>) -> Self {
            Self(steps.into_iter().map(|s| s.map(|text| text.as_bytes().to_vec())).collect())
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(bytes)) => {
                    assert!(bytes.len() <= buf.len(), "script step larger than a read");
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
            }
        }
    }

    fn interrupted() -> io::Error {
        io::Error::from(io::ErrorKind::Interrupted)
    }

    fn line(text: &str) -> ReadOutcome {
        ReadOutcome::Line(text.to_string())
    }

    #[test]
    fn test_several_lines_in_one_read() {
        let mut reader = LineReader::new(&b"ls\npwd\r\n"[..]);
        assert_eq!(reader.read_line().unwrap(), line("ls"));
        assert_eq!(reader.read_line().unwrap(), line("pwd"));
        assert_eq!(reader.read_line().unwrap(), ReadOutcome::Eof);
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut reader = LineReader::new(Scripted::new(vec![Ok("sle"), Ok("ep 1"), Ok("\n")]));
        assert_eq!(reader.read_line().unwrap(), line("sleep 1"));
    }

    #[test]
    fn test_interrupt_keeps_partial_line() {
        let mut reader = LineReader::new(Scripted::new(vec![
            Ok("echo "),
            Err(interrupted()),
            Ok("hi\n"),
        ]));
        assert_eq!(reader.read_line().unwrap(), ReadOutcome::Interrupted);
        assert_eq!(reader.read_line().unwrap(), line("echo hi"));
    }

    #[test]
    fn test_final_line_without_newline_is_returned() {
        let mut reader = LineReader::new(&b"true"[..]);
        assert_eq!(reader.read_line().unwrap(), line("true"));
        assert_eq!(reader.read_line().unwrap(), ReadOutcome::Eof);
    }

    #[test]
    fn test_long_line_is_truncated() {
        let mut input = vec![b'x'; MAX_LINE_BYTES + 500];
        input.extend_from_slice(b"\nnext\n");
        let mut reader = LineReader::new(&input[..]);

        match reader.read_line().unwrap() {
            ReadOutcome::Line(text) => assert_eq!(text.len(), MAX_LINE_BYTES),
            other => panic!("expected a line, got {:?}", other),
        }
        assert_eq!(reader.read_line().unwrap(), line("next"));
    }

    #[test]
    fn test_other_read_errors_propagate() {
        let mut reader = LineReader::new(Scripted::new(vec![Err(io::Error::other("boom"))]));
        assert!(reader.read_line().is_err());
    }

    #[test]
    fn test_run_records_history_and_exits_with_code() {
        let mut shell = Shell::new(&ShellArgs::default()).with_signal_source(PendingSignals::default);
        let mut reader = LineReader::new(&b"\n   \nhistory\nexit 7\nhistory\n"[..]);

        assert_eq!(shell.run(&mut reader).unwrap(), 7);
        assert_eq!(
            shell.history().entries().collect::<Vec<_>>(),
            vec!["history", "exit 7"]
        );
    }

    #[test]
    fn test_run_returns_zero_at_eof() {
        let mut shell = Shell::new(&ShellArgs::default()).with_signal_source(PendingSignals::default);
        let mut reader = LineReader::new(&b"help\n"[..]);
        assert_eq!(shell.run(&mut reader).unwrap(), 0);
    }
}
