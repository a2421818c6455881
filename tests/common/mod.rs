#![allow(dead_code)]

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{channel, Receiver};
use std::thread;
use std::time::{Duration, Instant};

pub const PROMPT: &str = "OS1Shell -> ";
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// A running shell binary with captured output.
pub struct ShellProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Receiver<Vec<u8>>,
    stderr: Receiver<Vec<u8>>,
    out: String,
    err: String,
}

fn pump<R: Read + Send + 'static>(mut source: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = channel();
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match source.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

impl ShellProcess {
    pub fn spawn(log_filter: &str) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_os1sh"))
            .env("OS1SH_LOG", log_filter)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to start shell binary");
        let stdin = child.stdin.take();
        let stdout = pump(child.stdout.take().unwrap());
        let stderr = pump(child.stderr.take().unwrap());
        Self {
            child,
            stdin,
            stdout,
            stderr,
            out: String::new(),
            err: String::new(),
        }
    }

    pub fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    pub fn send(&mut self, text: &str) {
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        stdin.write_all(text.as_bytes()).unwrap();
        stdin.flush().unwrap();
    }

    pub fn signal(&self, signal: Signal) {
        kill(self.pid(), signal).unwrap();
    }

    fn drain(&mut self) {
        while let Ok(chunk) = self.stdout.try_recv() {
            self.out.push_str(&String::from_utf8_lossy(&chunk));
        }
        while let Ok(chunk) = self.stderr.try_recv() {
            self.err.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    /// Wait until stdout contains `needle` at least `count` times.
    pub fn wait_stdout(&mut self, needle: &str, count: usize) -> &str {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            self.drain();
            if self.out.matches(needle).count() >= count {
                return &self.out;
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {:?} x{} in stdout:\n{}\nstderr:\n{}",
                needle,
                count,
                self.out,
                self.err
            );
            thread::sleep(Duration::from_millis(20));
        }
    }

    /// Wait until stderr contains `needle` at least `count` times.
    pub fn wait_stderr(&mut self, needle: &str, count: usize) -> &str {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            self.drain();
            if self.err.matches(needle).count() >= count {
                return &self.err;
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {:?} x{} in stderr:\n{}",
                needle,
                count,
                self.err
            );
            thread::sleep(Duration::from_millis(20));
        }
    }

    /// Close stdin and wait for the shell to exit; returns (code, stdout, stderr).
    pub fn finish(mut self) -> (Option<i32>, String, String) {
        drop(self.stdin.take());
        let status = self.child.wait().unwrap();
        // Pump threads end once the pipes close.
        let deadline = Instant::now() + TIMEOUT;
        loop {
            self.drain();
            let closed = matches!(
                self.stdout.try_recv(),
                Err(std::sync::mpsc::TryRecvError::Disconnected)
            ) && matches!(
                self.stderr.try_recv(),
                Err(std::sync::mpsc::TryRecvError::Disconnected)
            );
            if closed || Instant::now() > deadline {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        self.drain();
        (status.code(), self.out, self.err)
    }
}

/// Run the shell over a fixed script and collect everything it printed.
pub fn run_script(script: &str) -> (Option<i32>, String, String) {
    let mut shell = ShellProcess::spawn("warn");
    shell.send(script);
    shell.finish()
}

/// Pids logged as registered background children.
pub fn registered_pids(stderr: &str) -> Vec<i32> {
    stderr
        .lines()
        .filter(|line| line.contains("background child registered"))
        .filter_map(|line| {
            let start = line.find("pid=")? + "pid=".len();
            let digits: String = line[start..].chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .collect()
}

/// True once `pid` no longer runs (gone or a zombie awaiting its new parent).
pub fn is_dead(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Err(_) => true,
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .and_then(|rest| rest.split_whitespace().next())
            .map_or(true, |state| state == "Z" || state == "X"),
    }
}

pub fn wait_until_dead(pid: i32) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if is_dead(pid) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}
