use crate::errors::{ShellError, ShellResult};
use nix::errno::Errno;
use nix::libc;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use std::ffi::CString;
use tracing::debug;

/// Exit status of a child whose program could not be executed.
pub const EXEC_FAILURE_STATUS: i32 = 255;

/// Fork a child that replaces itself with `argv[0]`, resolved through `PATH`.
///
/// The child inherits stdin, stdout, stderr and the environment. If the
/// program cannot be executed the child prints `<program>: <reason>` to
/// stderr and exits with [`EXEC_FAILURE_STATUS`]; the parent never hears
/// about it except through the exit status.
pub fn spawn(argv: &[String]) -> ShellResult<Pid> {
    let c_argv = argv
        .iter()
        .map(|arg| CString::new(arg.as_bytes()).map_err(|_| ShellError::InvalidArgument(arg.clone())))
        .collect::<ShellResult<Vec<_>>>()?;
    if c_argv.is_empty() {
        return Err(ShellError::InvalidArgument(String::new()));
    }
    // Everything the child touches is built here: between fork and exec the
    // child may only make async-signal-safe calls.
    let mut c_ptrs: Vec<*const libc::c_char> = c_argv.iter().map(|arg| arg.as_ptr()).collect();
    c_ptrs.push(std::ptr::null());
    let prefix = format!("{}: ", argv[0]);

    // SAFETY: the child branch only calls execvp, write and _exit.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!(pid = %child, program = %argv[0], "spawned child");
            Ok(child)
        }
        Ok(ForkResult::Child) => exec_or_exit(&c_ptrs, prefix.as_bytes()),
        Err(source) => Err(ShellError::ForkFailed(source)),
    }
}

/// `argv` is a null-terminated pointer array whose first entry is the program.
fn exec_or_exit(argv: &[*const libc::c_char], prefix: &[u8]) -> ! {
    // SAFETY: every pointer is a live CString owned by the parent frame, and
    // the array ends with a null pointer.
    unsafe {
        libc::execvp(argv[0], argv.as_ptr());
    }
    let reason = match Errno::last() {
        Errno::ENOENT => "command not found",
        other => other.desc(),
    };
    write_stderr(prefix);
    write_stderr(reason.as_bytes());
    write_stderr(b"\n");
    // SAFETY: _exit skips atexit handlers and stdio buffers inherited from the parent.
    unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
}

fn write_stderr(bytes: &[u8]) {
    // SAFETY: the pointer and length come from a live slice.
    unsafe {
        libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len());
    }
}

/// Block until `pid` terminates and return how it ended.
///
/// Only `pid` itself is waited on, so background children finishing in the
/// meantime are left for the reaper. EINTR from a delivered signal just
/// restarts the wait.
pub fn wait_foreground(pid: Pid) -> ShellResult<WaitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(status @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => {
                debug!(pid = %pid, ?status, "foreground child finished");
                return Ok(status);
            }
            Ok(_) | Err(Errno::EINTR) => {}
            Err(source) => return Err(ShellError::Wait { pid, source }),
        }
    }
}
