pub mod builtins;
pub mod external;
pub mod registry;

use crate::errors::ShellResult;
use crate::parser;
use crate::repl::Shell;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use registry::BUILTINS;
use tracing::{info, warn};

pub use external::{spawn, wait_foreground, EXEC_FAILURE_STATUS};
pub use registry::{BuiltinCommand, BuiltinOutcome, BuiltinRegistry};

/// What a dispatched line turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Blank line (or a lone `&`): nothing was run.
    Empty,
    /// A builtin ran inside the shell process.
    Builtin,
    /// A child ran to completion while the shell waited.
    Foreground { pid: Pid, status: WaitStatus },
    /// A child was started and registered for later reaping.
    Background { pid: Pid },
    /// The shell should shut down with this exit code.
    Exit(i32),
}

/// Tokenize `line` and run it.
///
/// `Err` means nothing was started (fork failure, NUL byte in an argument)
/// or a builtin failed. A program that cannot be executed still counts as
/// started: its child reports the problem and exits non-zero.
pub fn dispatch(line: &str, shell: &mut Shell) -> ShellResult<Dispatch> {
    let parsed = parser::parse(line, shell.max_args());
    if parsed.dropped > 0 {
        warn!(dropped = parsed.dropped, "too many arguments");
        eprintln!(
            "warning: only the first {} arguments are used, {} dropped",
            shell.max_args(),
            parsed.dropped
        );
    }

    let Some(program) = parsed.program() else {
        return Ok(Dispatch::Empty);
    };

    if let Some(builtin) = BUILTINS.find(program) {
        return match builtin.execute(&parsed.argv, shell)? {
            BuiltinOutcome::Continue => Ok(Dispatch::Builtin),
            BuiltinOutcome::Exit(code) => Ok(Dispatch::Exit(code)),
        };
    }

    let pid = spawn(&parsed.argv)?;
    if parsed.background {
        shell.children_mut().register(pid)?;
        info!(pid = %pid, program, "background child registered");
        Ok(Dispatch::Background { pid })
    } else {
        let status = wait_foreground(pid)?;
        Ok(Dispatch::Foreground { pid, status })
    }
}
