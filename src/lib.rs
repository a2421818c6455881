pub mod children;
pub mod cli;
pub mod commands;
pub mod errors;
pub mod history;
pub mod logging;
pub mod parser;
pub mod repl;
pub mod signals;

use cli::ShellArgs;
use errors::ShellResult;
use repl::{LineReader, RawStdin, Shell, SignalAwareReader};

/// Main entry point for the shell REPL
///
/// Installs the signal router, then reads commands from stdin until end of
/// input or `exit`. Returns the exit code for the process.
pub fn run_shell(args: &ShellArgs) -> ShellResult<i32> {
    signals::install()?;

    let mut shell = Shell::new(args);
    let mut reader = LineReader::new(SignalAwareReader::new(RawStdin::new()));
    shell.run(&mut reader)
}
