use crate::commands::registry::{BuiltinCommand, BuiltinOutcome};
use crate::errors::ShellResult;
use crate::repl::Shell;
use std::io;

pub struct HistoryCommand;

impl BuiltinCommand for HistoryCommand {
    fn name(&self) -> &'static str {
        "history"
    }

    fn description(&self) -> &'static str {
        "Display recently entered commands, oldest first"
    }

    fn execute(&self, _args: &[String], shell: &mut Shell) -> ShellResult<BuiltinOutcome> {
        shell.history().print_all(&mut io::stdout().lock())?;
        Ok(BuiltinOutcome::Continue)
    }
}
