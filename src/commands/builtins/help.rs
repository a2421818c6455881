use crate::commands::registry::{BuiltinCommand, BuiltinOutcome, BUILTINS};
use crate::errors::ShellResult;
use crate::repl::Shell;
use std::io::{self, Write};

pub struct HelpCommand;

impl BuiltinCommand for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn description(&self) -> &'static str {
        "List the shell builtins"
    }

    fn execute(&self, _args: &[String], _shell: &mut Shell) -> ShellResult<BuiltinOutcome> {
        let mut out = io::stdout().lock();
        for cmd in BUILTINS.iter() {
            writeln!(out, "{:<10}{}", cmd.name(), cmd.description())?;
        }
        writeln!(out, "Append '&' to run a program in the background.")?;
        out.flush()?;
        Ok(BuiltinOutcome::Continue)
    }
}
