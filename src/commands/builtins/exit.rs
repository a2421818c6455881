use crate::commands::registry::{BuiltinCommand, BuiltinOutcome};
use crate::errors::ShellResult;
use crate::repl::Shell;

pub struct ExitCommand;

impl BuiltinCommand for ExitCommand {
    fn name(&self) -> &'static str {
        "exit"
    }

    fn description(&self) -> &'static str {
        "Kill remaining background jobs and exit the shell"
    }

    fn execute(&self, args: &[String], _shell: &mut Shell) -> ShellResult<BuiltinOutcome> {
        let code = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
        Ok(BuiltinOutcome::Exit(code))
    }
}
