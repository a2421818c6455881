use crate::commands::registry::{BuiltinCommand, BuiltinOutcome};
use crate::errors::{ShellError, ShellResult};
use crate::repl::Shell;
use std::env;

pub struct CdCommand;

impl CdCommand {
    /// Resolve the directory to change into; `~` and no argument mean `HOME`.
    fn target(path: Option<&str>) -> ShellResult<String> {
        let home = || {
            env::var("HOME").map_err(|_| {
                ShellError::InvalidDirectory("cd: HOME environment variable not set".to_string())
            })
        };

        match path {
            Some(p) if p == "~" || p.starts_with("~/") => Ok(p.replacen('~', &home()?, 1)),
            Some(p) => Ok(p.to_string()),
            None => home(),
        }
    }
}

impl BuiltinCommand for CdCommand {
    fn name(&self) -> &'static str {
        "cd"
    }

    fn description(&self) -> &'static str {
        "Change the current working directory"
    }

    fn execute(&self, args: &[String], _shell: &mut Shell) -> ShellResult<BuiltinOutcome> {
        let target = Self::target(args.get(1).map(String::as_str))?;

        env::set_current_dir(&target).map_err(|e| {
            ShellError::InvalidDirectory(format!("cd: {}: {}", target, e))
        })?;
        Ok(BuiltinOutcome::Continue)
    }
}
