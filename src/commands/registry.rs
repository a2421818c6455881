use crate::errors::ShellResult;
use crate::repl::Shell;
use once_cell::sync::Lazy;

/// What the shell does after a builtin returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinOutcome {
    /// Print the next prompt.
    Continue,
    /// Shut down with this exit code.
    Exit(i32),
}

/// Trait that all builtin commands must implement
pub trait BuiltinCommand: Send + Sync {
    /// The command name (e.g., "cd", "history")
    fn name(&self) -> &'static str;

    /// One-line description shown by `help`
    fn description(&self) -> &'static str;

    /// Execute the command inside the shell process.
    /// args[0] is the command name itself
    fn execute(&self, args: &[String], shell: &mut Shell) -> ShellResult<BuiltinOutcome>;
}

/// Central registry for all builtin commands
pub struct BuiltinRegistry {
    commands: Vec<Box<dyn BuiltinCommand>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn register<C: BuiltinCommand + 'static>(&mut self, cmd: C) {
        self.commands.push(Box::new(cmd));
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn find(&self, name: &str) -> Option<&dyn BuiltinCommand> {
        self.commands
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }

    /// Registered builtins in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn BuiltinCommand> {
        self.commands.iter().map(|c| c.as_ref())
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global registry instance
pub static BUILTINS: Lazy<BuiltinRegistry> = Lazy::new(|| {
    let mut registry = BuiltinRegistry::new();

    registry.register(super::builtins::CdCommand);
    registry.register(super::builtins::ExitCommand);
    registry.register(super::builtins::HelpCommand);
    registry.register(super::builtins::HistoryCommand);

    registry
});
