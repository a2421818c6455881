use crate::history::DEFAULT_HISTORY_SIZE;
use crate::parser::DEFAULT_MAX_ARGS;
use clap::Parser;
use std::num::NonZeroUsize;

pub const DEFAULT_PROMPT: &str = "OS1Shell -> ";

const DEFAULT_HISTORY: NonZeroUsize = match NonZeroUsize::new(DEFAULT_HISTORY_SIZE) {
    Some(n) => n,
    None => panic!("default history size must be non-zero"),
};

const DEFAULT_ARGS: NonZeroUsize = match NonZeroUsize::new(DEFAULT_MAX_ARGS) {
    Some(n) => n,
    None => panic!("default token limit must be non-zero"),
};

/// Shell command line arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "os1sh", version)]
#[command(
    about = "A small interactive shell",
    long_about = "Runs one program per line. End a line with '&' to run it in the background. \
                  Ctrl-C prints the command history, Ctrl-D or Ctrl-\\ quits."
)]
pub struct ShellArgs {
    /// Text printed before every command
    #[arg(long, default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// Number of command lines kept in the history
    #[arg(long, default_value_t = DEFAULT_HISTORY)]
    pub history_size: NonZeroUsize,

    /// Maximum number of tokens per command, program name included
    #[arg(long, default_value_t = DEFAULT_ARGS)]
    pub max_args: NonZeroUsize,
}

impl Default for ShellArgs {
    fn default() -> Self {
        Self::parse_from(["os1sh"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_shell() {
        let args = ShellArgs::default();
        assert_eq!(args.prompt, "OS1Shell -> ");
        assert_eq!(args.history_size.get(), 20);
        assert_eq!(args.max_args.get(), 10);
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = ShellArgs::try_parse_from([
            "os1sh",
            "--prompt",
            "$ ",
            "--history-size",
            "5",
            "--max-args",
            "3",
        ])
        .unwrap();
        assert_eq!(args.prompt, "$ ");
        assert_eq!(args.history_size.get(), 5);
        assert_eq!(args.max_args.get(), 3);
    }

    #[test]
    fn test_zero_history_size_is_rejected() {
        assert!(ShellArgs::try_parse_from(["os1sh", "--history-size", "0"]).is_err());
    }

    #[test]
    fn test_defaults_follow_module_constants() {
        let args = ShellArgs::default();
        assert_eq!(args.history_size.get(), DEFAULT_HISTORY_SIZE);
        assert_eq!(args.max_args.get(), DEFAULT_MAX_ARGS);
    }
}
