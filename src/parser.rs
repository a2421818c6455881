/// Default cap on the number of tokens, program name included.
pub const DEFAULT_MAX_ARGS: usize = 10;

const BACKGROUND_MARKER: char = '&';

/// A tokenized command line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedCommand {
    /// Program name followed by its arguments.
    pub argv: Vec<String>,
    /// Run without waiting for the child.
    pub background: bool,
    /// Tokens discarded because the line exceeded the token limit.
    pub dropped: usize,
}

impl ParsedCommand {
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

/// Split `line` on whitespace and strip a trailing background marker.
///
/// The marker is recognised either as a standalone last token (`sleep 5 &`)
/// or glued to the end of the last token (`sleep 5&`). Tokens past `max_args`
/// are dropped first, so a marker that falls beyond the limit is dropped with
/// them and the command runs in the foreground.
pub fn parse(line: &str, max_args: usize) -> ParsedCommand {
    let mut argv: Vec<String> = line.split_whitespace().map(str::to_owned).collect();

    let max_args = max_args.max(1);
    let dropped = argv.len().saturating_sub(max_args);
    argv.truncate(max_args);

    let background = match argv.last_mut() {
        Some(last) if last.as_str() == "&" => {
            argv.pop();
            true
        }
        Some(last) if last.ends_with(BACKGROUND_MARKER) => {
            last.pop();
            true
        }
        _ => false,
    };

    ParsedCommand {
        argv,
        background,
        dropped,
    }
}
