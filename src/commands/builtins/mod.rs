mod cd;
mod exit;
mod help;
mod history;

pub use cd::CdCommand;
pub use exit::ExitCommand;
pub use help::HelpCommand;
pub use history::HistoryCommand;
