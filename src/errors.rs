use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::io;
use thiserror::Error;

/// Comprehensive error type for shell operations
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("could not fork child process: {0}")]
    ForkFailed(#[source] nix::Error),

    #[error("waiting for process {pid} failed: {source}")]
    Wait {
        pid: Pid,
        #[source]
        source: nix::Error,
    },

    #[error("could not install handler for {signal}: {source}")]
    SignalSetup {
        signal: Signal,
        #[source]
        source: nix::Error,
    },

    #[error("could not change the signal mask: {0}")]
    SignalMask(#[source] nix::Error),

    #[error("argument contains a NUL byte: {0:?}")]
    InvalidArgument(String),

    #[error("{0}")]
    InvalidDirectory(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type ShellResult<T> = Result<T, ShellError>;
