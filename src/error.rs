use std::io;

use thiserror::Error;

use crate::endpoint::ParseError;
use crate::transport::TransportError;

/// Exit code for a child terminated by the configured deadline.
pub const EXIT_TIMED_OUT: i32 = 124;
/// Exit code when the invocation is interrupted while a child is running.
pub const EXIT_INTERRUPTED: i32 = 130;
/// Offset added to the signal number for signal-killed children.
pub const EXIT_SIGNAL_BASE: i32 = 128;

#[derive(Error, Debug)]
pub enum Error {
    #[error("usage: {0}")]
    Usage(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Stage-specific process exit code for a failed invocation.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_) | Error::Parse(_) => 2,
            Error::Transport(_) => 3,
            Error::Launch { .. } => 127,
            Error::Io(_) => 1,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
