//! Error types for the shell session core.
//!
//! Every error here ends the operation that raised it. Only [`SpawnError`]
//! ends the session: a shell that never started cannot become interactive.

use std::fmt;
use std::io;

use thiserror::Error;

/// Which of the child's output pipes a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shell could not be launched.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("shell program '{program}' not found")]
    NotFound { program: String },

    #[error("working directory '{path}' is not a directory")]
    InvalidWorkingDir { path: String },

    #[error("failed to start '{program}': {source}")]
    Os {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl SpawnError {
    pub(crate) fn from_io(program: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            SpawnError::NotFound {
                program: program.to_string(),
            }
        } else {
            SpawnError::Os {
                program: program.to_string(),
                source,
            }
        }
    }
}

/// A command line could not be delivered to the shell's stdin.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("shell is not running")]
    NotRunning,

    #[error("shell input pipe is closed: {0}")]
    PipeClosed(#[source] io::Error),

    #[error("write to shell failed: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for WriteError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::BrokenPipe {
            WriteError::PipeClosed(err)
        } else {
            WriteError::Io(err)
        }
    }
}

/// Output bytes that are not valid UTF-8.
///
/// The raw bytes are kept so the display can still show them (escaped).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{stream}: {} not valid UTF-8: {}]", byte_count(.bytes), escape_bytes(.bytes))]
pub struct DecodeError {
    pub stream: StreamKind,
    pub bytes: Vec<u8>,
}

fn byte_count(bytes: &[u8]) -> String {
    let n = bytes.len();
    if n == 1 {
        "1 byte".to_string()
    } else {
        format!("{n} bytes")
    }
}

/// Render bytes the way a Rust byte-string literal would (`\xff`, `\n`, ...).
pub fn escape_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .flat_map(|b| std::ascii::escape_default(*b))
        .map(char::from)
        .collect()
}
