//! Child shell plumbing for the terminal panel
//!
//! - `host.rs`: spawns and owns the shell process (stdin, termination, exit)
//! - `relay.rs`: worker threads draining stdout/stderr into an mpsc channel
//! - `decode.rs`: incremental UTF-8 decoding of pipe reads
//! - `error.rs`: spawn/write/decode error types
//!
//! The session state machine that ties these together lives in
//! `crate::app::session` and runs on the display-owning thread.

pub mod decode;
pub mod error;
pub mod host;
pub mod relay;

pub use error::{DecodeError, SpawnError, StreamKind, WriteError};
pub use host::{detect_shell, ProcessExit, ShellCommand, ShellHost, ShellOutput, ShellProcess};
pub use relay::{spawn_relay, RelayEvent, RelayHandle, DEFAULT_READ_CHUNK_BYTES};
