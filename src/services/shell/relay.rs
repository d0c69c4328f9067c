//! Output relay: drains the shell's stdout and stderr on worker threads.
//!
//! Each pipe gets its own thread that blocks only on its own `read`. Decoded
//! output is sent to the display-owning thread as [`RelayEvent`]s over an
//! mpsc channel; the workers never touch display state. Ordering is kept per
//! stream only: stdout and stderr interleave in whatever order the threads
//! happen to deliver.

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use super::decode::{Decoded, Utf8StreamDecoder};
use super::error::{DecodeError, StreamKind};
use super::host::ShellOutput;

/// Default size of a single pipe read.
pub const DEFAULT_READ_CHUNK_BYTES: usize = 4096;

/// Message from a relay worker to the display-owning thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Decoded text from one read
    Output { stream: StreamKind, text: String },
    /// Bytes that are not valid UTF-8
    DecodeError(DecodeError),
    /// The pipe read failed; the worker has stopped
    ReadFailed { stream: StreamKind, message: String },
    /// End of stream; the worker has stopped and will not restart
    Closed { stream: StreamKind },
}

/// Join handles for the two workers.
pub struct RelayHandle {
    workers: Vec<JoinHandle<()>>,
}

impl RelayHandle {
    pub(crate) fn new(workers: Vec<JoinHandle<()>>) -> Self {
        Self { workers }
    }

    /// Wait for the workers. Only safe once the pipes are known to be closed.
    pub fn join(self) {
        for worker in self.workers {
            if worker.join().is_err() {
                tracing::error!("Shell relay worker panicked");
            }
        }
    }
}

/// Spawn one worker per output pipe. Returns the receiving end of the event
/// channel together with the worker handles.
pub fn spawn_relay(
    output: ShellOutput,
    read_chunk_bytes: usize,
) -> io::Result<(Receiver<RelayEvent>, RelayHandle)> {
    let (tx, rx) = mpsc::channel();
    let stdout = spawn_reader(StreamKind::Stdout, output.stdout, tx.clone(), read_chunk_bytes)?;
    let stderr = spawn_reader(StreamKind::Stderr, output.stderr, tx, read_chunk_bytes)?;
    Ok((rx, RelayHandle::new(vec![stdout, stderr])))
}

/// Spawn a named worker thread draining `reader` into `sender`.
pub fn spawn_reader<R>(
    stream: StreamKind,
    reader: R,
    sender: Sender<RelayEvent>,
    read_chunk_bytes: usize,
) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("shell-{}", stream))
        .spawn(move || read_loop(stream, reader, &sender, read_chunk_bytes.max(1)))
}

/// Read until end of stream, forwarding every read as it arrives.
///
/// Returns early (quietly) if the receiving side has gone away.
pub fn read_loop<R: Read>(
    stream: StreamKind,
    mut reader: R,
    sender: &Sender<RelayEvent>,
    read_chunk_bytes: usize,
) {
    let mut decoder = Utf8StreamDecoder::new();
    let mut buf = vec![0u8; read_chunk_bytes];

    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                tracing::debug!("Relay {}: read {} bytes", stream, n);
                for piece in decoder.decode(&buf[..n]) {
                    if sender.send(to_event(stream, piece)).is_err() {
                        tracing::debug!("Relay {}: receiver gone, stopping", stream);
                        return;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("Relay {}: read failed: {}", stream, e);
                let _ = sender.send(RelayEvent::ReadFailed {
                    stream,
                    message: e.to_string(),
                });
                return;
            }
        }
    }

    if let Some(piece) = decoder.finish() {
        let _ = sender.send(to_event(stream, piece));
    }
    tracing::debug!("Relay {}: end of stream", stream);
    let _ = sender.send(RelayEvent::Closed { stream });
}

fn to_event(stream: StreamKind, piece: Decoded) -> RelayEvent {
    match piece {
        Decoded::Text(text) => RelayEvent::Output { stream, text },
        Decoded::Invalid(bytes) => RelayEvent::DecodeError(DecodeError { stream, bytes }),
    }
}
