//! The terminal panel session.
//!
//! A [`Session`] owns the shell process, the receiving end of the relay
//! channel, the line editor and the display surface. Everything here runs on
//! the display-owning thread: relay workers only send [`RelayEvent`]s, and
//! `pump` applies them to the surface without ever blocking on a pipe.
//!
//! State transitions:
//!
//! ```text
//! Starting ──chunk / startup timer──▶ AwaitingInput ──Enter──▶ AwaitingOutput
//!                                         ▲                         │
//!                                         └────chunk / write error──┘
//! (any running state) ──process exit / close──▶ Terminated
//! ```

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use crate::input::line_editor::{
    paste_keys, EditMode, EditorKey, KeyOutcome, LineEditor, PendingCommand,
};
use crate::model::DisplaySurface;
use crate::services::shell::{
    spawn_relay, ProcessExit, RelayEvent, RelayHandle, ShellCommand, ShellHost, ShellProcess,
    WriteError, DEFAULT_READ_CHUNK_BYTES,
};

/// How long an exited process may keep its output pipes open before the
/// session stops waiting for the remaining output.
const EXIT_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Text shown when a command is entered without a live shell.
pub const NOT_AVAILABLE_MESSAGE: &str = "Shell not started or not available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Spawned (or failed to spawn) and no output yet
    Starting,
    /// The user may type after the prompt boundary
    AwaitingInput,
    /// A command was sent; the surface is read-only until output arrives
    AwaitingOutput,
    /// The process is gone; permanently read-only
    Terminated,
}

/// Tunables resolved from [`crate::config::PanelConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Grace period passed to `terminate` by `on_panel_close`
    pub terminate_grace: Duration,
    /// Become editable this long after a successful spawn even without output
    pub startup_unlock: Option<Duration>,
    /// Become editable again if a submitted command stays silent this long
    pub idle_unlock: Option<Duration>,
    pub read_chunk_bytes: usize,
    /// Append "Starting terminal with: ..." before spawning
    pub show_banner: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            terminate_grace: Duration::from_millis(1000),
            startup_unlock: Some(Duration::from_millis(200)),
            idle_unlock: None,
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
            show_banner: true,
        }
    }
}

/// One child shell plus its editing state.
pub struct Session<S: DisplaySurface> {
    surface: S,
    editor: LineEditor,
    state: SessionState,
    options: SessionOptions,
    process: Option<Box<dyn ShellProcess>>,
    events: Option<Receiver<RelayEvent>>,
    relay: Option<RelayHandle>,
    open_streams: usize,
    started_at: Instant,
    /// When the last command was sent, cleared by the first chunk after it
    last_submit: Option<Instant>,
    /// Exit seen while output pipes were still open
    pending_exit: Option<(ProcessExit, Instant)>,
    exit: Option<ProcessExit>,
}

impl<S: DisplaySurface> Session<S> {
    /// Spawn `command` and wire its output into `surface`.
    ///
    /// A spawn failure is not returned: it is shown on the surface once and
    /// the session stays in `Starting`, non-interactive.
    pub fn start(command: &ShellCommand, options: SessionOptions, mut surface: S) -> Self {
        surface.set_read_only(true);
        if options.show_banner {
            surface.append(&format!("Starting terminal with: {}...\n", command));
        }

        let mut session = Self::detached(surface, options);

        let mut host = match ShellHost::start(command) {
            Ok(host) => host,
            Err(e) => {
                tracing::error!("Failed to start shell '{}': {}", command, e);
                session.show_line(&format!("Error starting shell: {}", e));
                return session;
            }
        };

        let relay = host
            .take_output()
            .ok_or_else(|| "output pipes unavailable".to_string())
            .and_then(|output| {
                spawn_relay(output, session.options.read_chunk_bytes).map_err(|e| e.to_string())
            });

        match relay {
            Ok((events, handle)) => {
                session.process = Some(Box::new(host));
                session.events = Some(events);
                session.relay = Some(handle);
                session.open_streams = 2;
            }
            Err(e) => {
                tracing::error!("Failed to start output relay: {}", e);
                host.terminate(session.options.terminate_grace);
                session.show_line(&format!("Error starting shell: {}", e));
            }
        }
        session
    }

    /// Build a session around an already running process and the receiving
    /// end of its relay channel. `open_streams` is the number of relay
    /// workers that will each send one `Closed`.
    pub fn with_process(
        surface: S,
        process: Box<dyn ShellProcess>,
        events: Receiver<RelayEvent>,
        open_streams: usize,
        options: SessionOptions,
    ) -> Self {
        let mut session = Self::detached(surface, options);
        session.surface.set_read_only(true);
        session.process = Some(process);
        session.events = Some(events);
        session.open_streams = open_streams;
        session
    }

    fn detached(surface: S, options: SessionOptions) -> Self {
        Self {
            surface,
            editor: LineEditor::new(),
            state: SessionState::Starting,
            options,
            process: None,
            events: None,
            relay: None,
            open_streams: 0,
            started_at: Instant::now(),
            last_submit: None,
            pending_exit: None,
            exit: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Direct access for the host UI (scrolling, mouse cursor placement).
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn prompt_boundary(&self) -> usize {
        self.editor.prompt_boundary()
    }

    pub fn edit_mode(&self) -> EditMode {
        self.editor.mode()
    }

    /// Exit status once the session is `Terminated` by a process exit.
    pub fn exit_status(&self) -> Option<ProcessExit> {
        self.exit
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.pid())
    }

    /// Whether a process was started and not yet seen to exit.
    pub fn is_running(&self) -> bool {
        self.process.is_some() && self.state != SessionState::Terminated
    }

    /// Apply every relay message that is already queued, then check timers
    /// and process exit. Never blocks. Returns whether anything changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        loop {
            let Some(events) = self.events.as_ref() else {
                break;
            };
            match events.try_recv() {
                Ok(event) => {
                    self.apply(event);
                    changed = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.events = None;
                    self.open_streams = 0;
                    self.reap_relay();
                    break;
                }
            }
        }
        changed |= self.check_timers();
        changed |= self.check_exit();
        changed
    }

    /// Like [`Session::pump`], but waits up to `timeout` for the first
    /// message when none is queued.
    pub fn pump_timeout(&mut self, timeout: Duration) -> bool {
        if let Some(events) = self.events.as_ref() {
            match events.recv_timeout(timeout) {
                Ok(event) => {
                    self.apply(event);
                    self.pump();
                    return true;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.events = None;
                    self.open_streams = 0;
                    self.reap_relay();
                }
            }
        } else if self.state != SessionState::Terminated && self.process.is_some() {
            std::thread::sleep(timeout);
        }
        self.pump()
    }

    /// Route a key to the line editor; submits the command on Enter.
    pub fn handle_key(&mut self, key: EditorKey) -> KeyOutcome {
        let outcome = self.editor.handle_key(key, &mut self.surface);
        if let KeyOutcome::Submit(command) = &outcome {
            self.submit(command);
        }
        outcome
    }

    /// Feed pasted text through the editor as key presses. A line break
    /// (`\n`, `\r` or `\r\n`) acts as Enter; whatever follows the first
    /// submitted line lands while the session awaits output and is dropped.
    pub fn paste(&mut self, text: &str) {
        for key in paste_keys(text) {
            if self.state == SessionState::Terminated {
                break;
            }
            self.handle_key(key);
        }
    }

    fn submit(&mut self, command: &PendingCommand) {
        let result = match self.process.as_mut() {
            Some(process) if self.state != SessionState::Terminated => {
                process.submit_line(&command.text)
            }
            _ => Err(WriteError::NotRunning),
        };

        match result {
            Ok(()) => {
                tracing::debug!("Submitted command {:?}", command.text);
                self.state = SessionState::AwaitingOutput;
                self.last_submit = Some(Instant::now());
            }
            Err(WriteError::NotRunning) => {
                tracing::warn!("Command entered without a running shell");
                self.show_line(NOT_AVAILABLE_MESSAGE);
                self.resume_editing();
            }
            Err(e) => {
                tracing::warn!("Failed to send command: {}", e);
                self.show_line(&format!("Error sending command: {}", e));
                self.resume_editing();
            }
        }
    }

    /// Lifecycle hook for the host: terminate the shell (waiting up to the
    /// configured grace period) and make the surface permanently read-only.
    /// Calling it again is a no-op.
    pub fn on_panel_close(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }

        if let Some(process) = self.process.as_mut() {
            process.terminate(self.options.terminate_grace);
            // Output written before the shell went away
            self.drain_queued();
            let exit = self
                .process
                .as_mut()
                .and_then(|p| p.poll_exit())
                .or(self.pending_exit.map(|(exit, _)| exit));
            match exit {
                Some(exit) => self.mark_terminated(exit),
                None => self.close_editor(),
            }
        } else {
            self.close_editor();
        }

        // Workers still blocked on a pipe held open by a grandchild finish
        // on their own once it closes
        self.events = None;
        self.relay = None;
        tracing::info!("Panel closed");
    }

    fn drain_queued(&mut self) {
        while let Some(event) = self.events.as_ref().and_then(|rx| rx.try_recv().ok()) {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Output { stream, text } => {
                tracing::debug!("Chunk from {}: {} chars", stream, text.chars().count());
                self.surface.append(&text);
                self.on_chunk();
            }
            RelayEvent::DecodeError(err) => {
                tracing::debug!("Undecodable output: {}", err);
                self.show_line(&err.to_string());
                self.on_chunk();
            }
            RelayEvent::ReadFailed { stream, message } => {
                self.show_line(&format!("[{} read error: {}]", stream, message));
                self.stream_closed();
            }
            RelayEvent::Closed { stream } => {
                tracing::debug!("Output stream {} closed", stream);
                self.stream_closed();
            }
        }
        self.surface.ensure_cursor_visible();
    }

    fn stream_closed(&mut self) {
        self.open_streams = self.open_streams.saturating_sub(1);
        if self.open_streams == 0 {
            self.reap_relay();
        }
    }

    /// Join the relay workers. Only called once every worker has sent its
    /// last message, so the join does not wait on a pipe.
    fn reap_relay(&mut self) {
        if let Some(relay) = self.relay.take() {
            relay.join();
            tracing::debug!("Output relay finished");
        }
    }

    /// Whether the process is known to have exited. Records the first
    /// sighting so the drain window starts then, and locks the editor.
    fn exit_seen(&mut self) -> bool {
        if self.pending_exit.is_some() {
            return true;
        }
        let Some(exit) = self.process.as_mut().and_then(|p| p.poll_exit()) else {
            return false;
        };
        tracing::debug!("Shell exited ({}), draining output", exit);
        self.pending_exit = Some((exit, Instant::now()));
        self.editor.lock(&mut self.surface);
        true
    }

    /// Heuristic prompt detection: any chunk ends the wait for output.
    fn on_chunk(&mut self) {
        match self.state {
            SessionState::Terminated => {}
            SessionState::Starting | SessionState::AwaitingOutput => {
                self.last_submit = None;
                self.resume_editing();
            }
            SessionState::AwaitingInput => {
                // Output while typing moves the boundary past it
                if !self.exit_seen() {
                    self.editor.unlock(&mut self.surface);
                }
            }
        }
    }

    /// Back to `AwaitingInput`, unless the shell is gone.
    fn resume_editing(&mut self) {
        if self.state == SessionState::Terminated || self.exit_seen() {
            return;
        }
        self.editor.unlock(&mut self.surface);
        self.state = SessionState::AwaitingInput;
    }

    fn check_timers(&mut self) -> bool {
        if self.process.is_none() {
            return false;
        }
        let due = match self.state {
            SessionState::Starting => self
                .options
                .startup_unlock
                .filter(|after| self.started_at.elapsed() >= *after),
            SessionState::AwaitingOutput => match (self.options.idle_unlock, self.last_submit) {
                (Some(after), Some(sent)) if sent.elapsed() >= after => Some(after),
                _ => None,
            },
            SessionState::AwaitingInput | SessionState::Terminated => None,
        };
        let Some(after) = due else {
            return false;
        };
        if self.exit_seen() {
            return false;
        }

        if self.state == SessionState::Starting {
            tracing::debug!("No output after {:?}, enabling input", after);
        } else {
            tracing::debug!("Command silent for {:?}, enabling input", after);
            self.last_submit = None;
        }
        self.resume_editing();
        true
    }

    fn check_exit(&mut self) -> bool {
        if self.state == SessionState::Terminated {
            return false;
        }
        if self.process.is_none() || !self.exit_seen() {
            return false;
        }
        let Some((exit, seen)) = self.pending_exit else {
            return false;
        };

        // Let the relay deliver what the shell wrote before exiting
        let drained = self.open_streams == 0 || seen.elapsed() >= EXIT_DRAIN_TIMEOUT;
        if !drained {
            return false;
        }

        self.mark_terminated(exit);
        true
    }

    /// Enter `Terminated`, appending the exit notice exactly once.
    fn mark_terminated(&mut self, exit: ProcessExit) {
        if self.state == SessionState::Terminated {
            return;
        }
        tracing::info!("Session terminated, process exited ({})", exit);
        self.exit = Some(exit);
        self.pending_exit = None;
        self.surface.append(&format!("\nProcess exited ({})\n", exit));
        self.close_editor();
    }

    fn close_editor(&mut self) {
        self.state = SessionState::Terminated;
        self.editor.close(&mut self.surface);
        self.surface.ensure_cursor_visible();
    }

    /// Append a diagnostic on a line of its own.
    fn show_line(&mut self, message: &str) {
        let len = self.surface.buffer_length();
        if len > 0 && self.surface.text_range(len - 1..len) != "\n" {
            self.surface.append("\n");
        }
        self.surface.append(message);
        self.surface.append("\n");
        self.surface.ensure_cursor_visible();
    }
}

impl<S: DisplaySurface> Drop for Session<S> {
    fn drop(&mut self) {
        if self.state != SessionState::Terminated && self.process.is_some() {
            self.on_panel_close();
        }
    }
}
