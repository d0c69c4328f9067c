//! Prompt-bounded command line editing.
//!
//! The display buffer is split at the prompt boundary: everything before it
//! is shell output (and earlier commands) and is frozen; the suffix starting
//! at the boundary is the line the user is typing. The editor applies keys to
//! that suffix only and, on Enter, hands back the typed command.
//!
//! Modes:
//! - `ReadOnly`: waiting for the shell (or not started). Keys do nothing.
//! - `Editable`: keys edit the tail region.
//! - `Closed`: the shell is gone. Keys do nothing, permanently.

use crate::model::DisplaySurface;

/// Keys the line editor understands. Hosts translate their own key events
/// into these (see `input::key_translator`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKey {
    Char(char),
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Up,
    Down,
    Enter,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    ReadOnly,
    Editable,
    Closed,
}

/// One line of input collected between the prompt boundary and Enter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    /// Text between the boundary and the cursor, trimmed
    pub text: String,
    /// The whole display line as committed, prompt prefix included
    pub line: String,
}

/// What a key press did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Nothing changed
    Ignored,
    /// The cursor moved
    Moved,
    /// Buffer text changed
    Edited,
    /// Enter was pressed; the editor is now read-only
    Submit(PendingCommand),
}

/// Line editor state: the mode and the prompt boundary.
#[derive(Debug, Clone)]
pub struct LineEditor {
    mode: EditMode,
    prompt_boundary: usize,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEditor {
    pub fn new() -> Self {
        Self {
            mode: EditMode::ReadOnly,
            prompt_boundary: 0,
        }
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// First offset the user may edit. Stale while not `Editable`.
    pub fn prompt_boundary(&self) -> usize {
        self.prompt_boundary
    }

    /// Start (or restart) an editing period at the end of the buffer.
    ///
    /// This is the prompt heuristic: whatever was just appended is taken to
    /// end with the prompt, so the boundary becomes the buffer length.
    pub fn unlock(&mut self, surface: &mut dyn DisplaySurface) {
        if self.mode == EditMode::Closed {
            return;
        }
        let end = surface.buffer_length();
        if self.mode == EditMode::Editable {
            // Within one editing period the boundary only moves forward
            self.prompt_boundary = self.prompt_boundary.max(end);
        } else {
            self.prompt_boundary = end;
        }
        self.mode = EditMode::Editable;
        surface.set_cursor_position(end);
        surface.set_read_only(false);
        surface.ensure_cursor_visible();
    }

    pub fn lock(&mut self, surface: &mut dyn DisplaySurface) {
        if self.mode == EditMode::Closed {
            return;
        }
        self.mode = EditMode::ReadOnly;
        surface.set_read_only(true);
    }

    pub fn close(&mut self, surface: &mut dyn DisplaySurface) {
        self.mode = EditMode::Closed;
        surface.set_read_only(true);
    }

    /// Apply one key. A complete no-op unless `Editable`.
    pub fn handle_key(&mut self, key: EditorKey, surface: &mut dyn DisplaySurface) -> KeyOutcome {
        if self.mode != EditMode::Editable {
            return KeyOutcome::Ignored;
        }

        let boundary = self.prompt_boundary;
        let cursor = surface.cursor_position();
        let line_end = surface.line_end(boundary);

        let outcome = match key {
            EditorKey::Char(c) => {
                if cursor < boundary || cursor > line_end || c == '\n' || c == '\r' {
                    KeyOutcome::Ignored
                } else {
                    let mut tmp = [0u8; 4];
                    surface.insert_text(cursor, c.encode_utf8(&mut tmp));
                    surface.set_cursor_position(cursor + 1);
                    KeyOutcome::Edited
                }
            }
            EditorKey::Backspace => {
                if cursor > boundary && cursor <= line_end {
                    surface.delete_range(cursor - 1..cursor);
                    surface.set_cursor_position(cursor - 1);
                    KeyOutcome::Edited
                } else {
                    KeyOutcome::Ignored
                }
            }
            EditorKey::Left => {
                let target = cursor.saturating_sub(1).clamp(boundary, line_end);
                move_to(surface, cursor, target)
            }
            EditorKey::Right => {
                let target = (cursor + 1).clamp(boundary, line_end);
                move_to(surface, cursor, target)
            }
            EditorKey::Home => move_to(surface, cursor, boundary),
            EditorKey::End => move_to(surface, cursor, line_end),
            EditorKey::Enter => return self.submit(surface),
            // History and forward-delete are not supported; must not touch
            // the buffer or the boundary
            EditorKey::Up | EditorKey::Down | EditorKey::Delete | EditorKey::Escape => {
                KeyOutcome::Ignored
            }
        };

        if outcome != KeyOutcome::Ignored {
            surface.ensure_cursor_visible();
        }
        outcome
    }

    /// Extract the command, commit the line with a line break and lock.
    fn submit(&mut self, surface: &mut dyn DisplaySurface) -> KeyOutcome {
        let boundary = self.prompt_boundary;
        let line_end = surface.line_end(boundary);
        let cursor = surface.cursor_position().clamp(boundary, line_end);

        let text = surface.text_range(boundary..cursor).trim().to_string();
        let line_start = surface.line_start(boundary);
        let line = surface.text_range(line_start..line_end);

        surface.set_cursor_position(surface.buffer_length());
        surface.append("\n");
        surface.ensure_cursor_visible();
        self.lock(surface);

        tracing::debug!("Submitting command line {:?}", line);
        KeyOutcome::Submit(PendingCommand { text, line })
    }
}

/// Keys for a pasted block of text. `\n`, `\r` and `\r\n` each become one
/// Enter; bracketed paste in most terminals sends line breaks as `\r`.
pub fn paste_keys(text: &str) -> Vec<EditorKey> {
    let mut keys = Vec::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                chars.next_if_eq(&'\n');
                keys.push(EditorKey::Enter);
            }
            '\n' => keys.push(EditorKey::Enter),
            c => keys.push(EditorKey::Char(c)),
        }
    }
    keys
}

fn move_to(surface: &mut dyn DisplaySurface, from: usize, to: usize) -> KeyOutcome {
    if from == to {
        KeyOutcome::Ignored
    } else {
        surface.set_cursor_position(to);
        KeyOutcome::Moved
    }
}
