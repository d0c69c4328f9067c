//! Keyboard input handling
//!
//! - `line_editor.rs`: prompt-bounded editing of the command line
//! - `key_translator.rs`: crossterm key events to editor keys (binary only)

#[cfg(feature = "runtime")]
pub mod key_translator;
pub mod line_editor;

pub use line_editor::{paste_keys, EditMode, EditorKey, KeyOutcome, LineEditor, PendingCommand};
