//! Translate crossterm key events into line editor keys.

use crossterm::event::{KeyCode, KeyModifiers};

use super::line_editor::EditorKey;

/// Key that closes the panel (handled by the host loop, not the editor).
pub fn is_close_key(code: KeyCode, modifiers: KeyModifiers) -> bool {
    modifiers.contains(KeyModifiers::CONTROL)
        && matches!(code, KeyCode::Char(c) if c.eq_ignore_ascii_case(&'q'))
}

/// Map a key press to an [`EditorKey`].
///
/// Returns `None` for keys the panel has no use for: control and alt
/// combinations (there is no PTY to forward them to), function keys, paging.
pub fn key_to_editor_key(code: KeyCode, modifiers: KeyModifiers) -> Option<EditorKey> {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    let alt = modifiers.contains(KeyModifiers::ALT);

    if ctrl || alt {
        return match code {
            // Terminals report Ctrl+J / Ctrl+M for some Enter variants
            KeyCode::Enter => Some(EditorKey::Enter),
            _ => None,
        };
    }

    match code {
        // crossterm already applies shift to the reported char
        KeyCode::Char(c) => Some(EditorKey::Char(c)),
        KeyCode::Tab => Some(EditorKey::Char('\t')),
        KeyCode::Enter => Some(EditorKey::Enter),
        KeyCode::Backspace => Some(EditorKey::Backspace),
        KeyCode::Delete => Some(EditorKey::Delete),
        KeyCode::Left => Some(EditorKey::Left),
        KeyCode::Right => Some(EditorKey::Right),
        KeyCode::Home => Some(EditorKey::Home),
        KeyCode::End => Some(EditorKey::End),
        KeyCode::Up => Some(EditorKey::Up),
        KeyCode::Down => Some(EditorKey::Down),
        KeyCode::Esc => Some(EditorKey::Escape),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_char() {
        assert_eq!(
            key_to_editor_key(KeyCode::Char('a'), KeyModifiers::NONE),
            Some(EditorKey::Char('a'))
        );
        assert_eq!(
            key_to_editor_key(KeyCode::Char('A'), KeyModifiers::SHIFT),
            Some(EditorKey::Char('A'))
        );
    }

    #[test]
    fn test_tab_inserts_literal_tab() {
        assert_eq!(
            key_to_editor_key(KeyCode::Tab, KeyModifiers::NONE),
            Some(EditorKey::Char('\t'))
        );
    }

    #[test]
    fn test_control_combinations_are_dropped() {
        assert_eq!(key_to_editor_key(KeyCode::Char('c'), KeyModifiers::CONTROL), None);
        assert_eq!(key_to_editor_key(KeyCode::Char('x'), KeyModifiers::ALT), None);
        assert_eq!(
            key_to_editor_key(KeyCode::Enter, KeyModifiers::CONTROL),
            Some(EditorKey::Enter)
        );
    }

    #[test]
    fn test_navigation_keys() {
        assert_eq!(key_to_editor_key(KeyCode::Home, KeyModifiers::NONE), Some(EditorKey::Home));
        assert_eq!(key_to_editor_key(KeyCode::End, KeyModifiers::NONE), Some(EditorKey::End));
        assert_eq!(key_to_editor_key(KeyCode::Up, KeyModifiers::NONE), Some(EditorKey::Up));
        assert_eq!(key_to_editor_key(KeyCode::PageUp, KeyModifiers::NONE), None);
        assert_eq!(key_to_editor_key(KeyCode::F(5), KeyModifiers::NONE), None);
    }

    #[test]
    fn test_close_key() {
        assert!(is_close_key(KeyCode::Char('q'), KeyModifiers::CONTROL));
        assert!(is_close_key(KeyCode::Char('Q'), KeyModifiers::CONTROL | KeyModifiers::SHIFT));
        assert!(!is_close_key(KeyCode::Char('q'), KeyModifiers::NONE));
    }
}
