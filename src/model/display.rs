//! Display surface contract and an in-memory implementation.
//!
//! The terminal core never renders anything itself. It appends text to, and
//! edits the tail of, a [`DisplaySurface`] owned by the UI thread. All
//! positions are char offsets (Unicode scalar values), never byte offsets.

use std::ops::Range;

/// The text widget the terminal session writes into.
pub trait DisplaySurface {
    /// Append text at the end of the buffer and move the cursor there.
    fn append(&mut self, text: &str);

    fn set_read_only(&mut self, read_only: bool);

    fn is_read_only(&self) -> bool;

    fn cursor_position(&self) -> usize;

    /// Positions past the end are clamped to the buffer length.
    fn set_cursor_position(&mut self, pos: usize);

    /// Length of the buffer in chars.
    fn buffer_length(&self) -> usize;

    /// Scroll so the cursor is on screen.
    fn ensure_cursor_visible(&mut self);

    fn insert_text(&mut self, pos: usize, text: &str);

    fn delete_range(&mut self, range: Range<usize>);

    fn text_range(&self, range: Range<usize>) -> String;

    /// Offset of the line break ending the line containing `pos`, or the
    /// buffer length on the last line.
    fn line_end(&self, pos: usize) -> usize;

    /// Offset of the first char of the line containing `pos`.
    fn line_start(&self, pos: usize) -> usize;
}

/// Plain in-memory text buffer implementing [`DisplaySurface`].
///
/// Used by the host binary (rendered by `view::panel_view`) and by tests.
/// Offsets near the end of the buffer, where the prompt and the typed line
/// live, are resolved by walking backwards from the end.
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    text: String,
    /// Cached char count of `text`
    len: usize,
    /// Cached number of `\n` in `text`
    newlines: usize,
    cursor: usize,
    read_only: bool,
    /// Set by `ensure_cursor_visible`, cleared by the view once it scrolled
    scroll_to_cursor: bool,
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}

impl TextBuffer {
    pub fn new() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte index of the char at `pos` (or the end of the string).
    fn byte_index(&self, pos: usize) -> usize {
        if pos >= self.len {
            return self.text.len();
        }
        if pos > self.len / 2 {
            self.text
                .char_indices()
                .rev()
                .nth(self.len - pos - 1)
                .map(|(i, _)| i)
                .unwrap_or(0)
        } else {
            self.text
                .char_indices()
                .nth(pos)
                .map(|(i, _)| i)
                .unwrap_or(self.text.len())
        }
    }

    fn clamp_range(&self, range: Range<usize>) -> Range<usize> {
        let end = range.end.min(self.len);
        let start = range.start.min(end);
        start..end
    }

    /// Zero-based (line, column) of a char offset, column in chars.
    pub fn line_col(&self, pos: usize) -> (usize, usize) {
        let pos = pos.min(self.len);
        let at = self.byte_index(pos);
        let after = &self.text[at..];
        let line = self.newlines - count_newlines(after);
        let col = match self.text[..at].rfind('\n') {
            Some(nl) => self.text[nl + 1..at].chars().count(),
            None => pos,
        };
        (line, col)
    }

    pub fn line_count(&self) -> usize {
        self.newlines + 1
    }

    /// Text of line `line` without its line break, or `""` past the end.
    pub fn line_text(&self, line: usize) -> &str {
        if line > self.newlines {
            return "";
        }
        let from_end = self.newlines - line;
        if from_end < line {
            self.text.rsplit('\n').nth(from_end).unwrap_or("")
        } else {
            self.text.split('\n').nth(line).unwrap_or("")
        }
    }

    /// Returns and clears the pending scroll request.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_cursor)
    }
}

impl DisplaySurface for TextBuffer {
    fn append(&mut self, text: &str) {
        self.text.push_str(text);
        self.len += text.chars().count();
        self.newlines += count_newlines(text);
        self.cursor = self.len;
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn cursor_position(&self) -> usize {
        self.cursor
    }

    fn set_cursor_position(&mut self, pos: usize) {
        self.cursor = pos.min(self.len);
    }

    fn buffer_length(&self) -> usize {
        self.len
    }

    fn ensure_cursor_visible(&mut self) {
        self.scroll_to_cursor = true;
    }

    fn insert_text(&mut self, pos: usize, text: &str) {
        let pos = pos.min(self.len);
        let at = self.byte_index(pos);
        self.text.insert_str(at, text);
        let inserted = text.chars().count();
        self.len += inserted;
        self.newlines += count_newlines(text);
        if self.cursor >= pos {
            self.cursor += inserted;
        }
    }

    fn delete_range(&mut self, range: Range<usize>) {
        let range = self.clamp_range(range);
        if range.is_empty() {
            return;
        }
        let start = self.byte_index(range.start);
        let end = self.byte_index(range.end);
        self.newlines -= count_newlines(&self.text[start..end]);
        self.text.replace_range(start..end, "");
        let removed = range.end - range.start;
        self.len -= removed;
        if self.cursor >= range.end {
            self.cursor -= removed;
        } else if self.cursor > range.start {
            self.cursor = range.start;
        }
    }

    fn text_range(&self, range: Range<usize>) -> String {
        let range = self.clamp_range(range);
        let start = self.byte_index(range.start);
        let end = self.byte_index(range.end);
        self.text[start..end].to_string()
    }

    fn line_end(&self, pos: usize) -> usize {
        let pos = pos.min(self.len);
        let at = self.byte_index(pos);
        match self.text[at..].find('\n') {
            Some(offset) => pos + self.text[at..at + offset].chars().count(),
            None => self.len,
        }
    }

    fn line_start(&self, pos: usize) -> usize {
        let pos = pos.min(self.len);
        let at = self.byte_index(pos);
        match self.text[..at].rfind('\n') {
            Some(nl) => pos - self.text[nl + 1..at].chars().count(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty_and_read_only() {
        let buf = TextBuffer::new();
        assert_eq!(buf.buffer_length(), 0);
        assert_eq!(buf.cursor_position(), 0);
        assert!(buf.is_read_only());
    }

    #[test]
    fn test_append_moves_cursor_to_end() {
        let mut buf = TextBuffer::new();
        buf.append("$ ");
        buf.set_cursor_position(0);
        buf.append("héllo");
        assert_eq!(buf.text(), "$ héllo");
        assert_eq!(buf.buffer_length(), 7);
        assert_eq!(buf.cursor_position(), 7);
    }

    #[test]
    fn test_insert_and_delete_use_char_offsets() {
        let mut buf = TextBuffer::new();
        buf.append("aé");
        buf.insert_text(1, "ß");
        assert_eq!(buf.text(), "aßé");
        assert_eq!(buf.cursor_position(), 3);

        buf.delete_range(1..2);
        assert_eq!(buf.text(), "aé");
        assert_eq!(buf.cursor_position(), 2);
        assert_eq!(buf.buffer_length(), 2);
    }

    #[test]
    fn test_delete_range_pulls_cursor_inside_range_to_start() {
        let mut buf = TextBuffer::new();
        buf.append("abcdef");
        buf.set_cursor_position(3);
        buf.delete_range(1..5);
        assert_eq!(buf.text(), "af");
        assert_eq!(buf.cursor_position(), 1);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let mut buf = TextBuffer::new();
        buf.append("abc");
        buf.set_cursor_position(99);
        assert_eq!(buf.cursor_position(), 3);
        assert_eq!(buf.text_range(1..99), "bc");
        buf.delete_range(2..99);
        assert_eq!(buf.text(), "ab");
        buf.delete_range(5..9);
        assert_eq!(buf.text(), "ab");
    }

    #[test]
    fn test_line_bounds() {
        let mut buf = TextBuffer::new();
        buf.append("one\n$ two");
        assert_eq!(buf.line_end(0), 3);
        assert_eq!(buf.line_end(2), 3);
        assert_eq!(buf.line_end(4), 9);
        assert_eq!(buf.line_start(6), 4);
        assert_eq!(buf.line_start(3), 0);
        assert_eq!(buf.line_col(6), (1, 2));
        assert_eq!(buf.line_count(), 2);
        assert_eq!(buf.line_text(0), "one");
        assert_eq!(buf.line_text(1), "$ two");
        assert_eq!(buf.line_text(2), "");
    }

    #[test]
    fn test_offsets_near_the_end_of_a_long_buffer() {
        let mut buf = TextBuffer::new();
        for i in 0..1000 {
            buf.append(&format!("línea {i}\n"));
        }
        buf.append("ü$ ");
        let len = buf.buffer_length();

        buf.insert_text(len, "é");
        assert_eq!(buf.text_range(len - 3..len + 1), "ü$ é");
        assert_eq!(buf.line_start(len), len - 3);
        assert_eq!(buf.line_end(len - 3), len + 1);
        assert_eq!(buf.line_col(len + 1), (1000, 4));
        assert_eq!(buf.line_count(), 1001);
        assert_eq!(buf.line_text(1000), "ü$ é");
        assert_eq!(buf.line_text(999), "línea 999");

        buf.delete_range(len - 4..len + 1);
        assert_eq!(buf.line_count(), 1000);
        assert!(buf.text().ends_with("línea 999"));
        assert_eq!(buf.line_col(buf.buffer_length()), (999, 9));
    }

    #[test]
    fn test_scroll_request_is_consumed_once() {
        let mut buf = TextBuffer::new();
        assert!(!buf.take_scroll_request());
        buf.ensure_cursor_visible();
        assert!(buf.take_scroll_request());
        assert!(!buf.take_scroll_request());
    }
}
