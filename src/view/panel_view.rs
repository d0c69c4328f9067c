//! Rendering of the terminal panel
//!
//! The buffer is drawn without soft wrapping. The view keeps its own scroll
//! position, follows the cursor whenever the buffer asks for it
//! (`ensure_cursor_visible`), and shows a one-line status bar at the bottom.

use ratatui::layout::{Position, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use unicode_width::UnicodeWidthChar;

use crate::app::SessionState;
use crate::model::{DisplaySurface, TextBuffer};

/// Tab stops every 8 columns, like most terminals
const TAB_WIDTH: usize = 8;

/// What the status bar shows besides the session state.
#[derive(Debug, Clone, Default)]
pub struct PanelStatus {
    pub shell: String,
    pub pid: Option<u32>,
}

/// Scroll position of the panel, kept between frames.
#[derive(Debug, Clone, Default)]
pub struct PanelViewState {
    /// First buffer line shown
    top_line: usize,
    /// Display columns hidden on the left
    left_col: usize,
    /// Set by manual scrolling; cleared when the cursor is followed again
    detached: bool,
}

impl PanelViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn top_line(&self) -> usize {
        self.top_line
    }

    /// Scroll by `delta` lines (negative is up). Stops following the cursor
    /// until the buffer next asks for it.
    pub fn scroll_by(&mut self, delta: isize, line_count: usize) {
        let max_top = line_count.saturating_sub(1);
        self.top_line = self.top_line.saturating_add_signed(delta).min(max_top);
        self.detached = true;
    }
}

/// Where things ended up on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelLayout {
    pub text_area: Rect,
    pub status_area: Rect,
    /// Terminal cursor position, when the panel is editable and the cursor
    /// is on screen
    pub cursor: Option<(u16, u16)>,
}

/// Draw the buffer and the status bar into `area`.
pub fn render_panel(
    frame: &mut Frame,
    area: Rect,
    buffer: &mut TextBuffer,
    state: SessionState,
    status: &PanelStatus,
    view: &mut PanelViewState,
) -> PanelLayout {
    if area.height == 0 || area.width == 0 {
        return PanelLayout::default();
    }

    let text_area = Rect::new(area.x, area.y, area.width, area.height.saturating_sub(1));
    let status_area = Rect::new(area.x, area.y + text_area.height, area.width, 1);

    if buffer.take_scroll_request() {
        view.detached = false;
    }

    let (cursor_line, cursor_char) = buffer.line_col(buffer.cursor_position());
    let cursor_x = display_column(buffer.line_text(cursor_line), cursor_char);

    let rows = text_area.height as usize;
    let cols = text_area.width as usize;
    if !view.detached {
        follow_cursor(view, cursor_line, cursor_x, rows, cols);
    }

    let visible: Vec<Line> = buffer
        .text()
        .split('\n')
        .skip(view.top_line)
        .take(rows)
        .map(|line| Line::from(visible_slice(&expand_tabs(line), view.left_col, cols)))
        .collect();
    frame.render_widget(Paragraph::new(visible), text_area);

    frame.render_widget(
        Paragraph::new(Line::from(status_spans(state, status, buffer.is_read_only())))
            .style(Style::default().add_modifier(Modifier::REVERSED)),
        status_area,
    );

    let on_screen = cursor_line >= view.top_line
        && cursor_line < view.top_line + rows
        && cursor_x >= view.left_col
        && cursor_x < view.left_col + cols;
    let cursor = (!buffer.is_read_only() && on_screen).then(|| {
        (
            text_area.x + (cursor_x - view.left_col) as u16,
            text_area.y + (cursor_line - view.top_line) as u16,
        )
    });
    if let Some((x, y)) = cursor {
        frame.set_cursor_position(Position::new(x, y));
    }

    PanelLayout {
        text_area,
        status_area,
        cursor,
    }
}

fn follow_cursor(view: &mut PanelViewState, line: usize, x: usize, rows: usize, cols: usize) {
    if rows > 0 {
        if line < view.top_line {
            view.top_line = line;
        } else if line >= view.top_line + rows {
            view.top_line = line + 1 - rows;
        }
    }
    if cols > 0 {
        if x < view.left_col {
            view.left_col = x;
        } else if x >= view.left_col + cols {
            view.left_col = x + 1 - cols;
        }
    }
}

fn status_spans(state: SessionState, status: &PanelStatus, read_only: bool) -> Vec<Span<'static>> {
    let label = match state {
        SessionState::Starting => "starting",
        SessionState::AwaitingInput => "ready",
        SessionState::AwaitingOutput => "running",
        SessionState::Terminated => "exited",
    };
    let mut spans = vec![Span::raw(format!(" {}", status.shell))];
    if let Some(pid) = status.pid {
        spans.push(Span::raw(format!(" (pid {pid})")));
    }
    spans.push(Span::raw(" | "));
    spans.push(Span::styled(
        label.to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    ));
    if read_only {
        spans.push(Span::raw(" [read-only]"));
    }
    spans.push(Span::raw(" | Ctrl+Q close "));
    spans
}

/// Display column of the char at `char_idx` in `line`.
fn display_column(line: &str, char_idx: usize) -> usize {
    line.chars()
        .take(char_idx)
        .fold(0, |col, ch| col + char_cells(ch, col))
}

fn char_cells(ch: char, col: usize) -> usize {
    if ch == '\t' {
        TAB_WIDTH - col % TAB_WIDTH
    } else {
        ch.width().unwrap_or(0)
    }
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut col = 0;
    for ch in line.chars() {
        let cells = char_cells(ch, col);
        if ch == '\t' {
            out.push_str(&" ".repeat(cells));
        } else if ch.is_control() {
            // Stray control characters (\r, bell, escapes) are not drawn
            continue;
        } else {
            out.push(ch);
        }
        col += cells;
    }
    out
}

/// The part of `line` between display columns `left` and `left + width`.
fn visible_slice(line: &str, left: usize, width: usize) -> String {
    let mut out = String::new();
    let mut col = 0;
    for ch in line.chars() {
        let w = ch.width().unwrap_or(0);
        if col >= left && col + w <= left + width {
            out.push(ch);
        }
        col += w;
        if col >= left + width {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn draw(
        width: u16,
        height: u16,
        buffer: &mut TextBuffer,
        state: SessionState,
        view: &mut PanelViewState,
    ) -> (PanelLayout, Vec<String>) {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();
        let mut layout = PanelLayout::default();
        let status = PanelStatus {
            shell: "sh".to_string(),
            pid: Some(7),
        };
        terminal
            .draw(|frame| {
                let area = Rect::new(0, 0, width, height);
                layout = render_panel(frame, area, buffer, state, &status, view);
            })
            .unwrap();
        let screen = terminal.backend().buffer();
        let rows = (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| screen[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect();
        (layout, rows)
    }

    #[test]
    fn test_renders_text_and_status() {
        let mut buffer = TextBuffer::new();
        buffer.append("hello\n$ ");
        buffer.set_read_only(false);
        let mut view = PanelViewState::new();
        let (layout, rows) = draw(30, 4, &mut buffer, SessionState::AwaitingInput, &mut view);

        assert!(rows[0].starts_with("hello"));
        assert!(rows[1].starts_with("$ "));
        assert!(rows[3].contains("sh (pid 7) | ready"));
        assert_eq!(layout.cursor, Some((2, 1)));
    }

    #[test]
    fn test_read_only_hides_cursor() {
        let mut buffer = TextBuffer::new();
        buffer.append("$ ls\n");
        let mut view = PanelViewState::new();
        let (layout, rows) = draw(50, 3, &mut buffer, SessionState::AwaitingOutput, &mut view);
        assert_eq!(layout.cursor, None);
        assert!(rows[2].contains("running [read-only]"));
    }

    #[test]
    fn test_follows_cursor_to_last_line() {
        let mut buffer = TextBuffer::new();
        for i in 0..10 {
            buffer.append(&format!("line {i}\n"));
        }
        buffer.append("$ ");
        buffer.set_read_only(false);
        buffer.ensure_cursor_visible();
        let mut view = PanelViewState::new();
        let (layout, rows) = draw(20, 4, &mut buffer, SessionState::AwaitingInput, &mut view);

        assert_eq!(view.top_line(), 8);
        assert!(!buffer.take_scroll_request());
        assert!(rows[0].starts_with("line 8"));
        assert!(rows[2].starts_with("$ "));
        assert_eq!(layout.cursor, Some((2, 2)));
    }

    #[test]
    fn test_manual_scroll_detaches_until_next_request() {
        let mut buffer = TextBuffer::new();
        for i in 0..10 {
            buffer.append(&format!("line {i}\n"));
        }
        let mut view = PanelViewState::new();
        buffer.ensure_cursor_visible();
        draw(20, 4, &mut buffer, SessionState::AwaitingInput, &mut view);
        assert_eq!(view.top_line(), 8);

        view.scroll_by(-5, buffer.line_count());
        draw(20, 4, &mut buffer, SessionState::AwaitingInput, &mut view);
        assert_eq!(view.top_line(), 3);

        buffer.ensure_cursor_visible();
        draw(20, 4, &mut buffer, SessionState::AwaitingInput, &mut view);
        assert_eq!(view.top_line(), 8);
    }

    #[test]
    fn test_tabs_and_wide_chars_take_their_width() {
        assert_eq!(display_column("\tx", 1), 8);
        assert_eq!(display_column("ab\tx", 3), 8);
        assert_eq!(display_column("日本", 1), 2);
        assert_eq!(expand_tabs("a\tb"), "a       b");
        assert_eq!(expand_tabs("a\rb"), "ab");
    }

    #[test]
    fn test_visible_slice_scrolls_horizontally() {
        assert_eq!(visible_slice("abcdef", 2, 3), "cde");
        assert_eq!(visible_slice("abc", 0, 10), "abc");
        // A wide char cut by the left edge is dropped
        assert_eq!(visible_slice("日本語", 1, 4), "本");
    }
}
