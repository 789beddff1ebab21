//! Output panel widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use super::truncate;
use crate::core::state::{AppState, OutputStream};
use crate::ui::theme::Theme;

pub struct OutputPanel<'a> {
    state: &'a AppState,
    theme: &'a Theme,
}

impl<'a> OutputPanel<'a> {
    pub fn new(state: &'a AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }
}

impl<'a> Widget for OutputPanel<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(Span::styled(" OUTPUT ", self.theme.styles.panel_title))
            .borders(Borders::ALL)
            .border_style(self.theme.styles.panel_border)
            .style(Style::default().bg(self.theme.colors.bg_primary));

        let inner = block.inner(area);
        block.render(area, buf);

        let output = &self.state.panels.output;

        if output.lines.is_empty() {
            let span = Span::styled(
                "Tool output will appear here...",
                Style::default().fg(self.theme.colors.fg_muted),
            );
            buf.set_span(inner.x + 1, inner.y, &span, inner.width.saturating_sub(2));
            return;
        }

        // Always pinned to the newest lines
        let visible_lines = inner.height as usize;
        let start = output.lines.len().saturating_sub(visible_lines);

        for (i, line) in output.lines.iter().skip(start).enumerate() {
            let (prefix, prefix_style, style) = match line.stream {
                OutputStream::Stdout => (
                    "│ ",
                    Style::default().fg(self.theme.colors.fg_muted),
                    Style::default().fg(self.theme.colors.fg_primary),
                ),
                OutputStream::Stderr => (
                    "! ",
                    Style::default().fg(self.theme.colors.error),
                    Style::default().fg(self.theme.colors.error),
                ),
                OutputStream::System => (
                    "● ",
                    Style::default().fg(self.theme.colors.accent_primary),
                    Style::default().fg(self.theme.colors.fg_muted),
                ),
            };

            let stamp = line.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S ");
            let stamp = stamp.to_string();
            let max_content_width = inner.width.saturating_sub(2 + stamp.len() as u16) as usize;
            let content = truncate(&line.content, max_content_width);

            let display_line = Line::from(vec![
                Span::styled(prefix, prefix_style),
                Span::styled(stamp, Style::default().fg(self.theme.colors.fg_muted)),
                Span::styled(content, style),
            ]);

            buf.set_line(inner.x, inner.y + i as u16, &display_line, inner.width);
        }
    }
}
