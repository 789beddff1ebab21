//! Help overlay widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

use crate::ui::theme::Theme;

const NOTES: [&str; 3] = [
    "Only rotational EXT4 devices can be analyzed or defragmented.",
    "The disk map is an illustration derived from the score.",
    "Cancelling stops waiting; e4defrag itself may keep running.",
];

pub struct HelpOverlay<'a> {
    theme: &'a Theme,
}

impl<'a> HelpOverlay<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        Self { theme }
    }
}

impl<'a> Widget for HelpOverlay<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let block = Block::default()
            .title(Span::styled(" Fragscope Help ", self.theme.styles.panel_title))
            .borders(Borders::ALL)
            .border_style(self.theme.styles.panel_border_focused)
            .style(Style::default().bg(self.theme.colors.bg_secondary));

        let inner = block.inner(area);
        block.render(area, buf);

        let keybindings = [
            ("Devices", vec![
                ("↑/k", "Select previous device"),
                ("↓/j", "Select next device"),
                ("r", "Rescan block devices"),
            ]),
            ("Tasks", vec![
                ("a", "Analyze fragmentation (e4defrag -c)"),
                ("d", "Defragment selected device"),
                ("x", "Cancel running tasks"),
            ]),
            ("General", vec![
                ("?", "Toggle help"),
                ("Esc", "Close overlay"),
                ("q", "Quit"),
            ]),
        ];

        let bottom = inner.y + inner.height;
        let mut y = inner.y;

        for (section, bindings) in &keybindings {
            if y >= bottom {
                break;
            }

            let header = Line::from(vec![Span::styled(
                format!("─── {} ", section),
                Style::default()
                    .fg(self.theme.colors.accent_primary)
                    .add_modifier(Modifier::BOLD),
            )]);
            buf.set_line(inner.x + 1, y, &header, inner.width.saturating_sub(2));
            y += 1;

            for (key, desc) in bindings {
                if y >= bottom {
                    break;
                }

                let line = Line::from(vec![
                    Span::styled(format!("  {:>6}  ", key), self.theme.styles.keybind_key),
                    Span::styled(*desc, self.theme.styles.keybind),
                ]);
                buf.set_line(inner.x + 1, y, &line, inner.width.saturating_sub(2));
                y += 1;
            }

            y += 1;
        }

        for note in NOTES {
            if y >= bottom {
                break;
            }
            let span = Span::styled(note, Style::default().fg(self.theme.colors.fg_muted));
            buf.set_span(inner.x + 1, y, &span, inner.width.saturating_sub(2));
            y += 1;
        }

        let hint = " Press Esc or ? to close ";
        let hint_width = (hint.chars().count() as u16).min(area.width);
        let footer = Span::styled(hint, Style::default().fg(self.theme.colors.fg_muted));
        buf.set_span(
            area.x + (area.width - hint_width) / 2,
            area.y + area.height.saturating_sub(1),
            &footer,
            hint_width,
        );
    }
}
