//! Header widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::core::state::AppState;
use crate::tasks::TaskState;
use crate::ui::theme::Theme;

pub struct Header<'a> {
    state: &'a AppState,
    theme: &'a Theme,
}

impl<'a> Header<'a> {
    pub fn new(state: &'a AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    fn separator(&self) -> Span<'static> {
        Span::styled(" │ ", Style::default().fg(self.theme.colors.fg_muted))
    }

    fn state_style(&self, state: TaskState) -> Style {
        match state {
            TaskState::Idle => Style::default().fg(self.theme.colors.fg_muted),
            TaskState::Running => self.theme.styles.status_running,
            TaskState::Completed => self.theme.styles.notification_success,
            TaskState::Failed => self.theme.styles.status_failed,
            TaskState::Cancelled => self.theme.styles.status_warning,
        }
    }
}

impl<'a> Widget for Header<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_style(area, self.theme.styles.header);

        let device = self
            .state
            .selected_device()
            .map(|d| d.path.as_str())
            .unwrap_or("no device");

        let mut spans = vec![
            Span::styled(
                " FRAGSCOPE ",
                Style::default()
                    .fg(self.theme.colors.accent_primary)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("│ ", Style::default().fg(self.theme.colors.fg_muted)),
            Span::styled(device, Style::default().fg(self.theme.colors.fg_primary)),
        ];

        for status in &self.state.panels.tasks.statuses {
            spans.push(self.separator());
            let mut text = format!("{} {}", status.kind.label(), status.state);
            if status.state == TaskState::Running {
                if let Some(device) = &status.device {
                    text.push_str(&format!(" {} {}s", device, status.elapsed_secs));
                }
            }
            spans.push(Span::styled(text, self.state_style(status.state)));
        }

        if let Some(helper) = &self.state.elevated_via {
            spans.push(self.separator());
            spans.push(Span::styled(
                format!("via {}", helper),
                Style::default().fg(self.theme.colors.fg_secondary),
            ));
        }

        let left_line = Line::from(spans);
        buf.set_line(area.x, area.y, &left_line, area.width);

        let time = chrono::Local::now().format("%H:%M").to_string();
        let time_span = Span::styled(&time, Style::default().fg(self.theme.colors.fg_muted));
        let time_x = area.x + area.width.saturating_sub(time.len() as u16 + 1);
        buf.set_span(time_x, area.y, &time_span, time.len() as u16);
    }
}
