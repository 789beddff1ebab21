//! Main UI renderer

use ratatui::{layout::Rect, Frame};

use crate::core::state::{AppMode, AppState, NotificationLevel};
use crate::ui::layout::{centered_rect, ComputedLayout};
use crate::ui::widgets::*;

pub struct Renderer;

impl Renderer {
    /// Draw one frame; `layout` must come from [`crate::ui::layout::LayoutManager::compute`] for this frame's area
    pub fn render(frame: &mut Frame, state: &AppState, layout: &ComputedLayout) {
        let theme = &state.theme;

        // Clear background
        frame.render_widget(
            ratatui::widgets::Block::default()
                .style(ratatui::style::Style::default().bg(theme.colors.bg_primary)),
            frame.area(),
        );

        frame.render_widget(Header::new(state, theme), layout.header);
        frame.render_widget(Footer::new(state, theme), layout.footer);
        frame.render_widget(DeviceList::new(state, theme), layout.devices);
        frame.render_widget(ReportPanel::new(state, theme), layout.report);
        frame.render_widget(DiskMap::new(state, theme), layout.map);
        frame.render_widget(OutputPanel::new(state, theme), layout.output);

        match &state.mode {
            AppMode::Help => {
                frame.render_widget(HelpOverlay::new(theme), layout.overlay_area);
            }
            AppMode::Confirm { message, .. } => {
                Self::render_confirm_dialog(frame, state, message, layout.overlay_area);
            }
            AppMode::Dashboard => {}
        }

        Self::render_notifications(frame, state);
    }

    fn render_confirm_dialog(frame: &mut Frame, state: &AppState, message: &str, area: Rect) {
        use ratatui::style::Style;
        use ratatui::text::{Line, Span};
        use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

        let theme = &state.theme;
        let dialog_area = centered_rect(70, 45, area);

        frame.render_widget(Clear, dialog_area);

        let block = Block::default()
            .title(Span::styled(" Confirm ", theme.styles.panel_title))
            .borders(Borders::ALL)
            .border_style(theme.styles.panel_border_focused)
            .style(Style::default().bg(theme.colors.bg_secondary));

        let inner = block.inner(dialog_area);
        frame.render_widget(block, dialog_area);
        if inner.height < 3 {
            return;
        }

        let msg_para = Paragraph::new(message)
            .style(Style::default().fg(theme.colors.fg_primary))
            .alignment(ratatui::layout::Alignment::Center)
            .wrap(Wrap { trim: true });

        frame.render_widget(
            msg_para,
            Rect {
                y: inner.y + 1,
                height: inner.height.saturating_sub(3),
                ..inner
            },
        );

        let buttons = Line::from(vec![
            Span::styled("[Y]es", theme.styles.keybind_key),
            Span::styled("  ", theme.styles.keybind),
            Span::styled("[N]o", theme.styles.keybind_key),
        ]);

        frame.render_widget(
            Paragraph::new(buttons).alignment(ratatui::layout::Alignment::Center),
            Rect {
                y: inner.y + inner.height - 1,
                height: 1,
                ..inner
            },
        );
    }

    fn render_notifications(frame: &mut Frame, state: &AppState) {
        use ratatui::style::Style;
        use ratatui::text::Span;
        use ratatui::widgets::Paragraph;
        use unicode_width::UnicodeWidthStr;

        let theme = &state.theme;
        let area = frame.area();

        // Newest three, top-right corner
        let mut y = 2;
        for notification in state.notifications.iter().rev().take(3) {
            if y >= area.height {
                break;
            }
            let (style, icon) = match notification.level {
                NotificationLevel::Info => (theme.styles.notification_info, "ℹ"),
                NotificationLevel::Success => (theme.styles.notification_success, "✓"),
                NotificationLevel::Warning => (theme.styles.status_warning, "⚠"),
                NotificationLevel::Error => (theme.styles.notification_error, "✗"),
            };

            let max_width = area.width.saturating_sub(4).min(60) as usize;
            let msg = truncate(&format!(" {} {} ", icon, notification.message), max_width);
            let width = msg.width() as u16;
            let x = area.width.saturating_sub(width + 2);

            frame.render_widget(
                Paragraph::new(Span::styled(msg, style))
                    .style(Style::default().bg(theme.colors.bg_tertiary)),
                Rect {
                    x,
                    y,
                    width,
                    height: 1,
                },
            );

            y += 2;
        }
    }
}
