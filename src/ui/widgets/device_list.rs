//! Block device list

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use super::truncate;
use crate::core::state::{AppMode, AppState};
use crate::integrations::devices::{BlockDevice, MediaKind};
use crate::ui::theme::Theme;

pub struct DeviceList<'a> {
    state: &'a AppState,
    theme: &'a Theme,
}

impl<'a> DeviceList<'a> {
    pub fn new(state: &'a AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    fn describe(device: &BlockDevice) -> String {
        let fs = device.fs_type.as_deref().unwrap_or("-");
        let size = humansize::format_size(device.size, humansize::BINARY);
        match &device.mountpoint {
            Some(mount) => format!("{} {} {}", fs, size, mount),
            None => format!("{} {}", fs, size),
        }
    }
}

impl<'a> Widget for DeviceList<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.state.mode == AppMode::Dashboard {
            self.theme.styles.panel_border_focused
        } else {
            self.theme.styles.panel_border
        };

        let panel = &self.state.panels.devices;
        let title = if panel.loading {
            " DEVICES (scanning) ".to_string()
        } else {
            format!(" DEVICES ({}) ", panel.devices.len())
        };

        let mut block = Block::default()
            .title(Span::styled(title, self.theme.styles.panel_title))
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(self.theme.colors.bg_primary));
        if let Some(scanned) = panel.last_updated {
            let stamp = scanned.with_timezone(&chrono::Local).format(" scanned %H:%M:%S ");
            block = block.title_bottom(Span::styled(
                stamp.to_string(),
                Style::default().fg(self.theme.colors.fg_muted),
            ));
        }

        let inner = block.inner(area);
        block.render(area, buf);

        if let Some(error) = &panel.error {
            let span = Span::styled(
                truncate(error, inner.width.saturating_sub(2) as usize),
                self.theme.styles.status_failed,
            );
            buf.set_span(inner.x + 1, inner.y, &span, inner.width.saturating_sub(2));
            return;
        }

        if panel.devices.is_empty() {
            let span = Span::styled(
                "No block devices found",
                Style::default().fg(self.theme.colors.fg_muted),
            );
            buf.set_span(inner.x + 1, inner.y, &span, inner.width.saturating_sub(2));
            return;
        }

        // Keep the selection visible when the list is taller than the panel
        let visible = inner.height as usize;
        let offset = panel.selected_index.saturating_sub(visible.saturating_sub(1));

        for (row, (idx, device)) in panel
            .devices
            .iter()
            .enumerate()
            .skip(offset)
            .take(visible)
            .enumerate()
        {
            let is_selected = idx == panel.selected_index;
            let eligible = device.check_eligible().is_ok();

            let base_style = if is_selected {
                self.theme.styles.list_item_selected
            } else if eligible {
                self.theme.styles.list_item
            } else {
                self.theme.styles.list_item_disabled
            };

            let indicator = if is_selected { "▸" } else { " " };
            let (media, media_style) = match device.media() {
                MediaKind::Hdd => ("HDD", Style::default().fg(self.theme.colors.success)),
                MediaKind::Ssd => ("SSD", Style::default().fg(self.theme.colors.warning)),
            };
            let indent = if device.device_type == "part" { "  " } else { "" };
            let name = truncate(&format!("{}{}", indent, device.name), 14);
            let detail = truncate(
                &Self::describe(device),
                inner.width.saturating_sub(22) as usize,
            );

            let line = Line::from(vec![
                Span::styled(indicator, base_style),
                Span::styled(format!(" {:<14} ", name), base_style),
                Span::styled(format!("{} ", media), media_style),
                Span::styled(detail, Style::default().fg(self.theme.colors.fg_muted)),
            ]);

            buf.set_line(inner.x, inner.y + row as u16, &line, inner.width);
        }
    }
}
