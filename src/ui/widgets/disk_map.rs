//! Disk occupancy map.
//!
//! Each terminal cell covers one unit of width and two units of height, so
//! it is drawn as an upper half block: foreground for the upper unit and
//! background for the lower one.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::Span,
    widgets::{Block, Borders, Widget},
};

use crate::core::state::AppState;
use crate::fragmentation::OccupancyGrid;
use crate::ui::theme::Theme;

const HALF_BLOCK: &str = "▀";

pub struct DiskMap<'a> {
    state: &'a AppState,
    theme: &'a Theme,
}

impl<'a> DiskMap<'a> {
    pub fn new(state: &'a AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    fn unit_color(&self, grid: &OccupancyGrid, edge: usize, x: usize, y: usize) -> Color {
        match grid.get(y / edge, x / edge) {
            Some(category) => self.theme.cell_color(category),
            None => self.theme.colors.bg_primary,
        }
    }
}

impl<'a> Widget for DiskMap<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = match self.state.selected_device() {
            Some(device) => format!(" DISK MAP {} ", device.path),
            None => " DISK MAP ".to_string(),
        };

        let block = Block::default()
            .title(Span::styled(title, self.theme.styles.panel_title))
            .title_bottom(Span::styled(
                " illustrative, not actual block positions ",
                Style::default().fg(self.theme.colors.fg_muted),
            ))
            .borders(Borders::ALL)
            .border_style(self.theme.styles.panel_border)
            .style(Style::default().bg(self.theme.colors.bg_primary));

        let inner = block.inner(area);
        block.render(area, buf);

        let map = &self.state.panels.map;
        let grid = &map.grid;
        if grid.is_empty() {
            return;
        }

        let edge = map.cell_edge.max(1) as usize;
        for ty in 0..inner.height {
            for tx in 0..inner.width {
                let x = tx as usize;
                let upper = self.unit_color(grid, edge, x, ty as usize * 2);
                let lower = self.unit_color(grid, edge, x, ty as usize * 2 + 1);
                buf.set_string(
                    inner.x + tx,
                    inner.y + ty,
                    HALF_BLOCK,
                    Style::default().fg(upper).bg(lower),
                );
            }
        }
    }
}
