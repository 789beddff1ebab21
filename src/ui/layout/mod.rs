//! Layout management system

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Computed layout rects for all panels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputedLayout {
    pub header: Rect,
    pub footer: Rect,
    pub devices: Rect,
    pub report: Rect,
    pub map: Rect,
    pub output: Rect,
    pub overlay_area: Rect,
}

impl ComputedLayout {
    /// Drawable area inside the disk map's border
    pub fn map_inner(&self) -> Rect {
        inner(self.map)
    }

    /// Map surface in units: one per terminal column, two per terminal row
    pub fn map_surface(&self) -> (u32, u32) {
        let area = self.map_inner();
        (u32::from(area.width), u32::from(area.height) * 2)
    }
}

pub struct LayoutManager;

impl LayoutManager {
    /// Compute all panel rects for the terminal area
    pub fn compute(area: Rect) -> ComputedLayout {
        // Main vertical split: header, body, footer
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(10),
                Constraint::Length(1),
            ])
            .split(area);

        // Body: sidebar | disk map
        let body_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Min(30)])
            .split(main_chunks[1]);

        let sidebar = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(13)])
            .split(body_chunks[0]);

        let main = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(8)])
            .split(body_chunks[1]);

        ComputedLayout {
            header: main_chunks[0],
            footer: main_chunks[2],
            devices: sidebar[0],
            report: sidebar[1],
            map: main[0],
            output: main[1],
            overlay_area: centered_rect(60, 70, area),
        }
    }
}

fn inner(area: Rect) -> Rect {
    Rect {
        x: area.x.saturating_add(1),
        y: area.y.saturating_add(1),
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    }
}

/// Create a centered rect with given percentage width/height
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panels_stay_inside_the_terminal() {
        let area = Rect::new(0, 0, 120, 40);
        let layout = LayoutManager::compute(area);

        for rect in [layout.devices, layout.report, layout.map, layout.output] {
            assert!(rect.right() <= area.right());
            assert!(rect.bottom() <= area.bottom());
        }
        assert_eq!(layout.header.height, 1);
        assert_eq!(layout.footer.y, 39);
    }

    #[test]
    fn map_surface_counts_two_units_per_row() {
        let layout = LayoutManager::compute(Rect::new(0, 0, 120, 40));
        let inner = layout.map_inner();
        assert_eq!(
            layout.map_surface(),
            (u32::from(inner.width), u32::from(inner.height) * 2)
        );
        assert!(inner.width > 0 && inner.height > 0);
    }

    #[test]
    fn tiny_terminal_yields_zero_surface() {
        let layout = LayoutManager::compute(Rect::new(0, 0, 2, 2));
        let (w, h) = layout.map_surface();
        assert_eq!(w * h, 0);
    }
}
