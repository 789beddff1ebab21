//! UI Widgets

pub mod device_list;
pub mod disk_map;
pub mod footer;
pub mod header;
pub mod help_overlay;
pub mod output_panel;
pub mod report_panel;

pub use device_list::DeviceList;
pub use disk_map::DiskMap;
pub use footer::Footer;
pub use header::Header;
pub use help_overlay::HelpOverlay;
pub use output_panel::OutputPanel;
pub use report_panel::ReportPanel;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Cut `s` to at most `max_width` terminal columns, marking the cut with an ellipsis
pub(crate) fn truncate(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    if max_width <= 1 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max_width - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}
