//! Color palettes and the styles derived from them

use ratatui::style::{Color, Modifier, Style};

use crate::fragmentation::CellCategory;

/// Complete theme definition
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub colors: ThemeColors,
    pub styles: ThemeStyles,
}

#[derive(Debug, Clone)]
pub struct ThemeColors {
    pub bg_primary: Color,
    pub bg_secondary: Color,
    pub bg_tertiary: Color,

    pub fg_primary: Color,
    pub fg_secondary: Color,
    pub fg_muted: Color,

    pub accent_primary: Color,
    pub accent_secondary: Color,

    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,

    pub border: Color,
    pub border_focused: Color,
    pub selection: Color,

    /// Disk map cells
    pub map: MapColors,
}

/// One color per occupancy category
#[derive(Debug, Clone, Copy)]
pub struct MapColors {
    pub empty: Color,
    pub metadata: Color,
    pub contiguous: Color,
    pub fragmented: Color,
    pub unmovable: Color,
    pub unknown: Color,
}

#[derive(Debug, Clone)]
pub struct ThemeStyles {
    pub header: Style,
    pub footer: Style,
    pub panel_title: Style,
    pub panel_border: Style,
    pub panel_border_focused: Style,
    pub list_item: Style,
    pub list_item_selected: Style,
    pub list_item_disabled: Style,
    pub status_running: Style,
    pub status_failed: Style,
    pub status_warning: Style,
    pub gauge: Style,
    pub keybind: Style,
    pub keybind_key: Style,
    pub notification_info: Style,
    pub notification_success: Style,
    pub notification_error: Style,
}

impl Theme {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "gruvbox" => Self::gruvbox(),
            _ => Self::tokyo_night(),
        }
    }

    pub fn cell_color(&self, category: CellCategory) -> Color {
        let map = &self.colors.map;
        match category {
            CellCategory::Empty => map.empty,
            CellCategory::Metadata => map.metadata,
            CellCategory::NonFragmented => map.contiguous,
            CellCategory::Fragmented => map.fragmented,
            CellCategory::Unmovable => map.unmovable,
            CellCategory::Unknown => map.unknown,
        }
    }

    /// Tokyo Night theme (default)
    pub fn tokyo_night() -> Self {
        let colors = ThemeColors {
            bg_primary: Color::Rgb(26, 27, 38),
            bg_secondary: Color::Rgb(36, 40, 59),
            bg_tertiary: Color::Rgb(41, 46, 66),

            fg_primary: Color::Rgb(192, 202, 245),
            fg_secondary: Color::Rgb(169, 177, 214),
            fg_muted: Color::Rgb(86, 95, 137),

            accent_primary: Color::Rgb(122, 162, 247),
            accent_secondary: Color::Rgb(187, 154, 247),

            success: Color::Rgb(158, 206, 106),
            warning: Color::Rgb(224, 175, 104),
            error: Color::Rgb(247, 118, 142),
            info: Color::Rgb(125, 207, 255),

            border: Color::Rgb(41, 46, 66),
            border_focused: Color::Rgb(122, 162, 247),
            selection: Color::Rgb(52, 59, 88),

            map: MapColors {
                empty: Color::Rgb(47, 53, 73),
                metadata: Color::Rgb(125, 207, 255),
                contiguous: Color::Rgb(122, 162, 247),
                fragmented: Color::Rgb(247, 118, 142),
                unmovable: Color::Rgb(224, 175, 104),
                unknown: Color::Rgb(86, 95, 137),
            },
        };

        Self::from_colors("Tokyo Night", colors)
    }

    pub fn gruvbox() -> Self {
        let colors = ThemeColors {
            bg_primary: Color::Rgb(40, 40, 40),
            bg_secondary: Color::Rgb(60, 56, 54),
            bg_tertiary: Color::Rgb(80, 73, 69),

            fg_primary: Color::Rgb(235, 219, 178),
            fg_secondary: Color::Rgb(213, 196, 161),
            fg_muted: Color::Rgb(168, 153, 132),

            accent_primary: Color::Rgb(131, 165, 152),
            accent_secondary: Color::Rgb(211, 134, 155),

            success: Color::Rgb(184, 187, 38),
            warning: Color::Rgb(250, 189, 47),
            error: Color::Rgb(251, 73, 52),
            info: Color::Rgb(131, 165, 152),

            border: Color::Rgb(80, 73, 69),
            border_focused: Color::Rgb(131, 165, 152),
            selection: Color::Rgb(102, 92, 84),

            map: MapColors {
                empty: Color::Rgb(102, 92, 84),
                metadata: Color::Rgb(142, 192, 124),
                contiguous: Color::Rgb(131, 165, 152),
                fragmented: Color::Rgb(251, 73, 52),
                unmovable: Color::Rgb(254, 128, 25),
                unknown: Color::Rgb(146, 131, 116),
            },
        };

        Self::from_colors("Gruvbox", colors)
    }

    fn from_colors(name: &str, colors: ThemeColors) -> Self {
        let styles = ThemeStyles {
            header: Style::default()
                .bg(colors.bg_secondary)
                .fg(colors.fg_primary),
            footer: Style::default().bg(colors.bg_secondary).fg(colors.fg_muted),
            panel_title: Style::default()
                .fg(colors.accent_primary)
                .add_modifier(Modifier::BOLD),
            panel_border: Style::default().fg(colors.border),
            panel_border_focused: Style::default().fg(colors.border_focused),
            list_item: Style::default().fg(colors.fg_primary),
            list_item_selected: Style::default()
                .fg(colors.fg_primary)
                .bg(colors.selection)
                .add_modifier(Modifier::BOLD),
            list_item_disabled: Style::default().fg(colors.fg_muted),
            status_running: Style::default().fg(colors.info),
            status_failed: Style::default().fg(colors.error),
            status_warning: Style::default().fg(colors.warning),
            gauge: Style::default().fg(colors.accent_primary).bg(colors.bg_tertiary),
            keybind: Style::default().fg(colors.fg_muted),
            keybind_key: Style::default()
                .fg(colors.accent_secondary)
                .add_modifier(Modifier::BOLD),
            notification_info: Style::default().fg(colors.info),
            notification_success: Style::default().fg(colors.success),
            notification_error: Style::default().fg(colors.error),
        };

        Self {
            name: name.to_string(),
            colors,
            styles,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::tokyo_night()
    }
}
