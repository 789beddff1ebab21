//! Fragmentation report, map legend and defragmentation progress

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Widget},
};

use crate::core::state::AppState;
use crate::fragmentation::{CellCategory, FragmentationReport, Score};
use crate::tasks::{TaskKind, TaskState};
use crate::ui::theme::Theme;

pub struct ReportPanel<'a> {
    state: &'a AppState,
    theme: &'a Theme,
}

impl<'a> ReportPanel<'a> {
    pub fn new(state: &'a AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    fn score_style(&self, score: Score) -> Style {
        let color = match score {
            Score::Unknown => self.theme.colors.fg_muted,
            Score::Value(0..=30) => self.theme.colors.success,
            Score::Value(31..=55) => self.theme.colors.warning,
            Score::Value(_) => self.theme.colors.error,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    fn report_lines(&self, report: Option<&FragmentationReport>) -> Vec<Line<'static>> {
        let label = Style::default().fg(self.theme.colors.fg_secondary);
        let value = Style::default().fg(self.theme.colors.fg_primary);

        let Some(report) = report else {
            return vec![Line::from(Span::styled(
                "Not analyzed yet. Press [a] to analyze.",
                Style::default().fg(self.theme.colors.fg_muted),
            ))];
        };

        if report.is_pending() && self.state.panels.tasks.any_running() {
            return vec![Line::from(Span::styled(
                "Working…",
                self.theme.styles.status_running,
            ))];
        }

        let ratio = report
            .fragmented_ratio
            .map(|r| format!("{:.1}%", r * 100.0))
            .unwrap_or_else(|| "-".to_string());

        vec![
            Line::from(vec![
                Span::styled("Score      ", label),
                Span::styled(report.score.to_string(), self.score_style(report.score)),
                Span::styled(format!("  {}", report.score.band()), label),
            ]),
            Line::from(vec![
                Span::styled("Files      ", label),
                Span::styled(
                    format!("{} ({} fragmented)", report.total_files, report.fragmented_files),
                    value,
                ),
            ]),
            Line::from(vec![
                Span::styled("Map ratio  ", label),
                Span::styled(ratio, value),
            ]),
        ]
    }

    fn legend_lines(&self) -> Vec<Line<'static>> {
        CellCategory::ALL
            .chunks(3)
            .map(|row| {
                let spans: Vec<Span<'static>> = row
                    .iter()
                    .flat_map(|&category| {
                        [
                            Span::styled(
                                "██",
                                Style::default().fg(self.theme.cell_color(category)),
                            ),
                            Span::styled(
                                format!(" {:<11}", category.label()),
                                self.theme.styles.keybind,
                            ),
                        ]
                    })
                    .collect();
                Line::from(spans)
            })
            .collect()
    }
}

impl<'a> Widget for ReportPanel<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(Span::styled(" REPORT ", self.theme.styles.panel_title))
            .borders(Borders::ALL)
            .border_style(self.theme.styles.panel_border)
            .style(Style::default().bg(self.theme.colors.bg_primary));

        let inner = block.inner(area);
        block.render(area, buf);
        if inner.height == 0 {
            return;
        }

        let tasks = &self.state.panels.tasks;
        let mut lines = self.report_lines(tasks.report.as_ref());
        lines.push(Line::default());
        lines.extend(self.legend_lines());

        let mut y = inner.y;
        let bottom = inner.y + inner.height;
        for line in &lines {
            if y >= bottom {
                break;
            }
            buf.set_line(inner.x + 1, y, line, inner.width.saturating_sub(2));
            y += 1;
        }

        let defrag = tasks.status(TaskKind::Defragment);
        if defrag.state == TaskState::Running && y + 1 < bottom {
            let percent = tasks.defrag_progress.unwrap_or(0);
            let device = defrag.device.as_deref().unwrap_or("");
            let gauge = Gauge::default()
                .gauge_style(self.theme.styles.gauge)
                .percent(u16::from(percent.min(100)))
                .label(format!("Defragmenting {} {}%", device, percent));
            let gauge_area = Rect {
                x: inner.x + 1,
                y: bottom - 1,
                width: inner.width.saturating_sub(2),
                height: 1,
            };
            gauge.render(gauge_area, buf);
        }
    }
}
