//! Main application orchestrator

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::Stdout;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::core::events::{Event, EventHandler, EventResult, KeyBindings};
use crate::core::state::{
    AppMode, AppState, NotificationLevel, OutputStream, PendingAction, StateStore, TaskStatus,
};
use crate::error::FragError;
use crate::fragmentation::{FragmentationReport, MapSynthesizer, OccupancyGrid};
use crate::integrations::devices::{list_devices, BlockDevice};
use crate::integrations::runner::{Elevation, SystemRunner};
use crate::tasks::{CoordinatorUpdate, TaskCoordinator, TaskEvent, TaskKind};
use crate::ui::layout::LayoutManager;
use crate::ui::renderer::Renderer;
use crate::ui::theme::Theme;

/// Inputs the disk map was last drawn from
#[derive(Debug, Clone, PartialEq)]
struct MapKey {
    device: Option<String>,
    report: Option<FragmentationReport>,
    surface: (u32, u32),
}

/// Regenerates the occupancy grid whenever its inputs change
pub struct MapView {
    synthesizer: MapSynthesizer,
    key: Option<MapKey>,
}

impl MapView {
    pub fn new(synthesizer: MapSynthesizer) -> Self {
        Self {
            synthesizer,
            key: None,
        }
    }

    pub fn cell_edge(&self) -> u32 {
        self.synthesizer.cell_edge()
    }

    /// New grid if the device, report or surface differ from the last call
    pub fn refresh(
        &mut self,
        device: Option<&str>,
        report: Option<&FragmentationReport>,
        surface: (u32, u32),
    ) -> Option<OccupancyGrid> {
        let next = MapKey {
            device: device.map(String::from),
            report: report.cloned(),
            surface,
        };
        if self.key.as_ref() == Some(&next) {
            return None;
        }

        let grid = self.synthesizer.grid_for(report, surface.0, surface.1);
        tracing::trace!(rows = grid.rows(), cols = grid.cols(), "regenerated disk map");
        self.key = Some(next);
        Some(grid)
    }
}

pub struct App {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    state: StateStore,
    coordinator: TaskCoordinator,
    map: MapView,
    task_rx: Option<mpsc::UnboundedReceiver<TaskEvent>>,
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let backend = CrosstermBackend::new(std::io::stdout());
        let terminal = Terminal::new(backend)?;

        let theme = Theme::from_name(&config.display.theme);
        let elevation = Elevation::detect(&config.tools.elevate);

        let mut initial_state = AppState::new(theme);
        initial_state.elevated_via = elevation.helper().map(String::from);

        let map = MapView::new(MapSynthesizer::new(config.map.seed, config.display.cell_edge));
        initial_state.panels.map.cell_edge = map.cell_edge();
        let state = StateStore::new(initial_state);

        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let coordinator = TaskCoordinator::new(
            Arc::new(SystemRunner),
            elevation,
            &config.tools,
            &config.defrag,
            task_tx,
        );

        Ok(Self {
            terminal,
            state,
            coordinator,
            map,
            task_rx: Some(task_rx),
            config,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        self.setup_terminal()?;

        let (mut event_handler, event_tx) = EventHandler::new();
        EventHandler::spawn_sources(event_tx.clone());
        if let Some(task_rx) = self.task_rx.take() {
            EventHandler::forward_tasks(task_rx, event_tx);
        }

        self.render()?;
        self.refresh_devices().await;
        self.render()?;

        let result = self.event_loop(&mut event_handler).await;

        if self.coordinator.is_busy() {
            let cancelled = self.coordinator.cancel_all();
            tracing::warn!(cancelled, "quitting with tasks still running");
        }

        self.shutdown()?;
        result
    }

    fn setup_terminal(&mut self) -> Result<()> {
        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::EnterAlternateScreen,
            crossterm::cursor::Hide,
        )?;
        self.terminal.clear()?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        crossterm::terminal::disable_raw_mode()?;
        crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::cursor::Show,
        )?;
        Ok(())
    }

    async fn event_loop(&mut self, event_handler: &mut EventHandler) -> Result<()> {
        loop {
            let Some(event) = event_handler.next().await else {
                break;
            };

            match self.handle_event(event).await? {
                EventResult::Continue => {}
                EventResult::Quit => break,
            }
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: Event) -> Result<EventResult> {
        match event {
            Event::Key(key) => {
                let result = self.handle_key(key).await;
                self.render()?;
                Ok(result)
            }
            Event::Resize(w, h) => {
                tracing::trace!(w, h, "terminal resized");
                self.render()?;
                Ok(EventResult::Continue)
            }
            Event::Tick => {
                self.state.update(|s| s.remove_expired_notifications());
                self.sync_tasks();
                self.render()?;
                Ok(EventResult::Continue)
            }
            Event::Task(task_event) => {
                self.on_task_event(task_event);
                Ok(EventResult::Continue)
            }
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) -> EventResult {
        let mode = self.state.read().mode.clone();

        match mode {
            AppMode::Dashboard => self.handle_dashboard_key(key).await,
            AppMode::Help => {
                if KeyBindings::escape().matches(&key)
                    || KeyBindings::help().matches(&key)
                    || KeyBindings::quit().matches(&key)
                {
                    self.set_mode(AppMode::Dashboard);
                }
                EventResult::Continue
            }
            AppMode::Confirm { action, .. } => self.handle_confirm_key(key, action),
        }
    }

    async fn handle_dashboard_key(&mut self, key: KeyEvent) -> EventResult {
        if KeyBindings::quit().matches(&key) || KeyBindings::quit_alt().matches(&key) {
            return self.request_quit();
        }

        if KeyBindings::help().matches(&key) {
            self.set_mode(AppMode::Help);
        } else if KeyBindings::up().matches(&key) || KeyBindings::vim_up().matches(&key) {
            self.state.update(|s| s.panels.devices.select_prev());
            self.sync_tasks();
        } else if KeyBindings::down().matches(&key) || KeyBindings::vim_down().matches(&key) {
            self.state.update(|s| s.panels.devices.select_next());
            self.sync_tasks();
        } else if KeyBindings::analyze().matches(&key) {
            if let Some(device) = self.selected_device() {
                self.start_task(TaskKind::Analyze, &device);
            } else {
                self.notify("No device selected".into(), NotificationLevel::Warning);
            }
        } else if KeyBindings::defragment().matches(&key) {
            self.request_defrag();
        } else if KeyBindings::cancel().matches(&key) {
            self.cancel_tasks();
        } else if KeyBindings::refresh().matches(&key) {
            self.refresh_devices().await;
        }

        EventResult::Continue
    }

    fn handle_confirm_key(&mut self, key: KeyEvent, action: PendingAction) -> EventResult {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                self.set_mode(AppMode::Dashboard);
                match action {
                    PendingAction::Defragment { device } => {
                        let target = self
                            .state
                            .read()
                            .panels
                            .devices
                            .devices
                            .iter()
                            .find(|d| d.path == device)
                            .cloned();
                        match target {
                            Some(target) => self.start_task(TaskKind::Defragment, &target),
                            None => self.notify(
                                format!("{} is no longer listed", device),
                                NotificationLevel::Error,
                            ),
                        }
                    }
                    PendingAction::Quit => {
                        self.cancel_tasks();
                        return EventResult::Quit;
                    }
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.set_mode(AppMode::Dashboard);
            }
            _ => {}
        }
        EventResult::Continue
    }

    fn request_quit(&mut self) -> EventResult {
        let running = self.coordinator.active_kinds();
        if running.is_empty() {
            return EventResult::Quit;
        }

        let names: Vec<String> = running.iter().map(|k| k.to_string()).collect();
        self.set_mode(AppMode::Confirm {
            message: format!(
                "{} still running. Cancel and quit? The external process may keep running in the background.",
                names.join(" and ")
            ),
            action: PendingAction::Quit,
        });
        EventResult::Continue
    }

    fn request_defrag(&mut self) {
        let Some(device) = self.selected_device() else {
            self.notify("No device selected".into(), NotificationLevel::Warning);
            return;
        };

        // Reject early so the dialog only appears for work that can start
        if let Err(err) = self.coordinator.check_start(TaskKind::Defragment, &device) {
            self.report_error(&err);
            return;
        }

        let mounted = device
            .mountpoint
            .as_deref()
            .map(|m| format!(" (mounted at {})", m))
            .unwrap_or_default();
        self.set_mode(AppMode::Confirm {
            message: format!(
                "Defragment {}{}? e4defrag rewrites fragmented files in place and may take a long time.",
                device.path, mounted
            ),
            action: PendingAction::Defragment {
                device: device.path.clone(),
            },
        });
    }

    fn start_task(&mut self, kind: TaskKind, device: &BlockDevice) {
        match self.coordinator.start(kind, device) {
            Ok(_) => {
                self.state.update(|s| {
                    s.panels.output.push(
                        format!("Starting {} of {}", kind, device.path),
                        OutputStream::System,
                    );
                });
                self.sync_tasks();
            }
            Err(err) => self.report_error(&err),
        }
    }

    fn cancel_tasks(&mut self) {
        let cancelled = self.coordinator.cancel_all();
        if cancelled == 0 {
            self.notify("Nothing to cancel".into(), NotificationLevel::Info);
            return;
        }
        self.state.update(|s| {
            s.panels.output.push(
                format!(
                    "Cancelled {} task(s); the external process may still be running",
                    cancelled
                ),
                OutputStream::System,
            );
        });
        self.notify("Cancelled".into(), NotificationLevel::Warning);
        self.sync_tasks();
    }

    fn on_task_event(&mut self, event: TaskEvent) {
        let Some(update) = self.coordinator.handle_event(event) else {
            return;
        };

        match update {
            CoordinatorUpdate::Started { kind, device } => {
                tracing::debug!(%kind, %device, "task reported start");
            }
            CoordinatorUpdate::Progress { .. } => {}
            CoordinatorUpdate::Completed {
                kind,
                device,
                report,
                warning,
            } => {
                let summary = match kind {
                    TaskKind::Analyze => format!(
                        "Analysis of {}: score {} ({})",
                        device,
                        report.score,
                        report.score.band()
                    ),
                    TaskKind::Defragment => format!("Defragmentation of {} finished", device),
                };
                self.state.update(|s| {
                    s.panels.output.push_block(&report.raw_output, OutputStream::Stdout);
                    s.panels.output.push(summary.clone(), OutputStream::System);
                    s.add_notification(summary, NotificationLevel::Success);
                    if let Some(warning) = &warning {
                        s.add_notification(warning.to_string(), NotificationLevel::Warning);
                    }
                });
            }
            CoordinatorUpdate::Failed {
                kind,
                device,
                error,
            } => {
                let message = format!("{} of {} failed: {}", kind, device, error);
                self.state.update(|s| {
                    s.panels.output.push(message.clone(), OutputStream::Stderr);
                    s.add_notification(message, NotificationLevel::Error);
                });
            }
        }

        self.sync_tasks();
    }

    /// Copy coordinator bookkeeping into the render state
    fn sync_tasks(&mut self) {
        let selected = self.state.read().selected_device().map(|d| d.path.clone());
        let coordinator = &self.coordinator;

        let statuses = TaskKind::ALL.map(|kind| TaskStatus {
            kind,
            state: coordinator.state(kind),
            device: coordinator.active_device(kind).map(String::from),
            elapsed_secs: coordinator.elapsed(kind).map(|d| d.as_secs()).unwrap_or(0),
        });
        let report = selected
            .as_deref()
            .and_then(|path| coordinator.report(path))
            .cloned();
        let progress = coordinator.progress();

        self.state.update(|s| {
            s.panels.tasks.statuses = statuses;
            s.panels.tasks.report = report;
            s.panels.tasks.defrag_progress = progress;
        });
    }

    async fn refresh_devices(&mut self) {
        self.state.update(|s| s.panels.devices.loading = true);

        match list_devices(&self.config.tools.lister).await {
            Ok(devices) => {
                let count = devices.len();
                self.state.update(|s| {
                    s.panels.devices.replace(devices);
                    s.panels
                        .output
                        .push(format!("Found {} block devices", count), OutputStream::System);
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "device enumeration failed");
                let message = format!("{:#}", e);
                self.state.update(|s| {
                    s.panels.devices.loading = false;
                    s.panels.devices.error = Some(message.clone());
                    s.add_notification(message, NotificationLevel::Error);
                });
            }
        }
        self.sync_tasks();
    }

    fn selected_device(&self) -> Option<BlockDevice> {
        self.state.read().selected_device().cloned()
    }

    fn set_mode(&mut self, mode: AppMode) {
        self.state.update(|s| s.mode = mode);
    }

    fn notify(&mut self, message: String, level: NotificationLevel) {
        self.state.update(|s| s.add_notification(message, level));
    }

    fn report_error(&mut self, err: &FragError) {
        let level = match err {
            FragError::UnsupportedDevice(_) | FragError::OperationAlreadyInProgress(_) => {
                NotificationLevel::Warning
            }
            _ => NotificationLevel::Error,
        };
        let message = err.to_string();
        self.state.update(|s| {
            s.panels.output.push(message.clone(), OutputStream::System);
            s.add_notification(message, level);
        });
    }

    fn render(&mut self) -> Result<()> {
        let Self {
            terminal,
            state,
            map,
            ..
        } = self;

        terminal.draw(|frame| {
            let layout = LayoutManager::compute(frame.area());

            let (device, report) = {
                let s = state.read();
                (
                    s.selected_device().map(|d| d.path.clone()),
                    s.panels.tasks.report.clone(),
                )
            };
            if let Some(grid) = map.refresh(device.as_deref(), report.as_ref(), layout.map_surface()) {
                state.update(|s| s.panels.map.grid = grid);
            }

            let snapshot = state.snapshot();
            Renderer::render(frame, &snapshot, &layout);
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragmentation::CellCategory;

    fn analyzed(score: u8) -> FragmentationReport {
        FragmentationReport {
            score: crate::fragmentation::Score::Value(score),
            total_files: 10,
            fragmented_files: 5,
            fragmented_ratio: Some(0.2),
            raw_output: String::new(),
        }
    }

    #[test]
    fn map_regenerates_only_when_inputs_change() {
        let mut view = MapView::new(MapSynthesizer::new(Some(3), 2));
        let report = analyzed(40);

        let first = view.refresh(Some("/dev/sdb1"), Some(&report), (40, 20));
        assert!(first.is_some());
        assert!(view.refresh(Some("/dev/sdb1"), Some(&report), (40, 20)).is_none());

        // Resize
        let resized = view.refresh(Some("/dev/sdb1"), Some(&report), (60, 20)).expect("resize");
        assert_eq!(resized.cols(), 30);

        // Different device, no report
        let other = view.refresh(Some("/dev/sdc1"), None, (60, 20)).expect("device change");
        assert_eq!(other.count(CellCategory::Empty), other.len());

        // Report changes to busy
        let busy = FragmentationReport::pending();
        let grid = view.refresh(Some("/dev/sdc1"), Some(&busy), (60, 20)).expect("busy");
        assert_eq!(grid.count(CellCategory::Unknown), grid.len());
    }

    #[test]
    fn cell_edge_is_never_zero() {
        let view = MapView::new(MapSynthesizer::new(None, 0));
        assert_eq!(view.cell_edge(), 1);
    }
}
