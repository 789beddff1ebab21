//! Application state shared between the event loop and the renderer

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::fragmentation::{FragmentationReport, OccupancyGrid};
use crate::integrations::devices::BlockDevice;
use crate::tasks::{TaskKind, TaskState};
use crate::ui::theme::Theme;

/// Top-level application mode
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AppMode {
    /// Normal dashboard view
    #[default]
    Dashboard,
    /// Help overlay showing
    Help,
    /// Confirmation dialog
    Confirm {
        message: String,
        action: PendingAction,
    },
}

/// What a confirmation dialog will do when accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Defragment { device: String },
    /// Cancel running tasks, then quit
    Quit,
}

/// Device list state
#[derive(Debug, Clone, Default)]
pub struct DevicePanelState {
    pub devices: Vec<BlockDevice>,
    pub selected_index: usize,
    pub loading: bool,
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
    pub error: Option<String>,
}

impl DevicePanelState {
    pub fn selected(&self) -> Option<&BlockDevice> {
        self.devices.get(self.selected_index)
    }

    pub fn select_prev(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        if self.selected_index + 1 < self.devices.len() {
            self.selected_index += 1;
        }
    }

    /// Swap in a fresh listing, keeping the selection on the same device path
    pub fn replace(&mut self, devices: Vec<BlockDevice>) {
        let previous = self.selected().map(|d| d.path.clone());
        self.devices = devices;
        self.selected_index = previous
            .and_then(|path| self.devices.iter().position(|d| d.path == path))
            .or_else(|| self.devices.iter().position(|d| d.check_eligible().is_ok()))
            .unwrap_or(0);
        self.loading = false;
        self.error = None;
        self.last_updated = Some(chrono::Utc::now());
    }
}

/// Snapshot of one task kind for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub kind: TaskKind,
    pub state: TaskState,
    pub device: Option<String>,
    pub elapsed_secs: u64,
}

impl TaskStatus {
    pub fn idle(kind: TaskKind) -> Self {
        Self {
            kind,
            state: TaskState::Idle,
            device: None,
            elapsed_secs: 0,
        }
    }
}

/// Report and progress for the selected device
#[derive(Debug, Clone)]
pub struct TaskPanelState {
    pub statuses: [TaskStatus; 2],
    /// Held report for the selected device, if any
    pub report: Option<FragmentationReport>,
    pub defrag_progress: Option<u8>,
}

impl Default for TaskPanelState {
    fn default() -> Self {
        Self {
            statuses: TaskKind::ALL.map(TaskStatus::idle),
            report: None,
            defrag_progress: None,
        }
    }
}

impl TaskPanelState {
    pub fn status(&self, kind: TaskKind) -> &TaskStatus {
        match kind {
            TaskKind::Analyze => &self.statuses[0],
            TaskKind::Defragment => &self.statuses[1],
        }
    }

    pub fn any_running(&self) -> bool {
        self.statuses.iter().any(|s| s.state == TaskState::Running)
    }
}

/// Disk map state
#[derive(Debug, Clone)]
pub struct MapPanelState {
    pub grid: OccupancyGrid,
    pub cell_edge: u32,
}

impl Default for MapPanelState {
    fn default() -> Self {
        Self {
            grid: OccupancyGrid::empty(),
            cell_edge: 2,
        }
    }
}

/// Output panel state
#[derive(Debug, Clone)]
pub struct OutputPanelState {
    pub lines: VecDeque<OutputLine>,
    pub max_lines: usize,
}

impl Default for OutputPanelState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct OutputLine {
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub stream: OutputStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
    System,
}

impl OutputPanelState {
    pub fn new() -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: 1000,
        }
    }

    pub fn push(&mut self, content: String, stream: OutputStream) {
        self.lines.push_back(OutputLine {
            content,
            timestamp: chrono::Utc::now(),
            stream,
        });
        if self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    /// Push every non-blank line of a captured stream
    pub fn push_block(&mut self, block: &str, stream: OutputStream) {
        for line in block.lines().filter(|l| !l.trim().is_empty()) {
            self.push(line.trim_end().to_string(), stream);
        }
    }
}

/// Notification
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Granular view state for all panels
#[derive(Debug, Clone, Default)]
pub struct PanelStates {
    pub devices: DevicePanelState,
    pub tasks: TaskPanelState,
    pub map: MapPanelState,
    pub output: OutputPanelState,
}

/// Main application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub mode: AppMode,
    pub panels: PanelStates,
    pub theme: Theme,
    pub notifications: Vec<Notification>,
    /// Commands run through a privilege helper
    pub elevated_via: Option<String>,
}

impl AppState {
    pub fn new(theme: Theme) -> Self {
        Self {
            mode: AppMode::Dashboard,
            panels: PanelStates::default(),
            theme,
            notifications: Vec::new(),
            elevated_via: None,
        }
    }

    pub fn add_notification(&mut self, message: String, level: NotificationLevel) {
        let notification = Notification {
            message,
            level,
            created_at: chrono::Utc::now(),
            duration_ms: 5000,
        };
        self.notifications.push(notification);
    }

    pub fn remove_expired_notifications(&mut self) {
        let now = chrono::Utc::now();
        self.notifications.retain(|n| {
            let elapsed = now.signed_duration_since(n.created_at).num_milliseconds().max(0) as u64;
            elapsed < n.duration_ms
        });
    }

    pub fn selected_device(&self) -> Option<&BlockDevice> {
        self.panels.devices.selected()
    }
}

/// Thread-safe state store
#[derive(Clone)]
pub struct StateStore {
    state: Arc<RwLock<AppState>>,
}

impl StateStore {
    pub fn new(initial: AppState) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
        }
    }

    /// Atomic state mutation
    pub fn update<F, R>(&self, mutator: F) -> R
    where
        F: FnOnce(&mut AppState) -> R,
    {
        let mut state = self.state.write();
        mutator(&mut state)
    }

    /// Read current state
    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, AppState> {
        self.state.read()
    }

    /// Get a clone of the current state
    pub fn snapshot(&self) -> AppState {
        self.state.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn device(name: &str, fs: Option<&str>) -> BlockDevice {
        BlockDevice {
            name: name.into(),
            path: format!("/dev/{}", name),
            device_type: "part".into(),
            size: 0,
            fs_type: fs.map(String::from),
            mountpoint: None,
            rotational: Some(true),
        }
    }

    #[test]
    fn refresh_keeps_selected_device() {
        let mut panel = DevicePanelState::default();
        panel.replace(vec![device("sda1", Some("ext4")), device("sdb1", Some("ext4"))]);
        panel.select_next();
        assert_eq!(panel.selected().map(|d| d.name.as_str()), Some("sdb1"));

        panel.replace(vec![
            device("sda1", Some("ext4")),
            device("sda2", None),
            device("sdb1", Some("ext4")),
        ]);
        assert_eq!(panel.selected_index, 2);
    }

    #[test]
    fn first_listing_prefers_an_eligible_device() {
        let mut panel = DevicePanelState::default();
        panel.replace(vec![device("sda", None), device("sda1", Some("vfat")), device("sda2", Some("ext4"))]);
        assert_eq!(panel.selected().map(|d| d.name.as_str()), Some("sda2"));
    }

    #[test]
    fn selection_stays_in_bounds() {
        let mut panel = DevicePanelState::default();
        panel.select_next();
        panel.select_prev();
        assert_eq!(panel.selected_index, 0);
        assert!(panel.selected().is_none());
    }

    #[test]
    fn output_is_bounded() {
        let mut output = OutputPanelState::new();
        output.max_lines = 3;
        output.push_block("one\n\ntwo\nthree\nfour\n", OutputStream::Stdout);
        let lines: Vec<&str> = output.lines.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(lines, vec!["two", "three", "four"]);
    }

    #[test]
    fn expired_notifications_are_dropped() {
        let mut state = AppState::new(Theme::default());
        state.add_notification("kept".into(), NotificationLevel::Info);
        state.add_notification("gone".into(), NotificationLevel::Info);
        state.notifications[1].duration_ms = 0;

        state.remove_expired_notifications();
        assert_eq!(state.notifications.len(), 1);
        assert_eq!(state.notifications[0].message, "kept");
    }
}
