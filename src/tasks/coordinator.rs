//! Foreground owner of the background tasks and the reports they produce

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::operation::{spawn, PrivilegedOperation, ProgressRamp, TaskHandle};
use super::{TaskEvent, TaskEventKind, TaskId, TaskKind, TaskOutcome, TaskState};
use crate::config::{DefragConfig, ToolsConfig};
use crate::error::FragError;
use crate::fragmentation::FragmentationReport;
use crate::integrations::devices::BlockDevice;
use crate::integrations::runner::{CommandRunner, Elevation};

/// What changed after the coordinator consumed a task event
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorUpdate {
    Started {
        kind: TaskKind,
        device: String,
    },
    Progress {
        kind: TaskKind,
        device: String,
        percent: u8,
    },
    Completed {
        kind: TaskKind,
        device: String,
        report: FragmentationReport,
        /// Set when the task succeeded but its output could not be read
        warning: Option<FragError>,
    },
    Failed {
        kind: TaskKind,
        device: String,
        error: FragError,
    },
}

struct ActiveTask {
    handle: TaskHandle,
    /// Report held for the device before the task replaced it with a pending one
    previous: Option<FragmentationReport>,
}

/// Runs at most one task per kind and keeps the per-device reports.
///
/// All state here is touched only from the foreground, either by a user
/// action or while draining the task event channel.
pub struct TaskCoordinator {
    runner: Arc<dyn CommandRunner>,
    elevation: Elevation,
    analyze: PrivilegedOperation,
    defragment: PrivilegedOperation,
    events_tx: mpsc::UnboundedSender<TaskEvent>,
    active: HashMap<TaskKind, ActiveTask>,
    reports: HashMap<String, FragmentationReport>,
    last_state: HashMap<TaskKind, TaskState>,
    progress: Option<u8>,
}

impl TaskCoordinator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        elevation: Elevation,
        tools: &ToolsConfig,
        defrag: &DefragConfig,
        events_tx: mpsc::UnboundedSender<TaskEvent>,
    ) -> Self {
        Self {
            runner,
            elevation,
            analyze: PrivilegedOperation::analyze(tools),
            defragment: PrivilegedOperation::defragment(tools, ProgressRamp::from_config(defrag)),
            events_tx,
            active: HashMap::new(),
            reports: HashMap::new(),
            last_state: HashMap::new(),
            progress: None,
        }
    }

    pub fn can_start(&self, kind: TaskKind) -> bool {
        !self.active.contains_key(&kind)
    }

    pub fn is_busy(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn active_kinds(&self) -> Vec<TaskKind> {
        TaskKind::ALL
            .into_iter()
            .filter(|kind| self.active.contains_key(kind))
            .collect()
    }

    pub fn active_device(&self, kind: TaskKind) -> Option<&str> {
        self.active.get(&kind).map(|task| task.handle.device())
    }

    pub fn elapsed(&self, kind: TaskKind) -> Option<std::time::Duration> {
        self.active.get(&kind).map(|task| task.handle.elapsed())
    }

    pub fn state(&self, kind: TaskKind) -> TaskState {
        if self.active.contains_key(&kind) {
            return TaskState::Running;
        }
        self.last_state.get(&kind).copied().unwrap_or_default()
    }

    /// Latest synthetic defragmentation percentage, while one is running
    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    pub fn report(&self, device: &str) -> Option<&FragmentationReport> {
        self.reports.get(device)
    }

    /// Whether a task of `kind` could start on `device` right now.
    ///
    /// A device holds at most one task of any kind, so every running task
    /// saves the device's last real report and never another task's
    /// pending placeholder.
    pub fn check_start(&self, kind: TaskKind, device: &BlockDevice) -> Result<(), FragError> {
        if !self.can_start(kind) {
            tracing::info!(%kind, device = %device.path, "rejected: already in progress");
            return Err(FragError::OperationAlreadyInProgress(kind));
        }
        if let Some(other) = self.kind_on_device(&device.path) {
            tracing::info!(%kind, %other, device = %device.path, "rejected: device busy");
            return Err(FragError::OperationAlreadyInProgress(other));
        }
        if let Err(err) = device.check_eligible() {
            tracing::info!(%kind, device = %device.path, error = %err, "rejected: ineligible device");
            return Err(err);
        }
        Ok(())
    }

    fn kind_on_device(&self, path: &str) -> Option<TaskKind> {
        TaskKind::ALL.into_iter().find(|kind| {
            self.active
                .get(kind)
                .is_some_and(|task| task.handle.device() == path)
        })
    }

    /// Start a task of `kind` against `device`.
    ///
    /// Fails without launching anything if the kind is already in flight,
    /// the device is busy with the other kind, or the device is not a
    /// rotational EXT4 filesystem.
    pub fn start(&mut self, kind: TaskKind, device: &BlockDevice) -> Result<TaskId, FragError> {
        self.check_start(kind, device)?;

        let operation = match kind {
            TaskKind::Analyze => &self.analyze,
            TaskKind::Defragment => &self.defragment,
        };
        let handle = spawn(
            operation,
            &device.path,
            &self.elevation,
            Arc::clone(&self.runner),
            self.events_tx.clone(),
        );
        let id = handle.id();

        let previous = self
            .reports
            .insert(device.path.clone(), FragmentationReport::pending());
        if kind == TaskKind::Defragment {
            self.progress = None;
        }
        self.active.insert(kind, ActiveTask { handle, previous });
        Ok(id)
    }

    /// Apply one event from a background task.
    ///
    /// Returns `None` for events that belong to a task this coordinator no
    /// longer tracks (cancelled or superseded).
    pub fn handle_event(&mut self, event: TaskEvent) -> Option<CoordinatorUpdate> {
        let tracked = self.active.get(&event.kind)?;
        if tracked.handle.id() != event.id {
            tracing::trace!(task = %event.id, kind = %event.kind, "ignoring stale task event");
            return None;
        }
        let device = tracked.handle.device().to_string();
        let kind = event.kind;

        match event.payload {
            TaskEventKind::Started => Some(CoordinatorUpdate::Started { kind, device }),
            TaskEventKind::Progress(percent) => {
                if kind == TaskKind::Defragment {
                    self.progress = Some(percent);
                }
                Some(CoordinatorUpdate::Progress {
                    kind,
                    device,
                    percent,
                })
            }
            TaskEventKind::Completed(outcome) => {
                self.finish(kind, TaskState::Completed);
                let (report, warning) = match outcome {
                    TaskOutcome::Report(report) => {
                        let warning = report.is_pending().then_some(FragError::MalformedOutput);
                        if warning.is_some() {
                            tracing::warn!(%device, "analyzer output had no fragmentation score");
                        }
                        (report, warning)
                    }
                    TaskOutcome::Finished { output } => {
                        tracing::debug!(%device, bytes = output.len(), "defragmenter finished");
                        let report = FragmentationReport {
                            raw_output: output,
                            ..FragmentationReport::clean()
                        };
                        (report, None)
                    }
                };
                self.reports.insert(device.clone(), report.clone());
                Some(CoordinatorUpdate::Completed {
                    kind,
                    device,
                    report,
                    warning,
                })
            }
            TaskEventKind::Failed(error) => {
                if let Some(task) = self.finish(kind, TaskState::Failed) {
                    self.restore(&device, task.previous);
                }
                Some(CoordinatorUpdate::Failed {
                    kind,
                    device,
                    error,
                })
            }
        }
    }

    /// Stop waiting for the task of `kind`, if any.
    ///
    /// The external process is not killed and may keep running.
    pub fn cancel(&mut self, kind: TaskKind) -> bool {
        let Some(task) = self.finish(kind, TaskState::Cancelled) else {
            return false;
        };
        let device = task.handle.device().to_string();
        task.handle.cancel();
        self.restore(&device, task.previous);
        true
    }

    pub fn cancel_all(&mut self) -> usize {
        TaskKind::ALL
            .into_iter()
            .filter(|&kind| self.cancel(kind))
            .count()
    }

    fn finish(&mut self, kind: TaskKind, state: TaskState) -> Option<ActiveTask> {
        let task = self.active.remove(&kind)?;
        self.last_state.insert(kind, state);
        if kind == TaskKind::Defragment {
            self.progress = None;
        }
        Some(task)
    }

    fn restore(&mut self, device: &str, previous: Option<FragmentationReport>) {
        match previous {
            Some(report) => {
                self.reports.insert(device.to_string(), report);
            }
            None => {
                self.reports.remove(device);
            }
        }
    }
}
