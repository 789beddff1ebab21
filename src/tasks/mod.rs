//! Background tasks that drive the external analyzer and defragmenter.
//!
//! Every task runs on its own tokio task and reports through an unbounded
//! channel. Events from one task arrive in the order they were sent, with
//! progress always ahead of the terminal event. The foreground owns all
//! bookkeeping in [`TaskCoordinator`] and mutates it only while draining
//! that channel.

pub mod coordinator;
pub mod headless;
pub mod operation;

pub use coordinator::{CoordinatorUpdate, TaskCoordinator};

use crate::error::FragError;
use crate::fragmentation::FragmentationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Analyze,
    Defragment,
}

impl TaskKind {
    pub const ALL: [TaskKind; 2] = [TaskKind::Analyze, TaskKind::Defragment];

    pub fn label(self) -> &'static str {
        match self {
            Self::Analyze => "Analyze",
            Self::Defragment => "Defragment",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analyze => write!(f, "analysis"),
            Self::Defragment => write!(f, "defragmentation"),
        }
    }
}

/// Identifies one task instance; never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(uuid::Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a task instance: `Idle -> Running -> terminal`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What a successful task produced
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Report(FragmentationReport),
    Finished { output: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEventKind {
    Started,
    /// Synthetic percentage, always below 100
    Progress(u8),
    Completed(TaskOutcome),
    Failed(FragError),
}

impl TaskEventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

/// Message sent from a background task to the foreground
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEvent {
    pub id: TaskId,
    pub kind: TaskKind,
    pub payload: TaskEventKind,
}
