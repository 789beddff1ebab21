//! One privileged external operation and the task that runs it

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};

use super::{TaskEvent, TaskEventKind, TaskId, TaskKind, TaskOutcome};
use crate::config::{DefragConfig, ToolsConfig};
use crate::fragmentation::parse_report;
use crate::integrations::runner::{check_output, CommandOutput, CommandRunner, Elevation, Invocation};

type ArgumentBuilder = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;
type OutputHandler = fn(&CommandOutput) -> TaskOutcome;

/// Fake progress shown while the defragmenter runs.
///
/// e4defrag prints nothing useful until it exits, so the percentage only
/// tells the user the task is alive. It climbs from `initial` by `step`
/// each tick and stops at `ceiling`, which is kept below 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressRamp {
    pub initial: u8,
    pub step: u8,
    pub ceiling: u8,
    pub interval: Duration,
}

impl ProgressRamp {
    pub fn from_config(config: &DefragConfig) -> Self {
        let ceiling = config.progress_ceiling.clamp(1, 99);
        Self {
            initial: config.progress_initial.min(ceiling),
            step: config.progress_step.max(1),
            ceiling,
            interval: config.interval(),
        }
    }

    pub fn advance(&self, current: u8) -> u8 {
        current.saturating_add(self.step).min(self.ceiling)
    }
}

/// An external command run with elevated privileges.
///
/// Analyze and Defragment differ only in program, argument builder, output
/// handler and whether a progress ramp is shown.
#[derive(Clone)]
pub struct PrivilegedOperation {
    kind: TaskKind,
    program: String,
    build_args: ArgumentBuilder,
    handle_output: OutputHandler,
    progress: Option<ProgressRamp>,
}

impl PrivilegedOperation {
    pub fn new(
        kind: TaskKind,
        program: impl Into<String>,
        build_args: impl Fn(&str) -> Vec<String> + Send + Sync + 'static,
        handle_output: OutputHandler,
        progress: Option<ProgressRamp>,
    ) -> Self {
        Self {
            kind,
            program: program.into(),
            build_args: Arc::new(build_args),
            handle_output,
            progress,
        }
    }

    /// Read-only scan: `e4defrag -c <device>`, stdout parsed into a report
    pub fn analyze(tools: &ToolsConfig) -> Self {
        let flag = tools.check_flag.clone();
        Self::new(
            TaskKind::Analyze,
            tools.analyzer.clone(),
            move |device| vec![flag.clone(), device.to_string()],
            |output| TaskOutcome::Report(parse_report(&output.stdout)),
            None,
        )
    }

    /// Mutating run: `e4defrag <device>`, output kept but not parsed
    pub fn defragment(tools: &ToolsConfig, ramp: ProgressRamp) -> Self {
        Self::new(
            TaskKind::Defragment,
            tools.defragmenter.clone(),
            |device| vec![device.to_string()],
            |output| TaskOutcome::Finished {
                output: output.stdout.clone(),
            },
            Some(ramp),
        )
    }

    pub fn invocation(&self, device: &str, elevation: &Elevation) -> Invocation {
        elevation.wrap(&self.program, (self.build_args)(device))
    }
}

impl std::fmt::Debug for PrivilegedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivilegedOperation")
            .field("kind", &self.kind)
            .field("program", &self.program)
            .field("progress", &self.progress)
            .finish()
    }
}

/// Owner-side handle of a running task.
///
/// Holds the cancellation flag and the tokio task, not the child process:
/// the process lives inside [`CommandRunner::run`] and is never reachable
/// from here, so cancelling cannot kill it. Dropping the handle has the
/// same effect as [`TaskHandle::cancel`].
pub struct TaskHandle {
    id: TaskId,
    kind: TaskKind,
    device: String,
    started_at: Instant,
    cancel_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Ask the task to stop. The task goes quiet at once, but the external
    /// process it launched keeps running until it exits on its own.
    pub fn cancel(self) {
        let _ = self.cancel_tx.send(true);
        tracing::info!(
            task = %self.id,
            kind = %self.kind,
            device = %self.device,
            "cancellation requested; external process is left to finish"
        );
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("device", &self.device)
            .field("finished", &self.join.is_finished())
            .finish()
    }
}

/// Start `operation` against `device` on a background tokio task
pub fn spawn(
    operation: &PrivilegedOperation,
    device: &str,
    elevation: &Elevation,
    runner: Arc<dyn CommandRunner>,
    events: mpsc::UnboundedSender<TaskEvent>,
) -> TaskHandle {
    let id = TaskId::new();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let invocation = operation.invocation(device, elevation);

    tracing::info!(
        task = %id,
        kind = %operation.kind,
        command = %invocation.command_line(),
        "starting task"
    );

    let join = tokio::spawn(run(
        id,
        operation.clone(),
        invocation,
        runner,
        events,
        cancel_rx,
    ));

    TaskHandle {
        id,
        kind: operation.kind,
        device: device.to_string(),
        started_at: Instant::now(),
        cancel_tx,
        join,
    }
}

async fn run(
    id: TaskId,
    operation: PrivilegedOperation,
    invocation: Invocation,
    runner: Arc<dyn CommandRunner>,
    events: mpsc::UnboundedSender<TaskEvent>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let emit = |payload: TaskEventKind| {
        let _ = events.send(TaskEvent {
            id,
            kind: operation.kind,
            payload,
        });
    };

    emit(TaskEventKind::Started);

    let mut ticker = operation.progress.map(|ramp| {
        let mut ticker = interval(ramp.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut progress: Option<u8> = None;

    let command = runner.run(&invocation);
    tokio::pin!(command);

    let result = loop {
        tokio::select! {
            biased;
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    tracing::debug!(task = %id, "task stopped by cancellation");
                    return;
                }
            }
            result = &mut command => break result,
            _ = next_tick(&mut ticker) => {
                if *cancel_rx.borrow() {
                    return;
                }
                if let Some(ramp) = operation.progress {
                    let next = match progress {
                        None => ramp.initial,
                        Some(current) => ramp.advance(current),
                    };
                    progress = Some(next);
                    emit(TaskEventKind::Progress(next));
                }
            }
        }
    };

    if *cancel_rx.borrow() {
        return;
    }

    match check_output(&operation.program, &invocation, result) {
        Ok(output) => {
            tracing::info!(task = %id, kind = %operation.kind, "task completed");
            emit(TaskEventKind::Completed((operation.handle_output)(&output)));
        }
        Err(err) => {
            tracing::warn!(task = %id, kind = %operation.kind, error = %err, "task failed");
            emit(TaskEventKind::Failed(err));
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FragError;
    use crate::fragmentation::Score;
    use crate::integrations::runner::MockCommandRunner;
    use pretty_assertions::assert_eq;

    fn ramp(interval_ms: u64) -> ProgressRamp {
        ProgressRamp {
            initial: 10,
            step: 20,
            ceiling: 90,
            interval: Duration::from_millis(interval_ms),
        }
    }

    async fn collect(mut rx: mpsc::UnboundedReceiver<TaskEvent>) -> Vec<TaskEventKind> {
        let mut out = Vec::new();
        while let Some(event) = rx.recv().await {
            out.push(event.payload);
        }
        out
    }

    #[test]
    fn ramp_never_reaches_completion() {
        let ramp = ProgressRamp::from_config(&DefragConfig {
            progress_interval_ms: 100,
            progress_initial: 0,
            progress_step: 50,
            progress_ceiling: 100,
        });
        assert_eq!(ramp.ceiling, 99);
        assert_eq!(ramp.advance(0), 50);
        assert_eq!(ramp.advance(50), 99);
        assert_eq!(ramp.advance(99), 99);
    }

    #[test]
    fn builds_argument_lists_per_kind() {
        let tools = ToolsConfig::default();
        let elevation = Elevation::via("pkexec");

        let analyze = PrivilegedOperation::analyze(&tools).invocation("/dev/sdb1", &elevation);
        assert_eq!(analyze.args, vec!["e4defrag", "-c", "/dev/sdb1"]);

        let defrag = PrivilegedOperation::defragment(&tools, ramp(100))
            .invocation("/dev/sdb1", &Elevation::direct());
        assert_eq!(defrag, Invocation::new("e4defrag", vec!["/dev/sdb1".into()]));
    }

    #[tokio::test]
    async fn analyze_emits_report_after_start() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|inv| inv.program == "pkexec" && inv.args == ["e4defrag", "-c", "/dev/sdb1"])
            .times(1)
            .returning(|_| {
                Ok(CommandOutput {
                    code: Some(0),
                    stdout: "Fragmentation score 42\nTotal files: 1000\nFragmented files: 300\n"
                        .into(),
                    stderr: String::new(),
                })
            });

        let (tx, rx) = mpsc::unbounded_channel();
        let op = PrivilegedOperation::analyze(&ToolsConfig::default());
        let handle = spawn(&op, "/dev/sdb1", &Elevation::via("pkexec"), Arc::new(runner), tx);
        assert_eq!(handle.device(), "/dev/sdb1");

        let events = collect(rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], TaskEventKind::Started);
        match &events[1] {
            TaskEventKind::Completed(TaskOutcome::Report(report)) => {
                assert_eq!(report.score, Score::Value(42));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn failure_carries_error_text() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_| {
            Ok(CommandOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: "e4defrag: Operation not permitted\n".into(),
            })
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let op = PrivilegedOperation::analyze(&ToolsConfig::default());
        let _handle = spawn(&op, "/dev/sdb1", &Elevation::direct(), Arc::new(runner), tx);

        let events = collect(rx).await;
        assert_eq!(
            events.last(),
            Some(&TaskEventKind::Failed(FragError::ExternalToolFailed(
                "e4defrag: Operation not permitted".into()
            )))
        );
    }

    #[tokio::test]
    async fn not_found_becomes_missing_tool() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_| {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let op = PrivilegedOperation::analyze(&ToolsConfig::default());
        let _handle = spawn(&op, "/dev/sdb1", &Elevation::direct(), Arc::new(runner), tx);

        let events = collect(rx).await;
        assert_eq!(
            events.last(),
            Some(&TaskEventKind::Failed(FragError::ExternalToolMissing(
                "e4defrag".into()
            )))
        );
    }

    #[tokio::test]
    async fn defragment_ramps_progress_before_completing() {
        let runner = super::testing::DelayedRunner::succeeding(Duration::from_millis(120));
        let (tx, rx) = mpsc::unbounded_channel();
        let op = PrivilegedOperation::defragment(&ToolsConfig::default(), ramp(10));
        let _handle = spawn(&op, "/dev/sdb1", &Elevation::direct(), Arc::new(runner), tx);

        let events = collect(rx).await;
        assert_eq!(events.first(), Some(&TaskEventKind::Started));
        assert!(matches!(events.last(), Some(TaskEventKind::Completed(_))));

        let progress: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                TaskEventKind::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert!(progress.len() >= 3, "expected several ticks, got {:?}", progress);
        assert_eq!(progress[0], 10);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert!(progress.iter().all(|&p| p < 100));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn cancelled_task_goes_quiet() {
        let runner = super::testing::DelayedRunner::succeeding(Duration::from_millis(200));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let op = PrivilegedOperation::defragment(&ToolsConfig::default(), ramp(10));
        let handle = spawn(&op, "/dev/sdb1", &Elevation::direct(), Arc::new(runner), tx);

        tokio::time::sleep(Duration::from_millis(40)).await;
        handle.cancel();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event.payload);
        }
        assert!(events.iter().all(|e| !e.is_terminal()));
    }

    #[tokio::test]
    async fn dropped_handle_counts_as_cancel() {
        let runner = super::testing::DelayedRunner::succeeding(Duration::from_millis(200));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let op = PrivilegedOperation::analyze(&ToolsConfig::default());
        let handle = spawn(&op, "/dev/sdb1", &Elevation::direct(), Arc::new(runner), tx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(handle);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event.payload);
        }
        assert_eq!(events, vec![TaskEventKind::Started]);
    }
}
