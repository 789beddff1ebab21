//! Unified event handling system

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::tasks::TaskEvent;

/// Everything the foreground loop reacts to, in arrival order
#[derive(Debug, Clone)]
pub enum Event {
    // Input events
    Key(KeyEvent),
    Resize(u16, u16),

    /// Render tick
    Tick,

    /// Message from a background task
    Task(TaskEvent),
}

/// Result of handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Continue,
    Quit,
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    pub fn new() -> (Self, mpsc::UnboundedSender<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, tx)
    }

    /// Start terminal input and the render tick
    pub fn spawn_sources(event_tx: mpsc::UnboundedSender<Event>) {
        tokio::spawn(Self::terminal_events(event_tx.clone()));

        // 100ms is enough for a gauge that moves twice a second
        tokio::spawn(Self::tick_events(
            event_tx,
            Duration::from_millis(100),
            Event::Tick,
        ));
    }

    /// Relay background task events into the main queue.
    ///
    /// A single forwarder keeps each task's events in emission order.
    pub fn forward_tasks(
        mut task_rx: mpsc::UnboundedReceiver<TaskEvent>,
        event_tx: mpsc::UnboundedSender<Event>,
    ) {
        tokio::spawn(async move {
            while let Some(event) = task_rx.recv().await {
                if event.payload.is_terminal() {
                    tracing::trace!(task = %event.id, kind = %event.kind, "task finished");
                }
                if event_tx.send(Event::Task(event)).is_err() {
                    break;
                }
            }
        });
    }

    async fn terminal_events(tx: mpsc::UnboundedSender<Event>) {
        use crossterm::event::{self, Event as CrosstermEvent, KeyEventKind};
        use futures::StreamExt;

        let mut reader = event::EventStream::new();
        while let Some(event_result) = reader.next().await {
            let event = match event_result {
                Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
                Ok(CrosstermEvent::Resize(w, h)) => Event::Resize(w, h),
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "terminal event stream failed");
                    break;
                }
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    }

    async fn tick_events(tx: mpsc::UnboundedSender<Event>, interval: Duration, event: Event) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if tx.send(event.clone()).is_err() {
                break;
            }
        }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

/// Key binding helper
pub struct KeyBinding {
    pub key: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(key: KeyCode) -> Self {
        Self {
            key,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn ctrl(key: KeyCode) -> Self {
        Self {
            key,
            modifiers: KeyModifiers::CONTROL,
        }
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        event.code == self.key && event.modifiers == self.modifiers
    }
}

/// Standard key bindings
pub struct KeyBindings;

impl KeyBindings {
    pub fn quit() -> KeyBinding {
        KeyBinding::new(KeyCode::Char('q'))
    }

    pub fn quit_alt() -> KeyBinding {
        KeyBinding::ctrl(KeyCode::Char('c'))
    }

    pub fn analyze() -> KeyBinding {
        KeyBinding::new(KeyCode::Char('a'))
    }

    pub fn defragment() -> KeyBinding {
        KeyBinding::new(KeyCode::Char('d'))
    }

    pub fn cancel() -> KeyBinding {
        KeyBinding::new(KeyCode::Char('x'))
    }

    pub fn help() -> KeyBinding {
        KeyBinding::new(KeyCode::Char('?'))
    }

    pub fn escape() -> KeyBinding {
        KeyBinding::new(KeyCode::Esc)
    }

    pub fn up() -> KeyBinding {
        KeyBinding::new(KeyCode::Up)
    }

    pub fn down() -> KeyBinding {
        KeyBinding::new(KeyCode::Down)
    }

    pub fn vim_up() -> KeyBinding {
        KeyBinding::new(KeyCode::Char('k'))
    }

    pub fn vim_down() -> KeyBinding {
        KeyBinding::new(KeyCode::Char('j'))
    }

    pub fn refresh() -> KeyBinding {
        KeyBinding::new(KeyCode::Char('r'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{TaskEventKind, TaskId, TaskKind};

    #[test]
    fn bindings_respect_modifiers() {
        let plain_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);

        assert!(KeyBindings::quit_alt().matches(&ctrl_c));
        assert!(!KeyBindings::quit_alt().matches(&plain_c));
        assert!(KeyBindings::analyze().matches(&KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE)));
    }

    #[tokio::test]
    async fn forwarded_task_events_keep_their_order() {
        let (mut handler, event_tx) = EventHandler::new();
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        EventHandler::forward_tasks(task_rx, event_tx);

        let id = TaskId::new();
        for payload in [
            TaskEventKind::Started,
            TaskEventKind::Progress(5),
            TaskEventKind::Progress(8),
        ] {
            task_tx
                .send(TaskEvent {
                    id,
                    kind: TaskKind::Defragment,
                    payload,
                })
                .expect("send");
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            match handler.next().await {
                Some(Event::Task(event)) => seen.push(event.payload),
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(
            seen,
            vec![
                TaskEventKind::Started,
                TaskEventKind::Progress(5),
                TaskEventKind::Progress(8)
            ]
        );
    }
}
