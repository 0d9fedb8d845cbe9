//! Progress reporting for long-running engines
//!
//! A `Progress` is a cheap cloneable handle. The engine updates it, and any
//! number of listeners are notified after each change, outside the lock.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Lifecycle of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot passed to listeners
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ProgressEvent {
    pub name: String,
    pub state: TaskState,
    /// Completion in `[0, 100]`
    pub percent: f64,
    pub message: Option<String>,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({:.1}%)", self.name, self.state, self.percent)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

pub type ProgressListener = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

struct ProgressState {
    state: TaskState,
    percent: f64,
    message: Option<String>,
}

struct ProgressInner {
    name: String,
    state: Mutex<ProgressState>,
    listeners: Mutex<Vec<ProgressListener>>,
}

/// Shared progress handle
#[derive(Clone)]
pub struct Progress {
    inner: Arc<ProgressInner>,
}

impl Progress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ProgressInner {
                name: name.into(),
                state: Mutex::new(ProgressState {
                    state: TaskState::Pending,
                    percent: 0.0,
                    message: None,
                }),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> TaskState {
        self.inner.state.lock().state
    }

    pub fn percent(&self) -> f64 {
        self.inner.state.lock().percent
    }

    pub fn is_started(&self) -> bool {
        self.state() != TaskState::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.state() == TaskState::Completed
    }

    pub fn set_state(&self, state: TaskState) {
        self.update(|s| {
            s.state = state;
            if state == TaskState::Completed {
                s.percent = 100.0;
            }
        });
    }

    /// Set completion percentage, clamped to `[0, 100]`
    pub fn set_percent(&self, percent: f64) {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        self.update(|s| s.percent = percent);
    }

    pub fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|s| s.message = Some(message));
    }

    pub fn add_listener(&self, listener: ProgressListener) {
        self.inner.listeners.lock().push(listener);
    }

    pub fn clear_listeners(&self) {
        self.inner.listeners.lock().clear();
    }

    pub fn event(&self) -> ProgressEvent {
        let s = self.inner.state.lock();
        ProgressEvent {
            name: self.inner.name.clone(),
            state: s.state,
            percent: s.percent,
            message: s.message.clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut ProgressState)) {
        {
            let mut state = self.inner.state.lock();
            f(&mut *state);
        }
        let listeners = self.inner.listeners.lock().clone();
        if listeners.is_empty() {
            return;
        }
        let event = self.event();
        for listener in &listeners {
            listener(&event);
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("percent", &self.percent())
            .finish()
    }
}
