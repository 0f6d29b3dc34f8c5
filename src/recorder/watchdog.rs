//! Session watchdog
//!
//! A single optional deadline after which the capture session is forcibly
//! restarted, bounding the length of any one physical recording.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Default)]
pub struct Watchdog {
    deadline: Option<Instant>,
    task: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Arm the deadline unless one is already pending.
    ///
    /// `on_fire` runs once when the deadline passes. It should only enqueue
    /// work; the owner calls [`Watchdog::consume`] when it handles the firing.
    pub fn arm<F>(&mut self, after: Duration, on_fire: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_armed() {
            return false;
        }

        let deadline = Instant::now() + after;
        self.deadline = Some(deadline);
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire();
        }));

        tracing::debug!("Watchdog armed for {:.0}s", after.as_secs_f64());
        true
    }

    /// Clear a deadline that has fired. Returns whether one was pending.
    pub fn consume(&mut self) -> bool {
        self.task = None;
        self.deadline.take().is_some()
    }

    /// Cancel the pending deadline, if any
    pub fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.deadline = None;
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}
