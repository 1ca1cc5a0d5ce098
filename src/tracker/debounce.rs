use std::time::Duration;

use tokio::time::Instant;

/// Quiet window before a page change is persisted.
pub const PROGRESS_QUIET_WINDOW: Duration = Duration::from_millis(800);

/// Restartable deadline. The owner polls [`quiet_period`] with the current deadline.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// (Re)start the quiet window from now.
    pub fn touch(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the deadline if it has passed.
    pub fn take_elapsed(&mut self) -> bool {
        match self.deadline {
            Some(d) if d <= Instant::now() => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(PROGRESS_QUIET_WINDOW)
    }
}

/// Completes at `deadline`; never completes without one.
pub async fn quiet_period(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending::<()>().await,
    }
}
