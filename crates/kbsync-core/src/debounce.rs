//! Search-term debouncing on top of the [`Scheduler`].

use std::time::Duration;

use crate::scheduler::{Scheduler, TimerHandle, TimerKind};

/// Settles a search term after a quiet period.
///
/// Every new input cancels the previous timer and starts a fresh one, so only
/// the last term typed within the window is delivered.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<(TimerHandle, String)>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Register a keystroke, restarting the quiet period.
    pub fn input(&mut self, scheduler: &mut Scheduler, term: impl Into<String>) {
        self.cancel(scheduler);
        let handle = scheduler.schedule(TimerKind::SearchDebounce, self.delay);
        self.pending = Some((handle, term.into()));
    }

    /// Deliver the settled term if `handle` is the live debounce timer.
    pub fn on_timer(&mut self, handle: TimerHandle) -> Option<String> {
        match &self.pending {
            Some((live, _)) if *live == handle => self.pending.take().map(|(_, term)| term),
            _ => None,
        }
    }

    /// Drop any unsettled term.
    pub fn cancel(&mut self, scheduler: &mut Scheduler) {
        if let Some((handle, _)) = self.pending.take() {
            scheduler.cancel(handle);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
