//! Membership polling while operations are pending.
//!
//! Polling runs only while the pending map is non-empty and is bound to one
//! knowledge base. Switching knowledge bases cancels it, and it stays off
//! until a mutation is issued against the new knowledge base.

use std::time::Duration;

use crate::scheduler::{Scheduler, TimerHandle, TimerKind};

#[derive(Debug, Clone)]
pub struct MembershipPoller {
    interval: Duration,
    handle: Option<TimerHandle>,
    knowledge_base_id: Option<String>,
    armed: bool,
}

impl MembershipPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            handle: None,
            knowledge_base_id: None,
            armed: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_polling(&self) -> bool {
        self.handle.is_some()
    }

    /// Allow polling for the current knowledge base after a mutation.
    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Bring the timer in line with the current state.
    ///
    /// Schedules the next tick when armed with pending work, cancels it when
    /// nothing is pending, and disarms on a knowledge-base change.
    pub fn sync(
        &mut self,
        scheduler: &mut Scheduler,
        has_pending: bool,
        knowledge_base_id: Option<&str>,
    ) {
        if self.knowledge_base_id.as_deref() != knowledge_base_id {
            self.stop(scheduler);
            self.knowledge_base_id = knowledge_base_id.map(str::to_string);
            self.armed = false;
        }

        if !has_pending || self.knowledge_base_id.is_none() {
            if self.handle.is_some() {
                tracing::debug!("Nothing pending, membership polling stopped");
            }
            self.stop(scheduler);
            return;
        }

        if self.armed && self.handle.is_none() {
            self.handle = Some(scheduler.schedule(TimerKind::MembershipPoll, self.interval));
        }
    }

    /// Returns true if `handle` is this poller's tick. The caller refetches
    /// membership and then calls [`sync`](Self::sync) to schedule the next one.
    pub fn on_timer(&mut self, handle: TimerHandle) -> bool {
        if self.handle == Some(handle) {
            self.handle = None;
            true
        } else {
            false
        }
    }

    fn stop(&mut self, scheduler: &mut Scheduler) {
        if let Some(handle) = self.handle.take() {
            scheduler.cancel(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualClock;
    use std::sync::Arc;

    fn setup() -> (Arc<ManualClock>, Scheduler, MembershipPoller) {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Scheduler::new(clock.clone());
        (clock, scheduler, MembershipPoller::new(Duration::from_secs(3)))
    }

    #[test]
    fn test_polls_only_while_pending() {
        let (clock, mut scheduler, mut poller) = setup();
        poller.sync(&mut scheduler, true, Some("kb"));
        assert!(!poller.is_polling(), "not armed yet");

        poller.arm();
        poller.sync(&mut scheduler, true, Some("kb"));
        assert!(poller.is_polling());

        clock.advance(Duration::from_secs(3));
        let fired = scheduler.take_due();
        assert!(poller.on_timer(fired[0].0));
        assert!(!poller.is_polling());

        poller.sync(&mut scheduler, true, Some("kb"));
        assert!(poller.is_polling());

        poller.sync(&mut scheduler, false, Some("kb"));
        assert!(!poller.is_polling());
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_knowledge_base_change_cancels() {
        let (_clock, mut scheduler, mut poller) = setup();
        poller.sync(&mut scheduler, true, Some("kb-1"));
        poller.arm();
        poller.sync(&mut scheduler, true, Some("kb-1"));
        assert!(poller.is_polling());

        poller.sync(&mut scheduler, true, Some("kb-2"));
        assert!(!poller.is_polling());
        assert_eq!(scheduler.active_count(), 0);

        poller.arm();
        poller.sync(&mut scheduler, true, Some("kb-2"));
        assert!(poller.is_polling());
    }
}
