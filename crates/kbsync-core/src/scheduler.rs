//! Timers for debounce and polling.
//!
//! The session never sleeps itself. It schedules named timers here, and the
//! driving loop asks for the next deadline, waits (or advances a
//! [`ManualClock`] in tests), then collects whatever came due.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ============================================================================
// Clock
// ============================================================================

/// Monotonic time source, measured from an arbitrary origin.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Duration;
}

/// Wall-clock time since construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.lock().map(|now| *now).unwrap_or_default()
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// What a timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    SearchDebounce,
    MembershipPoll,
}

/// Handle to a scheduled timer, used to cancel it or match it when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle {
    id: u64,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    kind: TimerKind,
    deadline: Duration,
}

/// Single-threaded timer registry.
#[derive(Debug)]
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    timers: BTreeMap<TimerHandle, Timer>,
    next_id: u64,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            timers: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Fire `kind` once, `delay` from now.
    pub fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle { id: self.next_id };
        let deadline = self.clock.now() + delay;
        self.timers.insert(handle, Timer { kind, deadline });
        tracing::trace!(?kind, ?delay, "Timer scheduled");
        handle
    }

    /// Cancel a timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.timers.remove(&handle).is_some()
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    /// Remove and return every timer whose deadline has passed, earliest first.
    pub fn take_due(&mut self) -> Vec<(TimerHandle, TimerKind)> {
        let now = self.clock.now();
        let mut due: Vec<(TimerHandle, Timer)> = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.deadline <= now)
            .map(|(handle, timer)| (*handle, *timer))
            .collect();
        due.sort_by_key(|(handle, timer)| (timer.deadline, *handle));
        for (handle, _) in &due {
            self.timers.remove(handle);
        }
        due.into_iter()
            .map(|(handle, timer)| (handle, timer.kind))
            .collect()
    }

    /// Time until the earliest timer fires, zero if one is already due.
    pub fn until_next(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.timers
            .values()
            .map(|timer| timer.deadline.saturating_sub(now))
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> (Arc<ManualClock>, Scheduler) {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Scheduler::new(clock.clone());
        (clock, scheduler)
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let (clock, mut scheduler) = scheduler();
        let poll = scheduler.schedule(TimerKind::MembershipPoll, Duration::from_millis(300));
        let debounce = scheduler.schedule(TimerKind::SearchDebounce, Duration::from_millis(100));

        assert!(scheduler.take_due().is_empty());
        assert_eq!(scheduler.until_next(), Some(Duration::from_millis(100)));

        clock.advance(Duration::from_millis(500));
        let fired = scheduler.take_due();
        assert_eq!(
            fired,
            vec![
                (debounce, TimerKind::SearchDebounce),
                (poll, TimerKind::MembershipPoll)
            ]
        );
        assert_eq!(scheduler.active_count(), 0);
        assert!(scheduler.until_next().is_none());
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let (clock, mut scheduler) = scheduler();
        let handle = scheduler.schedule(TimerKind::MembershipPoll, Duration::from_millis(10));
        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));

        clock.advance(Duration::from_secs(1));
        assert!(scheduler.take_due().is_empty());
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock::new();
        let first = clock.now();
        assert!(clock.now() >= first);
    }
}
