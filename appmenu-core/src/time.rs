//! Clock abstraction and the debounce timer used for delayed leave handling.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Source of the current instant. The event loop owner decides what "now" is.
pub trait Clock {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// [Clock] backed by [Instant::now].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// A single-shot timer that is rescheduled instead of stacked.
///
/// Each [Debounce::schedule] bumps a generation counter, so only the most recent deadline can
/// ever fire. Whoever handles the firing still has to re-check its own state.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
    generation: u64,
}

impl Debounce {
    /// Creates an idle timer with a fixed delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            generation: 0,
        }
    }

    /// (Re)arm the timer. Returns the generation that will fire.
    pub fn schedule(&mut self, now: Instant) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.deadline = Some(now + self.delay);
        self.generation
    }

    /// Disarm the timer.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns the firing generation once the deadline has passed, disarming the timer.
    pub fn fire(&mut self, now: Instant) -> Option<u64> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(self.generation)
            },
            _ => None,
        }
    }

    /// Generation of the most recent schedule.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reschedule_only_fires_latest() {
        let clock = ManualClock::new();
        let mut timer = Debounce::new(Duration::from_millis(50));

        let first = timer.schedule(clock.now());
        clock.advance(Duration::from_millis(30));
        let second = timer.schedule(clock.now());
        assert_ne!(first, second);

        clock.advance(Duration::from_millis(30));
        assert_eq!(timer.fire(clock.now()), None);

        clock.advance(Duration::from_millis(30));
        assert_eq!(timer.fire(clock.now()), Some(second));
        assert_eq!(timer.fire(clock.now()), None);
    }

    #[test]
    fn test_cancel_disarms() {
        let clock = ManualClock::new();
        let mut timer = Debounce::new(Duration::from_millis(10));
        timer.schedule(clock.now());
        timer.cancel();
        clock.advance(Duration::from_secs(1));
        assert!(!timer.is_armed());
        assert_eq!(timer.fire(clock.now()), None);
    }
}
