//! Growing auto-block windows
//!
//! Each consecutive connectivity failure while auto-blocked extends the block
//! by the next Fibonacci multiple of the initial window (1x, 1x, 2x, 3x, 5x, ...),
//! capped at the max window. A success resets the sequence.

use std::time::Duration;

use crate::cache::ttl::saturating_millis;

/// Fibonacci sequence of block windows, in millis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoBlockSchedule {
    initial: u64,
    max: u64,
    previous: u64,
    current: u64,
}

impl AutoBlockSchedule {
    /// Create a schedule; `max` below `initial` is raised to `initial`
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = saturating_millis(initial);
        let max = saturating_millis(max).max(initial);
        Self {
            initial,
            max,
            previous: 0,
            current: initial,
        }
    }

    /// Window the next block will use, without advancing
    #[must_use]
    pub fn peek(&self) -> Duration {
        Duration::from_millis(self.current.min(self.max))
    }

    /// Take the window for this block and advance the sequence
    pub fn next_window(&mut self) -> Duration {
        let window = self.current.min(self.max);
        if self.current < self.max {
            let next = self.previous.saturating_add(self.current);
            self.previous = self.current;
            self.current = next;
        }
        Duration::from_millis(window)
    }

    /// Start over from the initial window
    pub fn reset(&mut self) {
        self.previous = 0;
        self.current = self.initial;
    }

    #[must_use]
    pub fn initial(&self) -> Duration {
        Duration::from_millis(self.initial)
    }

    #[must_use]
    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(schedule: &mut AutoBlockSchedule) -> u64 {
        schedule.next_window().as_secs()
    }

    #[test]
    fn fibonacci_growth() {
        let mut schedule = AutoBlockSchedule::new(Duration::from_secs(40), Duration::from_secs(3600));
        let windows: Vec<u64> = (0..7).map(|_| secs(&mut schedule)).collect();
        assert_eq!(windows, vec![40, 40, 80, 120, 200, 320, 520]);
    }

    #[test]
    fn capped_at_max() {
        let mut schedule = AutoBlockSchedule::new(Duration::from_secs(40), Duration::from_secs(100));
        let windows: Vec<u64> = (0..6).map(|_| secs(&mut schedule)).collect();
        assert_eq!(windows, vec![40, 40, 80, 100, 100, 100]);
    }

    #[test]
    fn reset_starts_over() {
        let mut schedule = AutoBlockSchedule::new(Duration::from_secs(10), Duration::from_secs(1000));
        for _ in 0..5 {
            schedule.next_window();
        }
        schedule.reset();
        assert_eq!(schedule.peek(), Duration::from_secs(10));
        assert_eq!(secs(&mut schedule), 10);
    }

    #[test]
    fn max_below_initial_is_raised() {
        let schedule = AutoBlockSchedule::new(Duration::from_secs(60), Duration::from_secs(30));
        assert_eq!(schedule.max(), Duration::from_secs(60));
        assert_eq!(schedule.peek(), Duration::from_secs(60));
    }
}
