//! Frame timestamps
//!
//! Graph timestamps are microseconds on a monotonic clock, started when the
//! run starts. Two frames captured within the same microsecond would carry
//! the same timestamp and be rejected by the graph, so the clock never hands
//! out a value less than or equal to the previous one.

use crate::types::Timestamp;
use std::time::Instant;

/// Strictly increasing microsecond clock
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
    last: Option<u64>,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last: None,
        }
    }

    /// Timestamp for a frame captured now
    pub fn next(&mut self) -> Timestamp {
        let now = self.origin.elapsed().as_micros() as u64;
        Timestamp(self.advance(now))
    }

    fn advance(&mut self, now: u64) -> u64 {
        let ts = match self.last {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last = Some(ts);
        ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_same_microsecond_is_bumped() {
        let mut clock = MonotonicClock::new();
        assert_eq!(clock.advance(10), 10);
        assert_eq!(clock.advance(10), 11);
        assert_eq!(clock.advance(10), 12);
        assert_eq!(clock.advance(50), 50);
    }

    #[test]
    fn test_real_clock_strictly_increases() {
        let mut clock = MonotonicClock::new();
        let mut prev = clock.next();
        for _ in 0..1000 {
            let ts = clock.next();
            assert!(ts > prev);
            prev = ts;
        }
    }

    proptest! {
        #[test]
        fn test_any_reading_sequence_strictly_increases(readings in proptest::collection::vec(0u64..1_000, 1..64)) {
            let mut clock = MonotonicClock::new();
            let mut prev: Option<u64> = None;
            for now in readings {
                let ts = clock.advance(now);
                prop_assert!(ts >= now);
                if let Some(p) = prev {
                    prop_assert!(ts > p);
                }
                prev = Some(ts);
            }
        }
    }
}
