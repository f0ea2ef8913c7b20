#[cfg(test)]
use std::{cell::Cell, rc::Rc};
use std::time::{Duration, Instant};

/// Wall-clock time since some fixed start point.
pub trait TimeSource {
    fn elapsed(&self) -> Duration;
}

#[derive(Debug)]
pub struct MonotonicTime {
    start: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Time source moved by hand. Clones share the same reading, so a test can
/// keep one handle and give the other to a `Clock`.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub struct ManualTime {
    now: Rc<Cell<Duration>>,
}

#[cfg(test)]
impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get().saturating_add(by));
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

#[cfg(test)]
impl TimeSource for ManualTime {
    fn elapsed(&self) -> Duration {
        self.now.get()
    }
}

pub struct Clock {
    source: Box<dyn TimeSource>,
    elapsed: f32,
    previous_elapsed: f32,
}

impl Clock {
    pub fn new(source: Box<dyn TimeSource>) -> Self {
        Self {
            source,
            elapsed: 0.0,
            previous_elapsed: 0.0,
        }
    }

    pub fn monotonic() -> Self {
        Self::new(Box::new(MonotonicTime::new()))
    }

    /// Samples the time source and returns seconds since the previous tick.
    ///
    /// `elapsed` never moves backwards: a source that reports an earlier
    /// reading is treated as stalled and yields a zero delta.
    pub fn tick(&mut self) -> f32 {
        let reading = self.source.elapsed().as_secs_f32();
        self.previous_elapsed = self.elapsed;
        self.elapsed = reading.max(self.previous_elapsed);
        (self.elapsed - self.previous_elapsed).max(0.0)
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Current reading of the time source without ticking. Never earlier
    /// than the last tick.
    pub fn now(&self) -> f32 {
        self.source.elapsed().as_secs_f32().max(self.elapsed)
    }

    #[cfg(test)]
    pub fn previous_elapsed(&self) -> f32 {
        self.previous_elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_clock() -> (Clock, ManualTime) {
        let time = ManualTime::new();
        (Clock::new(Box::new(time.clone())), time)
    }

    mod tick {
        use super::*;

        #[test]
        fn first_tick_without_time_passing_is_zero() {
            let (mut clock, _time) = manual_clock();
            assert_eq!(clock.tick(), 0.0);
            assert_eq!(clock.elapsed(), 0.0);
        }

        #[test]
        fn delta_is_time_since_previous_tick() {
            let (mut clock, time) = manual_clock();
            clock.tick();
            time.advance(Duration::from_millis(250));
            let delta = clock.tick();
            assert!((delta - 0.25).abs() < 1e-6);
            time.advance(Duration::from_millis(500));
            let delta = clock.tick();
            assert!((delta - 0.5).abs() < 1e-6);
            assert!((clock.elapsed() - 0.75).abs() < 1e-6);
            assert!((clock.previous_elapsed() - 0.25).abs() < 1e-6);
        }

        #[test]
        fn stalled_source_gives_zero_delta() {
            let (mut clock, time) = manual_clock();
            time.advance(Duration::from_secs(1));
            clock.tick();
            assert_eq!(clock.tick(), 0.0);
            assert_eq!(clock.tick(), 0.0);
        }

        #[test]
        fn backwards_source_is_clamped() {
            let (mut clock, time) = manual_clock();
            time.set(Duration::from_secs(2));
            clock.tick();
            time.set(Duration::from_secs(1));
            assert_eq!(clock.tick(), 0.0);
            assert!((clock.elapsed() - 2.0).abs() < 1e-6);
        }
    }

    mod now {
        use super::*;

        #[test]
        fn reads_source_between_ticks() {
            let (mut clock, time) = manual_clock();
            clock.tick();
            time.advance(Duration::from_millis(20));
            assert!((clock.now() - 0.02).abs() < 1e-6);
            assert_eq!(clock.elapsed(), 0.0);
        }

        #[test]
        fn never_behind_last_tick() {
            let (mut clock, time) = manual_clock();
            time.set(Duration::from_secs(2));
            clock.tick();
            time.set(Duration::from_secs(1));
            assert!((clock.now() - 2.0).abs() < 1e-6);
        }
    }

    mod monotonic {
        use super::*;

        #[test]
        fn never_decreases() {
            let mut clock = Clock::monotonic();
            let mut last = clock.elapsed();
            for _ in 0..100 {
                assert!(clock.tick() >= 0.0);
                assert!(clock.elapsed() >= last);
                last = clock.elapsed();
            }
        }
    }
}
