//! Wall-clock timing of a single adapter phase.

use std::time::{Duration, Instant};

/// Stopwatch started on creation. `duration()` reads the elapsed time so far,
/// or the frozen value once `stop()` has been called.
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
    elapsed: Option<Duration>,
}

impl Timer {
    pub fn start() -> Self {
        Timer {
            start: Instant::now(),
            elapsed: None,
        }
    }

    /// Freeze the timer and return the elapsed seconds. Repeated calls return
    /// the first measurement.
    pub fn stop(&mut self) -> f64 {
        let start = self.start;
        self.elapsed.get_or_insert_with(|| start.elapsed()).as_secs_f64()
    }

    /// Elapsed seconds.
    pub fn duration(&self) -> f64 {
        self.elapsed
            .unwrap_or_else(|| self.start.elapsed())
            .as_secs_f64()
    }
}

/// Output of a timed operation together with how long it ran.
#[derive(Debug, Clone)]
pub struct Timed<T> {
    pub value: T,
    /// Seconds
    pub duration: f64,
}

/// Run `f` and measure it. Only the closure is timed; when `f` returns an
/// `Err` the duration is still recorded on the returned `Timed`.
pub fn timed<T>(f: impl FnOnce() -> T) -> Timed<T> {
    let mut timer = Timer::start();
    let value = f();
    let duration = timer.stop();
    Timed { value, duration }
}
