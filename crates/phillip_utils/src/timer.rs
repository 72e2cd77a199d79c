use std::time::{Duration, Instant};

/// Wall-clock timer for toolchain and probe runs; also serves as the
/// deadline clock for bounded invocations.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start_new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed().as_millis()
    }

    pub fn has_exceeded(&self, limit: Duration) -> bool {
        self.elapsed() >= limit
    }
}
