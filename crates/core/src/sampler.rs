//! Burst sampling for noisy log sites.
//!
//! A [`LogSampler`] lets the first `burst` events of every `period` through
//! and suppresses the rest. Per-flow error paths use it so that a broken
//! rule or an unreachable routing provider cannot flood the log.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default burst: 3 messages per minute.
pub const DEFAULT_BURST: u32 = 3;
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct LogSampler {
    burst: u32,
    period: Duration,
    // (window start, events seen in window)
    window: Mutex<(Instant, u32)>,
    suppressed: Mutex<u64>,
}

impl LogSampler {
    pub fn new(burst: u32, period: Duration) -> Self {
        Self {
            burst,
            period,
            window: Mutex::new((Instant::now(), 0)),
            suppressed: Mutex::new(0),
        }
    }

    /// Returns `true` when the caller may emit its log line.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    fn allow_at(&self, now: Instant) -> bool {
        let mut window = self.window.lock();
        if now.duration_since(window.0) >= self.period {
            *window = (now, 0);
        }
        if window.1 < self.burst {
            window.1 += 1;
            return true;
        }
        drop(window);
        *self.suppressed.lock() += 1;
        false
    }

    /// Number of events suppressed since creation.
    pub fn suppressed(&self) -> u64 {
        *self.suppressed.lock()
    }
}

impl Default for LogSampler {
    fn default() -> Self {
        Self::new(DEFAULT_BURST, DEFAULT_PERIOD)
    }
}
