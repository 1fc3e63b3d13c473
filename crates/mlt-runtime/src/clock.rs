//! Monotonic scheduling clock for the consumer runtime. Each frame carries
//! a scheduled `playtime`, monotonic microseconds from the consumer start.

use std::time::Instant;

pub const EARLY_THRESHOLD_US: i64 = 20_000;
pub const LATE_THRESHOLD_US: i64 = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    origin: Instant,
}

impl PlaybackClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_us(&self) -> i64 {
        self.origin.elapsed().as_micros() as i64
    }

    pub fn playtime_for(&self, frame_index: i64, fps: f64) -> i64 {
        ((frame_index as f64) * 1_000_000.0 / fps).round() as i64
    }
}

/// What the dispatcher should do with a frame whose `playtime` has been
/// compared against the current clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchDecision {
    SleepThenDisplay(i64),
    Drop,
    DisplayNow,
}

/// Frame dispatch and A/V sync policy. `speed` and `queue_len` are only
/// consulted at their respective
/// thresholds; a `speed != 1.0` consumer always displays immediately.
pub fn decide(now_us: i64, playtime_us: i64, speed: f64, queue_len: usize) -> DispatchDecision {
    if (speed - 1.0).abs() < f64::EPSILON {
        if now_us < playtime_us - EARLY_THRESHOLD_US {
            return DispatchDecision::SleepThenDisplay(playtime_us - now_us - EARLY_THRESHOLD_US);
        }
        if now_us > playtime_us + LATE_THRESHOLD_US && queue_len > 1 {
            return DispatchDecision::Drop;
        }
    }
    DispatchDecision::DisplayNow
}
