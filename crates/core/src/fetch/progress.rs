use crate::config::DirectConfig;

/// Detects looping transfers from the progress ratio.
///
/// Every drop in progress larger than `threshold` counts as a backward
/// jump; once the count exceeds `max_jumps` the transfer should be
/// cancelled.
#[derive(Debug, Clone)]
pub struct StallDetector {
    threshold: f64,
    max_jumps: u32,
    last: f64,
    jumps: u32,
}

impl StallDetector {
    pub fn new(threshold: f64, max_jumps: u32) -> Self {
        Self {
            threshold,
            max_jumps,
            last: 0.0,
            jumps: 0,
        }
    }

    pub fn from_config(config: &DirectConfig) -> Self {
        Self::new(config.backward_jump_threshold, config.max_backward_jumps)
    }

    /// Record a progress ratio in `[0, 1]`. Returns true when stalled.
    pub fn observe(&mut self, progress: f64) -> bool {
        if progress - self.last < -self.threshold {
            self.jumps += 1;
        }
        self.last = progress;
        self.is_stalled()
    }

    pub fn is_stalled(&self) -> bool {
        self.jumps > self.max_jumps
    }

    pub fn jumps(&self) -> u32 {
        self.jumps
    }
}

/// Logs download progress every few percentage points.
#[derive(Debug, Default)]
pub(crate) struct ProgressLog {
    next_percent: u32,
}

impl ProgressLog {
    const STEP: u32 = 5;

    /// Returns the percentage when a new step was crossed.
    pub(crate) fn step(&mut self, progress: f64) -> Option<u32> {
        let percent = (progress.clamp(0.0, 1.0) * 100.0) as u32;
        if percent < self.next_percent {
            return None;
        }
        self.next_percent = (percent / Self::STEP + 1) * Self::STEP;
        Some(percent)
    }

    pub(crate) fn reset(&mut self) {
        self.next_percent = 0;
    }
}
