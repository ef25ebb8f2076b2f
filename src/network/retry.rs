//! Exponential backoff for poll loops

use std::time::Duration;

/// Interval controller for one poll loop: base cadence on success, doubling on
/// failure up to `max_multiplier × base`.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    base: Duration,
    max_multiplier: u32,
    multiplier: u32,
}

impl PollBackoff {
    pub fn new(base: Duration, max_multiplier: u32) -> Self {
        Self {
            base,
            max_multiplier: max_multiplier.max(1),
            multiplier: 1,
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn current(&self) -> Duration {
        self.base.saturating_mul(self.multiplier)
    }

    pub fn ceiling(&self) -> Duration {
        self.base.saturating_mul(self.max_multiplier)
    }

    pub fn record_success(&mut self) -> Duration {
        self.multiplier = 1;
        self.current()
    }

    pub fn record_failure(&mut self) -> Duration {
        self.multiplier = self.multiplier.saturating_mul(2).min(self.max_multiplier);
        self.current()
    }

    pub fn jump_to_ceiling(&mut self) -> Duration {
        self.multiplier = self.max_multiplier;
        self.current()
    }
}

/// ±10% jitter so backed-off loops against one provider spread out.
pub fn with_jitter(delay: Duration) -> Duration {
    let factor = 1.0 + 0.2 * (rand::random::<f64>() - 0.5);
    delay.mul_f64(factor)
}
