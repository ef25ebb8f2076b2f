//! Per-network health state machine

use crate::types::HealthState;

/// Consecutive failed probes after which a network is considered down.
pub const DOWN_AFTER_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTransition {
    pub from: HealthState,
    pub to: HealthState,
}

#[derive(Debug, Clone)]
pub struct HealthTracker {
    state: HealthState,
    consecutive_failures: u32,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            state: HealthState::Up,
            consecutive_failures: 0,
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn record_success(&mut self) -> Option<HealthTransition> {
        self.consecutive_failures = 0;
        self.transition(HealthState::Up)
    }

    pub fn record_failure(&mut self) -> Option<HealthTransition> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let next = match self.state {
            HealthState::Up | HealthState::Degraded => {
                if self.consecutive_failures >= DOWN_AFTER_FAILURES {
                    HealthState::Down
                } else {
                    HealthState::Degraded
                }
            }
            HealthState::Down => HealthState::Down,
        };
        self.transition(next)
    }

    /// Soft downgrade reported by a component other than the prober.
    pub fn mark_degraded(&mut self) -> Option<HealthTransition> {
        let next = match self.state {
            HealthState::Up => HealthState::Degraded,
            HealthState::Degraded => HealthState::Degraded,
            HealthState::Down => HealthState::Down,
        };
        self.transition(next)
    }

    fn transition(&mut self, next: HealthState) -> Option<HealthTransition> {
        if next == self.state {
            return None;
        }
        let from = self.state;
        self.state = next;
        Some(HealthTransition { from, to: next })
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_failure_degrades_three_take_it_down() {
        let mut tracker = HealthTracker::new();
        assert_eq!(
            tracker.record_failure(),
            Some(HealthTransition { from: HealthState::Up, to: HealthState::Degraded })
        );
        assert_eq!(tracker.record_failure(), None);
        assert_eq!(tracker.state(), HealthState::Degraded);
        assert_eq!(
            tracker.record_failure(),
            Some(HealthTransition { from: HealthState::Degraded, to: HealthState::Down })
        );
        assert_eq!(tracker.consecutive_failures(), 3);
    }

    #[test]
    fn any_success_resets_to_up() {
        let mut tracker = HealthTracker::new();
        for _ in 0..5 {
            tracker.record_failure();
        }
        assert_eq!(tracker.state(), HealthState::Down);
        assert_eq!(
            tracker.record_success(),
            Some(HealthTransition { from: HealthState::Down, to: HealthState::Up })
        );
        assert_eq!(tracker.consecutive_failures(), 0);
        assert_eq!(tracker.record_success(), None);
    }

    #[test]
    fn soft_downgrade_never_takes_a_network_down() {
        let mut tracker = HealthTracker::new();
        assert!(tracker.mark_degraded().is_some());
        assert!(tracker.mark_degraded().is_none());
        assert_eq!(tracker.state(), HealthState::Degraded);
        // the failure count still comes from probes only
        tracker.record_failure();
        assert_eq!(tracker.state(), HealthState::Degraded);
    }
}
