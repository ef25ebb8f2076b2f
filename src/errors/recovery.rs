//! Recovery strategies for failed price polls

use tracing::Level;
use super::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Grow the interval one exponential step.
    Backoff { log_level: Level },
    /// Jump straight to the backoff ceiling.
    BackoffToCeiling { log_level: Level },
}

impl RecoveryAction {
    pub fn log_level(&self) -> Level {
        match self {
            RecoveryAction::Backoff { log_level } | RecoveryAction::BackoffToCeiling { log_level } => *log_level,
        }
    }
}

pub fn recovery_for(error: &FetchError) -> RecoveryAction {
    match error {
        FetchError::Unreachable(_) => RecoveryAction::Backoff { log_level: Level::WARN },
        // The provider asked us to slow down; honour it fully.
        FetchError::RateLimited => RecoveryAction::BackoffToCeiling { log_level: Level::WARN },
        FetchError::MalformedResponse(_) => RecoveryAction::Backoff { log_level: Level::ERROR },
    }
}
