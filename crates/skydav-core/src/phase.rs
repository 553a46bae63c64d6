//! Per-request write state machine

use crate::{CoreError, MutationOutcome, OutcomeState, Result};
use serde::Serialize;
use tracing::debug;

/// Phase of one write request.
///
/// ```text
/// Unresolved -> Resolving -> Creating | Overwriting | Deleting | CopyingFrom(src)
///                                           -> Committed | PartiallyFailed
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum WritePhase {
    Unresolved,
    Resolving,
    Creating,
    Overwriting,
    Deleting,
    CopyingFrom(String),
    Committed,
    PartiallyFailed,
}

impl WritePhase {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::PartiallyFailed)
    }

    fn is_working(&self) -> bool {
        matches!(
            self,
            Self::Creating | Self::Overwriting | Self::Deleting | Self::CopyingFrom(_)
        )
    }

    fn allows(&self, next: &WritePhase) -> bool {
        match self {
            Self::Unresolved => *next == Self::Resolving,
            Self::Resolving => next.is_working(),
            s if s.is_working() => next.is_terminal(),
            _ => false,
        }
    }
}

/// Tracks one write request through its phases
#[derive(Debug)]
pub struct WriteTracker {
    target: String,
    phase: WritePhase,
}

impl WriteTracker {
    /// Start tracking a request on `target`
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            phase: WritePhase::Unresolved,
        }
    }

    /// Current phase
    pub fn phase(&self) -> &WritePhase {
        &self.phase
    }

    /// Move to `next`, rejecting transitions the machine does not have
    pub fn advance(&mut self, next: WritePhase) -> Result<()> {
        if !self.phase.allows(&next) {
            return Err(CoreError::InvalidTransition {
                from: self.phase.clone(),
                to: next,
            });
        }
        debug!(path = %self.target, from = ?self.phase, to = ?next, "Write phase");
        self.phase = next;
        Ok(())
    }

    /// Enter the terminal phase matching `outcome`
    pub fn finish(&mut self, outcome: &MutationOutcome) -> Result<()> {
        let next = match outcome.state() {
            OutcomeState::Committed => WritePhase::Committed,
            OutcomeState::PartiallyFailed => WritePhase::PartiallyFailed,
        };
        self.advance(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut tracker = WriteTracker::new("/c/x");
        tracker.advance(WritePhase::Resolving).unwrap();
        tracker
            .advance(WritePhase::CopyingFrom("/c/y".to_string()))
            .unwrap();
        tracker.finish(&MutationOutcome::single()).unwrap();
        assert_eq!(tracker.phase(), &WritePhase::Committed);
        assert!(tracker.phase().is_terminal());
    }

    #[test]
    fn test_partial_failure_is_terminal() {
        let mut tracker = WriteTracker::new("/c/d");
        tracker.advance(WritePhase::Resolving).unwrap();
        tracker.advance(WritePhase::Deleting).unwrap();

        let mut outcome = MutationOutcome::new();
        outcome.record_failure("/c/d/x", "503");
        tracker.finish(&outcome).unwrap();
        assert_eq!(tracker.phase(), &WritePhase::PartiallyFailed);

        let err = tracker.advance(WritePhase::Committed).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_cannot_skip_resolution() {
        let mut tracker = WriteTracker::new("/c/x");
        assert!(tracker.advance(WritePhase::Creating).is_err());
        assert_eq!(tracker.phase(), &WritePhase::Unresolved);
    }
}
