//! Aggregated result of multi-step mutations

use serde::Serialize;

/// One sub-operation that failed
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedKey {
    /// Client-visible path of the affected object
    pub path: String,
    /// Backend error text
    pub reason: String,
}

/// Terminal state of a mutation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OutcomeState {
    Committed,
    PartiallyFailed,
}

/// Counts of independent sub-operations. Nothing already applied is rolled
/// back when a later step fails.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    /// Sub-operations that succeeded
    pub succeeded: usize,
    /// Sub-operations that failed
    pub failed: Vec<FailedKey>,
}

impl MutationOutcome {
    /// Create an empty outcome
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome of a single successful step
    pub fn single() -> Self {
        Self {
            succeeded: 1,
            failed: Vec::new(),
        }
    }

    /// Count a success
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    /// Count a failure
    pub fn record_failure(&mut self, path: impl Into<String>, reason: impl ToString) {
        self.failed.push(FailedKey {
            path: path.into(),
            reason: reason.to_string(),
        });
    }

    /// Fold another outcome into this one
    pub fn merge(&mut self, other: MutationOutcome) {
        self.succeeded += other.succeeded;
        self.failed.extend(other.failed);
    }

    /// Whether every sub-operation succeeded
    pub fn is_committed(&self) -> bool {
        self.failed.is_empty()
    }

    /// Terminal state
    pub fn state(&self) -> OutcomeState {
        if self.is_committed() {
            OutcomeState::Committed
        } else {
            OutcomeState::PartiallyFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_follows_failures() {
        let mut outcome = MutationOutcome::new();
        outcome.record_success();
        assert_eq!(outcome.state(), OutcomeState::Committed);

        let mut other = MutationOutcome::single();
        other.record_failure("/c/d/x", "backend returned status 503");
        outcome.merge(other);

        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.state(), OutcomeState::PartiallyFailed);
        assert_eq!(outcome.failed[0].path, "/c/d/x");
    }
}
