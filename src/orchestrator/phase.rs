//! Orchestrator phases
//!
//! One unit of work walks these in order; there is no persisted FSM state.
//! Anything before COMMITTED can end in ABORTED.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Holdings resolved, ownership, assets and amount checked
    Validating,

    /// Exclusive locks held on every involved holding
    Locked,

    /// Rate fetched and frozen (cross-asset only)
    Rated,

    /// Movement appended PENDING and balance deltas applied
    Applied,

    /// Movement COMPLETED and unit of work committed
    Committed,

    /// Rolled back; nothing from this attempt is visible
    Aborted,
}

impl Phase {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Committed | Phase::Aborted)
    }

    /// Cancellation is honoured only before balances are touched
    #[inline]
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Phase::Validating | Phase::Locked | Phase::Rated)
    }

    /// A failure in this phase leaves a FAILED movement behind
    #[inline]
    pub fn records_failure(&self) -> bool {
        matches!(self, Phase::Rated | Phase::Applied | Phase::Committed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Validating => "VALIDATING",
            Phase::Locked => "LOCKED",
            Phase::Rated => "RATED",
            Phase::Applied => "APPLIED",
            Phase::Committed => "COMMITTED",
            Phase::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(Phase::Committed.is_terminal());
        assert!(Phase::Aborted.is_terminal());
        assert!(!Phase::Applied.is_terminal());
    }

    #[test]
    fn test_cancellable_before_applied() {
        assert!(Phase::Validating.is_cancellable());
        assert!(Phase::Rated.is_cancellable());
        assert!(!Phase::Applied.is_cancellable());
        assert!(!Phase::Committed.is_cancellable());
    }

    #[test]
    fn test_failure_recording_starts_at_rated() {
        assert!(!Phase::Validating.records_failure());
        assert!(!Phase::Locked.records_failure());
        assert!(Phase::Rated.records_failure());
        assert!(Phase::Applied.records_failure());
        assert!(Phase::Committed.records_failure());
    }

    #[test]
    fn test_phase_order() {
        assert!(Phase::Validating < Phase::Locked);
        assert!(Phase::Locked < Phase::Rated);
        assert!(Phase::Rated < Phase::Applied);
        assert!(Phase::Applied < Phase::Committed);
        assert_eq!(Phase::Rated.to_string(), "RATED");
    }
}
