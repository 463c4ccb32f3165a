//! Token budget ledger for one pass.
//!
//! `ContextBudget` tracks what has been committed; `ReservationLedger` tracks
//! tokens held back for fields that have not been processed yet.

use weave_core::ContextError;

/// Mutable budget state of a single pass.
///
/// Invariant: `remaining + reserved == max` and `remaining <= max` at every
/// observation point. `remaining` never increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    max_tokens: usize,
    remaining_tokens: usize,
    reserved_tokens: usize,
}

impl ContextBudget {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            remaining_tokens: max_tokens,
            reserved_tokens: 0,
        }
    }

    /// Validate a caller-supplied ceiling.
    pub fn from_request(max_tokens: i64) -> Result<Self, ContextError> {
        if max_tokens <= 0 {
            return Err(ContextError::InvalidBudget(max_tokens));
        }
        Ok(Self::new(max_tokens as usize))
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn remaining_tokens(&self) -> usize {
        self.remaining_tokens
    }

    pub fn reserved_tokens(&self) -> usize {
        self.reserved_tokens
    }

    /// Charge a commit. Overdrawing is a defect, never a normal exclusion:
    /// the allocator only commits what it has checked to fit.
    pub fn commit(&mut self, tokens: usize) -> Result<(), ContextError> {
        if tokens > self.remaining_tokens {
            return Err(ContextError::BudgetInvariant(format!(
                "commit of {tokens} tokens with only {} remaining",
                self.remaining_tokens
            )));
        }
        self.remaining_tokens -= tokens;
        self.reserved_tokens += tokens;
        debug_assert_eq!(self.remaining_tokens + self.reserved_tokens, self.max_tokens);
        Ok(())
    }
}

/// Tokens held for pending fields, keyed by identifier.
///
/// Holds are granted in priority order until the ceiling is reached; a hold
/// that would overflow the ceiling is not granted at all.
///
/// A hold shrinks what every higher-priority field may take, so it can change
/// how those fields are trimmed. Removing a field that holds tokens may
/// therefore let an earlier field grow and squeeze out a later one. Removing
/// the lowest-priority field never changes the fields before it as long as
/// that field holds nothing.
#[derive(Debug, Clone, Default)]
pub struct ReservationLedger {
    holds: Vec<(String, usize)>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a hold if it fits under `ceiling`. Returns whether it was granted.
    pub fn grant(&mut self, identifier: &str, tokens: usize, ceiling: usize) -> bool {
        if tokens == 0 || self.total() + tokens > ceiling {
            return false;
        }
        self.holds.push((identifier.to_string(), tokens));
        true
    }

    pub fn total(&self) -> usize {
        self.holds.iter().map(|(_, t)| *t).sum()
    }

    /// Tokens held for every field except `identifier`.
    pub fn held_by_others(&self, identifier: &str) -> usize {
        self.holds
            .iter()
            .filter(|(id, _)| id != identifier)
            .map(|(_, t)| *t)
            .sum()
    }

    pub fn release(&mut self, identifier: &str) {
        self.holds.retain(|(id, _)| id != identifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_ceiling_rejected() {
        assert!(matches!(ContextBudget::from_request(0), Err(ContextError::InvalidBudget(0))));
        assert!(matches!(ContextBudget::from_request(-3), Err(ContextError::InvalidBudget(-3))));
        assert_eq!(ContextBudget::from_request(50).unwrap().max_tokens(), 50);
    }

    #[test]
    fn commit_moves_tokens_from_remaining_to_reserved() {
        let mut budget = ContextBudget::new(50);
        budget.commit(20).unwrap();
        assert_eq!(budget.remaining_tokens(), 30);
        assert_eq!(budget.reserved_tokens(), 20);
        assert_eq!(budget.remaining_tokens() + budget.reserved_tokens(), 50);
    }

    #[test]
    fn overdraw_is_a_budget_invariant_error() {
        let mut budget = ContextBudget::new(10);
        budget.commit(8).unwrap();
        assert!(matches!(budget.commit(3), Err(ContextError::BudgetInvariant(_))));
        assert_eq!(budget.remaining_tokens(), 2);
    }

    #[test]
    fn holds_respect_ceiling() {
        let mut ledger = ReservationLedger::new();
        assert!(ledger.grant("memory", 30, 50));
        assert!(!ledger.grant("note", 30, 50));
        assert!(ledger.grant("note", 20, 50));
        assert_eq!(ledger.total(), 50);
    }

    #[test]
    fn held_by_others_excludes_own_hold() {
        let mut ledger = ReservationLedger::new();
        ledger.grant("memory", 10, 100);
        ledger.grant("note", 5, 100);
        assert_eq!(ledger.held_by_others("memory"), 5);
        ledger.release("note");
        assert_eq!(ledger.held_by_others("memory"), 0);
    }
}
