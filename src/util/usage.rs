//! Token budget accounting for a conversation.

use crate::types::usage::Usage;

/// Default conversation ceiling.
pub const DEFAULT_TOKEN_CEILING: u64 = 200_000;
/// Remaining-token floor below which callers are warned.
pub const DEFAULT_WARNING_FLOOR: u64 = 20_000;

/// Coarse band for presenting budget consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetLevel {
    /// Up to 75% used.
    Normal,
    /// Over 75%, up to 90%.
    Elevated,
    /// Over 90%.
    Critical,
}

/// Tracks cumulative token usage against a fixed ceiling.
///
/// Informational only: it never refuses work, it just reports.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAccountant {
    used: u64,
    ceiling: u64,
    warning_floor: u64,
}

impl Default for TokenAccountant {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_CEILING, DEFAULT_WARNING_FLOOR)
    }
}

impl TokenAccountant {
    pub fn new(ceiling: u64, warning_floor: u64) -> Self {
        Self {
            used: 0,
            ceiling,
            warning_floor,
        }
    }

    /// Record usage reported by a backend.
    pub fn record(&mut self, usage: &Usage) {
        self.add(usage.total() as u64);
    }

    /// Add a raw token count.
    pub fn add(&mut self, tokens: u64) {
        self.used = self.used.saturating_add(tokens);
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    pub fn remaining(&self) -> u64 {
        self.ceiling.saturating_sub(self.used)
    }

    /// Percentage of the ceiling consumed (may exceed 100).
    pub fn percent_used(&self) -> f64 {
        if self.ceiling == 0 {
            return 100.0;
        }
        self.used as f64 / self.ceiling as f64 * 100.0
    }

    /// Whether fewer than the warning floor's worth of tokens remain.
    pub fn is_low(&self) -> bool {
        self.remaining() < self.warning_floor
    }

    pub fn level(&self) -> BudgetLevel {
        let pct = self.percent_used();
        if pct > 90.0 {
            BudgetLevel::Critical
        } else if pct > 75.0 {
            BudgetLevel::Elevated
        } else {
            BudgetLevel::Normal
        }
    }

    /// Zero the running total. The ceiling and floor are kept.
    pub fn reset(&mut self) {
        self.used = 0;
    }
}
