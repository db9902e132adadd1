//! Pattern predicates over the recent outcome sequence.
//!
//! Each predicate implements the [`Pattern`] trait: a pure function of the
//! outcome [`Window`] (and, where declared, the time [`Regime`]) that either
//! does not trigger, triggers and accepts, or triggers and is rejected by
//! one of its filters. The [`PatternCatalog`] runs the registered
//! predicates and resolves a single winner deterministically: highest
//! confidence first, registration order on ties.
//!
//! No predicate performs I/O or reads the clock; the radar passes in
//! everything they need.

mod advanced;
mod basic;
mod regime;
mod window;

pub use advanced::{CycleTransition, MomentumShift, PrecisionSurge, PremiumRecovery};
pub use basic::{DoubleLoss, DoubleWin, LossLossWinLoss, TripleLoss, WinWinLoss};
pub use regime::{ActivityBand, MinutePhase, Regime};
pub use window::Window;

use crate::domain::PatternMatch;

/// Outcome of evaluating one predicate against one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// The trigger matched and every filter passed.
    Accept { reason: String },
    /// The trigger matched but a filter failed; the reason names the
    /// first failing filter.
    Reject { reason: String },
    /// The trigger did not match.
    NoTrigger,
}

/// A pattern predicate.
pub trait Pattern: Send + Sync {
    /// Unique identifier, used in the signal row and in logs.
    fn name(&self) -> &'static str;

    /// Short trigger code shown to operators (often equals `name`).
    fn trigger_code(&self) -> &'static str {
        self.name()
    }

    /// Confidence percentage in `0..=100`; drives winner selection.
    fn confidence(&self) -> f64;

    /// Outcomes required before this predicate can trigger at all.
    fn min_history(&self) -> usize;

    /// Evaluate the predicate. Must be pure.
    fn evaluate(&self, window: &Window<'_>, regime: Regime) -> Evaluation;
}

/// A triggered-but-rejected predicate, reported through the signal reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub strategy_name: &'static str,
    pub reason: String,
}

/// What one catalog run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Exactly one predicate won.
    Matched(PatternMatch),
    /// At least one predicate triggered but all were filtered out;
    /// carries the first rejection in registration order.
    Rejected(Rejection),
    /// Nothing triggered.
    Quiet,
}

/// Tunables shared by the stock predicates.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Loss ceiling over the last 20 outcomes for the triple-loss
    /// predicate; sensible values sit in 8..=10.
    pub max_losses_last20: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            max_losses_last20: 9,
        }
    }
}

/// Registry of enabled predicates.
pub struct PatternCatalog {
    patterns: Vec<Box<dyn Pattern>>,
}

impl PatternCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// The full stock catalog in its fixed registration order.
    #[must_use]
    pub fn standard(settings: &CatalogSettings) -> Self {
        let mut catalog = Self::new();
        catalog.register(Box::new(TripleLoss::new(settings.max_losses_last20)));
        catalog.register(Box::new(DoubleLoss));
        catalog.register(Box::new(LossLossWinLoss));
        catalog.register(Box::new(WinWinLoss));
        catalog.register(Box::new(DoubleWin));
        catalog.register(Box::new(PrecisionSurge));
        catalog.register(Box::new(PremiumRecovery));
        catalog.register(Box::new(MomentumShift));
        catalog.register(Box::new(CycleTransition));
        catalog
    }

    pub fn register(&mut self, pattern: Box<dyn Pattern>) {
        self.patterns.push(pattern);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Run every registered predicate and resolve at most one winner.
    #[must_use]
    pub fn evaluate(&self, window: &Window<'_>, regime: Regime) -> Verdict {
        let mut best: Option<(&dyn Pattern, String)> = None;
        let mut first_rejection: Option<Rejection> = None;

        for pattern in &self.patterns {
            if window.len() < pattern.min_history() {
                continue;
            }
            match pattern.evaluate(window, regime) {
                Evaluation::Accept { reason } => {
                    let wins = match &best {
                        // Strictly greater keeps registration order on ties.
                        Some((current, _)) => pattern.confidence() > current.confidence(),
                        None => true,
                    };
                    if wins {
                        best = Some((pattern.as_ref(), reason));
                    }
                }
                Evaluation::Reject { reason } => {
                    if first_rejection.is_none() {
                        first_rejection = Some(Rejection {
                            strategy_name: pattern.name(),
                            reason,
                        });
                    }
                }
                Evaluation::NoTrigger => {}
            }
        }

        match (best, first_rejection) {
            (Some((pattern, reason)), _) => Verdict::Matched(PatternMatch {
                strategy_name: pattern.name(),
                confidence: pattern.confidence(),
                trigger_type: pattern.trigger_code(),
                reason,
                last_operations: window.snapshot(5),
            }),
            (None, Some(rejection)) => Verdict::Rejected(rejection),
            (None, None) => Verdict::Quiet,
        }
    }
}

impl Default for PatternCatalog {
    fn default() -> Self {
        Self::standard(&CatalogSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TradeResult::{Loss as L, Win as W};
    use chrono::{TimeZone, Utc};

    fn regime() -> Regime {
        // Mid-afternoon UTC: high activity, outside the opening minutes.
        Regime::at(Utc.with_ymd_and_hms(2026, 3, 10, 15, 30, 0).unwrap())
    }

    #[test]
    fn evaluation_is_deterministic() {
        let catalog = PatternCatalog::default();
        let seq = [L, L, L, W, W, W, W, W, W, W, W, W, W, W, W, W, W, W, W, W];
        let window = Window::new(&seq, 100);
        let first = catalog.evaluate(&window, regime());
        let second = catalog.evaluate(&window, regime());
        assert_eq!(first, second);
        assert!(matches!(first, Verdict::Matched(ref m) if m.strategy_name == "LLL"));
    }

    #[test]
    fn higher_confidence_wins_when_both_accept() {
        // Two wins at the head triggers WW; a 4-streak also triggers
        // PRECISION_SURGE, which carries higher confidence.
        let seq = [W, W, W, W, L, W, W, W, W, W, W, W, W, W, W];
        let window = Window::new(&seq, 50);
        let verdict = PatternCatalog::default().evaluate(&window, regime());
        match verdict {
            Verdict::Matched(m) => assert_eq!(m.strategy_name, "PRECISION_SURGE"),
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn quiet_window_produces_no_verdict() {
        let seq = [W, L, W, L, W, L, W, L, W, L];
        let window = Window::new(&seq, 10);
        assert_eq!(
            PatternCatalog::default().evaluate(&window, regime()),
            Verdict::Quiet
        );
    }

    #[test]
    fn short_window_skips_predicates_below_min_history() {
        let seq = [L, L];
        let window = Window::new(&seq, 2);
        // DoubleLoss needs six outcomes of history; with two, nothing runs.
        assert_eq!(
            PatternCatalog::default().evaluate(&window, regime()),
            Verdict::Quiet
        );
    }
}
