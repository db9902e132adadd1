//! The short sequence-shape predicates: LLL, LL, LLWL, WWL, WW.
//!
//! Trigger heads are written newest-first, matching the window ordering.

use crate::domain::TradeResult::{Loss as L, Win as W};

use super::{ActivityBand, Evaluation, Pattern, Regime, Window};

/// LLL: three consecutive losses, gated on the wider window not being a
/// losing streak regime.
pub struct TripleLoss {
    max_losses_last20: usize,
}

impl TripleLoss {
    #[must_use]
    pub fn new(max_losses_last20: usize) -> Self {
        Self { max_losses_last20 }
    }
}

impl Pattern for TripleLoss {
    fn name(&self) -> &'static str {
        "LLL"
    }

    fn confidence(&self) -> f64 {
        75.0
    }

    fn min_history(&self) -> usize {
        3
    }

    fn evaluate(&self, window: &Window<'_>, _regime: Regime) -> Evaluation {
        if !window.head_is(&[L, L, L]) {
            return Evaluation::NoTrigger;
        }
        let losses = window.losses_in_first(20);
        if losses > self.max_losses_last20 {
            return Evaluation::Reject {
                reason: format!(
                    "too many losses in last 20: {losses} > {}",
                    self.max_losses_last20
                ),
            };
        }
        Evaluation::Accept {
            reason: format!("three consecutive losses, {losses} losses in last 20"),
        }
    }
}

/// LL: two consecutive losses inside a dense losing cluster.
pub struct DoubleLoss;

impl Pattern for DoubleLoss {
    fn name(&self) -> &'static str {
        "LL"
    }

    fn confidence(&self) -> f64 {
        70.0
    }

    fn min_history(&self) -> usize {
        6
    }

    fn evaluate(&self, window: &Window<'_>, _regime: Regime) -> Evaluation {
        if !window.head_is(&[L, L]) {
            return Evaluation::NoTrigger;
        }
        let losses = window.losses_in_first(6);
        if losses < 4 {
            return Evaluation::Reject {
                reason: format!("loss cluster too thin: {losses} losses in last 6, need 4"),
            };
        }
        Evaluation::Accept {
            reason: format!("double loss inside cluster of {losses} in last 6"),
        }
    }
}

/// LLWL: loss, loss, win, loss in chronological order. Unfiltered.
pub struct LossLossWinLoss;

impl Pattern for LossLossWinLoss {
    fn name(&self) -> &'static str {
        "LLWL"
    }

    fn confidence(&self) -> f64 {
        68.0
    }

    fn min_history(&self) -> usize {
        4
    }

    fn evaluate(&self, window: &Window<'_>, _regime: Regime) -> Evaluation {
        // Chronological L, L, W, L reads newest-first as L, W, L, L.
        if !window.head_is(&[L, W, L, L]) {
            return Evaluation::NoTrigger;
        }
        Evaluation::Accept {
            reason: "interrupted recovery: loss, loss, win, loss".into(),
        }
    }
}

/// WWL: two wins then a loss, in a net-positive window.
pub struct WinWinLoss;

impl Pattern for WinWinLoss {
    fn name(&self) -> &'static str {
        "WWL"
    }

    fn confidence(&self) -> f64 {
        72.0
    }

    fn min_history(&self) -> usize {
        3
    }

    fn evaluate(&self, window: &Window<'_>, _regime: Regime) -> Evaluation {
        // Chronological W, W, L reads newest-first as L, W, W.
        if !window.head_is(&[L, W, W]) {
            return Evaluation::NoTrigger;
        }
        let balance = window.balance_in_first(20);
        if balance <= 0 {
            return Evaluation::Reject {
                reason: format!("negative balance in last 20: {balance}"),
            };
        }
        Evaluation::Accept {
            reason: format!("single pullback after two wins, balance +{balance} in last 20"),
        }
    }
}

/// WW: two consecutive wins; situational, gated on the activity regime.
pub struct DoubleWin;

impl Pattern for DoubleWin {
    fn name(&self) -> &'static str {
        "WW"
    }

    fn confidence(&self) -> f64 {
        65.0
    }

    fn min_history(&self) -> usize {
        2
    }

    fn evaluate(&self, window: &Window<'_>, regime: Regime) -> Evaluation {
        if !window.head_is(&[W, W]) {
            return Evaluation::NoTrigger;
        }
        if regime.band == ActivityBand::Low {
            return Evaluation::Reject {
                reason: "low-activity regime".into(),
            };
        }
        Evaluation::Accept {
            reason: "two consecutive wins in an active regime".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn high_regime() -> Regime {
        Regime::at(Utc.with_ymd_and_hms(2026, 3, 10, 15, 30, 0).unwrap())
    }

    fn low_regime() -> Regime {
        Regime::at(Utc.with_ymd_and_hms(2026, 3, 10, 3, 30, 0).unwrap())
    }

    #[test]
    fn lll_accepts_below_loss_ceiling() {
        let seq = [L, L, L, W, W, W, W, W];
        let window = Window::new(&seq, 8);
        assert!(matches!(
            TripleLoss::new(9).evaluate(&window, high_regime()),
            Evaluation::Accept { .. }
        ));
    }

    #[test]
    fn lll_rejects_saturated_losing_window() {
        let seq = [L; 12];
        let window = Window::new(&seq, 12);
        match TripleLoss::new(9).evaluate(&window, high_regime()) {
            Evaluation::Reject { reason } => assert!(reason.contains("last 20")),
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[test]
    fn ll_requires_dense_cluster() {
        // Two losses at the head but only two in the last six.
        let seq = [L, L, W, W, W, W, W];
        let window = Window::new(&seq, 7);
        match DoubleLoss.evaluate(&window, high_regime()) {
            Evaluation::Reject { reason } => assert!(reason.contains("need 4")),
            other => panic!("expected reject, got {other:?}"),
        }

        let dense = [L, L, W, L, L, W];
        let window = Window::new(&dense, 6);
        assert!(matches!(
            DoubleLoss.evaluate(&window, high_regime()),
            Evaluation::Accept { .. }
        ));
    }

    #[test]
    fn llwl_matches_chronological_shape() {
        // Chronological ..., L, L, W, L.
        let seq = [L, W, L, L, W];
        let window = Window::new(&seq, 5);
        assert!(matches!(
            LossLossWinLoss.evaluate(&window, high_regime()),
            Evaluation::Accept { .. }
        ));

        let wrong = [L, L, W, L];
        let window = Window::new(&wrong, 4);
        assert_eq!(
            LossLossWinLoss.evaluate(&window, high_regime()),
            Evaluation::NoTrigger
        );
    }

    #[test]
    fn wwl_needs_positive_balance() {
        let positive = [L, W, W, W, W];
        let window = Window::new(&positive, 5);
        assert!(matches!(
            WinWinLoss.evaluate(&window, high_regime()),
            Evaluation::Accept { .. }
        ));

        let negative = [L, W, W, L, L, L, L];
        let window = Window::new(&negative, 7);
        assert!(matches!(
            WinWinLoss.evaluate(&window, high_regime()),
            Evaluation::Reject { .. }
        ));
    }

    #[test]
    fn ww_is_gated_by_activity_band() {
        let seq = [W, W, L, W];
        let window = Window::new(&seq, 4);
        assert!(matches!(
            DoubleWin.evaluate(&window, high_regime()),
            Evaluation::Accept { .. }
        ));
        assert!(matches!(
            DoubleWin.evaluate(&window, low_regime()),
            Evaluation::Reject { .. }
        ));
    }
}
