//! The statistical predicates: surge, recovery, momentum and cycle shapes.

use crate::domain::TradeResult::{Loss as L, Win as W};

use super::{Evaluation, Pattern, Regime, Window};

/// PRECISION_SURGE: a winning streak of exactly four or five.
///
/// Six or more is treated as saturation and rejected rather than ignored,
/// so the signal row can explain why a hot streak is not actionable.
pub struct PrecisionSurge;

impl Pattern for PrecisionSurge {
    fn name(&self) -> &'static str {
        "PRECISION_SURGE"
    }

    fn confidence(&self) -> f64 {
        85.0
    }

    fn min_history(&self) -> usize {
        6
    }

    fn evaluate(&self, window: &Window<'_>, _regime: Regime) -> Evaluation {
        let streak = window.winning_streak();
        if streak < 4 {
            return Evaluation::NoTrigger;
        }
        if streak > 5 {
            return Evaluation::Reject {
                reason: format!("saturation detected: {streak} consecutive wins"),
            };
        }
        let losses_15 = window.losses_in_first(15);
        if losses_15 >= 2 {
            return Evaluation::Reject {
                reason: format!("too many losses in last 15: {losses_15}"),
            };
        }
        if window.has_consecutive_losses_in_first(10) {
            return Evaluation::Reject {
                reason: "consecutive losses within last 10".into(),
            };
        }
        Evaluation::Accept {
            reason: format!("{streak}-win surge with clean recent history"),
        }
    }
}

/// PREMIUM_RECOVERY: a double loss arriving on top of an otherwise clean
/// stretch.
pub struct PremiumRecovery;

impl Pattern for PremiumRecovery {
    fn name(&self) -> &'static str {
        "PREMIUM_RECOVERY"
    }

    fn trigger_code(&self) -> &'static str {
        "LL"
    }

    fn confidence(&self) -> f64 {
        80.0
    }

    fn min_history(&self) -> usize {
        9
    }

    fn evaluate(&self, window: &Window<'_>, _regime: Regime) -> Evaluation {
        if !window.head_is(&[L, L]) {
            return Evaluation::NoTrigger;
        }
        let wins_mid = window.wins_in_positions(2, 8);
        if wins_mid > 6 {
            return Evaluation::Reject {
                reason: format!("overheated mid-window: {wins_mid} wins in positions 2-8"),
            };
        }
        let losses_20 = window.losses_in_first(20);
        if losses_20 > 3 {
            return Evaluation::Reject {
                reason: format!("too many losses in last 20: {losses_20}"),
            };
        }
        let losses_inner = window.losses_in_positions(2, 6);
        if losses_inner > 0 {
            return Evaluation::Reject {
                reason: format!("prior losses in positions 2-6: {losses_inner}"),
            };
        }
        Evaluation::Accept {
            reason: "double loss on a clean stretch".into(),
        }
    }
}

/// MOMENTUM_SHIFT: an isolated loss while the recent win-rate is far above
/// the older baseline.
pub struct MomentumShift;

impl Pattern for MomentumShift {
    fn name(&self) -> &'static str {
        "MOMENTUM_SHIFT"
    }

    fn confidence(&self) -> f64 {
        78.0
    }

    fn min_history(&self) -> usize {
        17
    }

    fn evaluate(&self, window: &Window<'_>, _regime: Regime) -> Evaluation {
        // Isolated head loss: the outcome before it was a win.
        if !window.head_is(&[L, W]) {
            return Evaluation::NoTrigger;
        }
        let baseline = window.win_rate_in_positions(9, 16);
        if baseline > 0.60 {
            return Evaluation::Reject {
                reason: format!("baseline already strong: {:.0}%", baseline * 100.0),
            };
        }
        let recent = window.win_rate_in_positions(1, 8);
        if recent < 0.80 {
            return Evaluation::Reject {
                reason: format!("recent win-rate too low: {:.0}%", recent * 100.0),
            };
        }
        let losses_10 = window.losses_in_first(10);
        if losses_10 > 1 {
            return Evaluation::Reject {
                reason: format!("too many losses in last 10: {losses_10}"),
            };
        }
        Evaluation::Accept {
            reason: format!(
                "momentum shift: recent {:.0}% vs baseline {:.0}%",
                recent * 100.0,
                baseline * 100.0
            ),
        }
    }
}

/// CYCLE_TRANSITION: an isolated loss early in the 20-operation cycle of a
/// strongly winning run.
pub struct CycleTransition;

impl Pattern for CycleTransition {
    fn name(&self) -> &'static str {
        "CYCLE_TRANSITION"
    }

    fn confidence(&self) -> f64 {
        76.0
    }

    fn min_history(&self) -> usize {
        21
    }

    fn evaluate(&self, window: &Window<'_>, _regime: Regime) -> Evaluation {
        if !window.head_is(&[L, W]) {
            return Evaluation::NoTrigger;
        }
        let position = window.cycle_position();
        if !(1..=5).contains(&position) {
            return Evaluation::Reject {
                reason: format!("outside cycle entry zone: position {position} of 20"),
            };
        }
        let wins_head = window.wins_in_positions(1, 6);
        if wins_head < 5 {
            return Evaluation::Reject {
                reason: format!("not enough wins in positions 1-6: {wins_head}"),
            };
        }
        let prior_rate = window.win_rate_in_positions(1, 20);
        if prior_rate < 0.75 {
            return Evaluation::Reject {
                reason: format!("prior win-rate too low: {:.0}%", prior_rate * 100.0),
            };
        }
        Evaluation::Accept {
            reason: format!("cycle entry at position {position} on a strong run"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn regime() -> Regime {
        Regime::at(Utc.with_ymd_and_hms(2026, 3, 10, 15, 30, 0).unwrap())
    }

    #[test]
    fn surge_fires_on_four_or_five_wins() {
        let four = [W, W, W, W, L, W, W, W];
        let window = Window::new(&four, 8);
        assert!(matches!(
            PrecisionSurge.evaluate(&window, regime()),
            Evaluation::Accept { .. }
        ));
    }

    #[test]
    fn surge_rejects_saturation_at_six() {
        let six = [W, W, W, W, W, W, L, W];
        let window = Window::new(&six, 8);
        match PrecisionSurge.evaluate(&window, regime()) {
            Evaluation::Reject { reason } => assert!(reason.contains("saturation detected")),
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[test]
    fn surge_rejects_dirty_history() {
        let dirty = [W, W, W, W, L, L, W, W, W, W];
        let window = Window::new(&dirty, 10);
        match PrecisionSurge.evaluate(&window, regime()) {
            Evaluation::Reject { reason } => assert!(reason.contains("last 15")),
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[test]
    fn premium_recovery_demands_clean_inner_window() {
        // Clean: double loss, then wins through position 8.
        let clean = [L, L, W, W, W, W, W, W, L];
        let window = Window::new(&clean, 9);
        match PremiumRecovery.evaluate(&window, regime()) {
            // Position 8 loss keeps wins at 6 and inner positions clean,
            // and total losses at 3.
            Evaluation::Accept { .. } => {}
            other => panic!("expected accept, got {other:?}"),
        }

        let stained = [L, L, W, W, L, W, W, W, W];
        let window = Window::new(&stained, 9);
        match PremiumRecovery.evaluate(&window, regime()) {
            Evaluation::Reject { reason } => assert!(reason.contains("positions 2-6")),
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[test]
    fn momentum_shift_compares_recent_to_baseline() {
        // Recent (1-8) all wins; baseline (9-16) mostly losses.
        let seq = [
            L, W, W, W, W, W, W, W, W, W, L, L, W, L, L, L, W, L, L, L,
        ];
        let window = Window::new(&seq, 20);
        assert!(matches!(
            MomentumShift.evaluate(&window, regime()),
            Evaluation::Accept { .. }
        ));
    }

    #[test]
    fn momentum_shift_rejects_strong_baseline() {
        let seq = [
            L, W, W, W, W, W, W, W, W, W, W, W, W, W, W, W, W, W, W, W,
        ];
        let window = Window::new(&seq, 20);
        match MomentumShift.evaluate(&window, regime()) {
            Evaluation::Reject { reason } => assert!(reason.contains("baseline")),
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[test]
    fn cycle_transition_gates_on_cycle_position() {
        let seq = [
            L, W, W, W, W, W, W, W, W, W, W, W, W, W, W, W, L, W, W, W, W, W,
        ];
        // total 43: position (43-1) % 20 + 1 = 3, inside the entry zone.
        let window = Window::new(&seq, 43);
        assert!(matches!(
            CycleTransition.evaluate(&window, regime()),
            Evaluation::Accept { .. }
        ));

        // total 50: position 10, outside the entry zone.
        let window = Window::new(&seq, 50);
        match CycleTransition.evaluate(&window, regime()) {
            Evaluation::Reject { reason } => assert!(reason.contains("cycle")),
            other => panic!("expected reject, got {other:?}"),
        }
    }
}
