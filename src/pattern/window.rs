//! The outcome window predicates evaluate against.
//!
//! Index 0 is the most recent outcome. Predicate position ranges ("positions
//! 2-8") are inclusive index ranges into this newest-first ordering, so the
//! trigger outcomes at the head are excluded when a filter starts at 1 or 2.

use crate::domain::TradeResult;

/// A read-only view over the most recent outcomes, newest first.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    results: &'a [TradeResult],
    /// Total outcomes ever logged (the latest outcome id); used by
    /// cycle-position predicates so they stay pure.
    total_operations: i64,
}

impl<'a> Window<'a> {
    #[must_use]
    pub fn new(results: &'a [TradeResult], total_operations: i64) -> Self {
        Self {
            results,
            total_operations,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub fn total_operations(&self) -> i64 {
        self.total_operations
    }

    /// 1-based position in a repeating 20-operation cycle.
    #[must_use]
    pub fn cycle_position(&self) -> i64 {
        if self.total_operations <= 0 {
            0
        } else {
            (self.total_operations - 1) % 20 + 1
        }
    }

    /// Whether the newest outcomes match `head` exactly (newest first).
    #[must_use]
    pub fn head_is(&self, head: &[TradeResult]) -> bool {
        self.results.len() >= head.len() && self.results[..head.len()] == *head
    }

    /// Length of the winning streak at the head.
    #[must_use]
    pub fn winning_streak(&self) -> usize {
        self.results.iter().take_while(|r| r.is_win()).count()
    }

    /// Losses among the `n` most recent outcomes (clamped to the window).
    #[must_use]
    pub fn losses_in_first(&self, n: usize) -> usize {
        self.results.iter().take(n).filter(|r| !r.is_win()).count()
    }

    /// Wins among the `n` most recent outcomes (clamped to the window).
    #[must_use]
    pub fn wins_in_first(&self, n: usize) -> usize {
        self.results.iter().take(n).filter(|r| r.is_win()).count()
    }

    /// Wins minus losses over the `n` most recent outcomes.
    #[must_use]
    pub fn balance_in_first(&self, n: usize) -> i64 {
        let wins = self.wins_in_first(n) as i64;
        let total = self.results.len().min(n) as i64;
        wins - (total - wins)
    }

    /// Wins in the inclusive index range `lo..=hi`, clamped to the window.
    #[must_use]
    pub fn wins_in_positions(&self, lo: usize, hi: usize) -> usize {
        self.slice(lo, hi).iter().filter(|r| r.is_win()).count()
    }

    /// Losses in the inclusive index range `lo..=hi`, clamped to the window.
    #[must_use]
    pub fn losses_in_positions(&self, lo: usize, hi: usize) -> usize {
        self.slice(lo, hi).iter().filter(|r| !r.is_win()).count()
    }

    /// Win rate over the inclusive index range `lo..=hi`, in `0.0..=1.0`.
    /// An empty range rates 0.
    #[must_use]
    pub fn win_rate_in_positions(&self, lo: usize, hi: usize) -> f64 {
        let slice = self.slice(lo, hi);
        if slice.is_empty() {
            return 0.0;
        }
        let wins = slice.iter().filter(|r| r.is_win()).count();
        wins as f64 / slice.len() as f64
    }

    /// Whether any two adjacent outcomes in the first `n` are both losses.
    #[must_use]
    pub fn has_consecutive_losses_in_first(&self, n: usize) -> bool {
        self.results
            .iter()
            .take(n)
            .zip(self.results.iter().take(n).skip(1))
            .any(|(a, b)| !a.is_win() && !b.is_win())
    }

    /// Snapshot of the `n` most recent outcomes for display ("W L L").
    #[must_use]
    pub fn snapshot(&self, n: usize) -> String {
        let mut s = String::with_capacity(n * 2);
        for (i, r) in self.results.iter().take(n).enumerate() {
            if i > 0 {
                s.push(' ');
            }
            s.push(r.letter());
        }
        s
    }

    fn slice(&self, lo: usize, hi: usize) -> &[TradeResult] {
        if lo > hi || lo >= self.results.len() {
            return &[];
        }
        let hi = hi.min(self.results.len() - 1);
        &self.results[lo..=hi]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TradeResult::{Loss as L, Win as W};

    #[test]
    fn head_matching_is_newest_first() {
        let w = Window::new(&[L, L, W, W], 4);
        assert!(w.head_is(&[L, L]));
        assert!(!w.head_is(&[W, W]));
        assert!(!w.head_is(&[L, L, W, W, W]));
    }

    #[test]
    fn position_ranges_are_inclusive_and_clamped() {
        let seq = [L, W, W, L, W];
        let w = Window::new(&seq, 5);
        assert_eq!(w.wins_in_positions(1, 2), 2);
        assert_eq!(w.losses_in_positions(0, 4), 2);
        assert_eq!(w.losses_in_positions(3, 30), 1);
        assert_eq!(w.wins_in_positions(7, 9), 0);
    }

    #[test]
    fn balance_counts_wins_minus_losses() {
        let seq = [W, W, L, W];
        let w = Window::new(&seq, 4);
        assert_eq!(w.balance_in_first(20), 2);
        assert_eq!(w.balance_in_first(3), 1);
    }

    #[test]
    fn winning_streak_stops_at_first_loss() {
        assert_eq!(Window::new(&[W, W, W, L], 4).winning_streak(), 3);
        assert_eq!(Window::new(&[L, W], 2).winning_streak(), 0);
    }

    #[test]
    fn consecutive_losses_respects_bound() {
        let seq = [W, L, W, L, L];
        let w = Window::new(&seq, 5);
        assert!(w.has_consecutive_losses_in_first(5));
        assert!(!w.has_consecutive_losses_in_first(4));
    }

    #[test]
    fn cycle_position_wraps_at_twenty() {
        assert_eq!(Window::new(&[], 1).cycle_position(), 1);
        assert_eq!(Window::new(&[], 20).cycle_position(), 20);
        assert_eq!(Window::new(&[], 21).cycle_position(), 1);
        assert_eq!(Window::new(&[], 45).cycle_position(), 5);
    }
}
