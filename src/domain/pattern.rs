//! The value a pattern predicate produces when it fires.

/// A fired pattern: which predicate accepted the current window and why.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    /// Predicate identifier, e.g. `"LLL"` or `"PRECISION_SURGE"`.
    pub strategy_name: &'static str,
    /// Confidence percentage in `0..=100`.
    pub confidence: f64,
    /// Short trigger code shown to operators, e.g. `"LLL"`.
    pub trigger_type: &'static str,
    /// Human-readable explanation of the accept.
    pub reason: String,
    /// Snapshot of the most recent outcomes at fire time ("W L L").
    pub last_operations: String,
}
