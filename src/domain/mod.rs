//! Core types shared across the radar and the executor.
//!
//! These mirror the three persistent tables (`operation_log`, `signal`,
//! `strategy_execution`) plus the in-memory radar state. Rows are plain
//! data: all behavior lives in the components that own them.

mod execution;
mod outcome;
mod pattern;
mod signal;
mod state;

pub use execution::{
    ExecutionPatch, ExecutionStatus, FinalResult, NewStrategyExecution, StrategyExecution,
};
pub use outcome::{render_last_operations, NewOutcome, Outcome, TradeResult};
pub use pattern::PatternMatch;
pub use signal::Signal;
pub use state::{ActivePattern, BotState, RadarState};
