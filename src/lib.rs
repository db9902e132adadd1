//! Tickradar - Signal radar and execution tracker for binary options.
//!
//! This crate watches a bot's trade outcome history for statistical
//! patterns, publishes a single live signal row per bot, attributes
//! post-pattern outcomes back to the detected pattern, and optionally
//! executes contracts through a pooled, rate-limited WebSocket broker
//! client.
//!
//! # Architecture
//!
//! The radar runs a two-state loop per bot:
//!
//! - **ANALYZING** - read the recent outcome window and evaluate the
//!   pattern catalog; on a match, open a tracking record and flip to
//!   MONITORING.
//! - **MONITORING** - attribute fresh outcomes to the active pattern;
//!   once enough arrive, grade the pattern (WIN / LOSS / TIE) and go
//!   back to ANALYZING.
//!
//! The executor consumes the signal row, passes risk admission, and
//! runs propose/buy/poll cycles against the broker, feeding settled
//! outcomes back into the same store the radar reads.
//!
//! # Modules
//!
//! - [`config`] - TOML configuration and environment credentials
//! - [`domain`] - Outcomes, signals, executions, radar state
//! - [`pattern`] - Pure pattern predicates and the catalog
//! - [`store`] - REST store adapter with retry policy
//! - [`broker`] - Pooled WebSocket broker client
//! - [`radar`] - The signal radar loop
//! - [`executor`] - Risk admission and trade execution
//! - [`notifier`] - Event fan-out (log, optional Telegram)
//! - [`error`] - Error types for the crate
//!
//! # Features
//!
//! - `telegram` - Telegram notification sink (enabled by default)
//! - `testkit` - In-memory store and test helpers
//!
//! # Example
//!
//! ```no_run
//! use tickradar::pattern::{CatalogSettings, PatternCatalog};
//! use tickradar::radar::RadarSettings;
//!
//! let catalog = PatternCatalog::standard(&CatalogSettings::default());
//! let settings = RadarSettings::for_bot("alpha-bot");
//! assert!(catalog.len() >= 9);
//! # let _ = settings;
//! ```

pub mod app;
pub mod broker;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod notifier;
pub mod pattern;
pub mod radar;
pub mod store;
