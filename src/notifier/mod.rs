//! Notification sinks: optional, fire-and-forget.
//!
//! A failed or slow notifier must never block trading or radar liveness,
//! so `notify` is synchronous and implementations that do I/O spawn it.

#[cfg(feature = "telegram")]
mod telegram;

#[cfg(feature = "telegram")]
pub use telegram::{TelegramNotifier, TelegramSettings};

use rust_decimal::Decimal;
use tracing::info;

use crate::domain::FinalResult;

/// Something an operator may want to hear about.
#[derive(Debug, Clone)]
pub enum Event {
    PatternDetected {
        bot_name: String,
        strategy: String,
        confidence: f64,
        reason: String,
    },
    TrackingCompleted {
        bot_name: String,
        strategy: String,
        final_result: FinalResult,
    },
    TradeSettled {
        bot_name: String,
        profit: Decimal,
        stake: Decimal,
    },
    BotStopped {
        bot_name: String,
        reason: String,
    },
}

/// A notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: Event);
}

/// Registry of notifiers; events fan out to all of them.
#[derive(Default)]
pub struct NotifierRegistry {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn notify_all(&self, event: &Event) {
        for notifier in &self.notifiers {
            notifier.notify(event.clone());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

/// Logs events via tracing; always registered.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: Event) {
        match event {
            Event::PatternDetected {
                bot_name,
                strategy,
                confidence,
                reason,
            } => info!(bot = %bot_name, %strategy, confidence, %reason, "pattern detected"),
            Event::TrackingCompleted {
                bot_name,
                strategy,
                final_result,
            } => info!(
                bot = %bot_name,
                %strategy,
                result = final_result.as_str(),
                "tracking completed"
            ),
            Event::TradeSettled {
                bot_name,
                profit,
                stake,
            } => info!(bot = %bot_name, %profit, %stake, "trade settled"),
            Event::BotStopped { bot_name, reason } => {
                info!(bot = %bot_name, %reason, "bot stopped");
            }
        }
    }
}
