//! Telegram notification sink.

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::warn;

use super::{Event, Notifier};

/// Token and target chat, both read from the environment.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub token: String,
    pub chat_id: i64,
}

/// Sends events to a Telegram chat. Each send runs on its own task;
/// delivery failures are logged and dropped.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    #[must_use]
    pub fn new(settings: &TelegramSettings) -> Self {
        Self {
            bot: Bot::new(&settings.token),
            chat_id: ChatId(settings.chat_id),
        }
    }

    fn render(event: &Event) -> String {
        match event {
            Event::PatternDetected {
                bot_name,
                strategy,
                confidence,
                reason,
            } => format!("[{bot_name}] pattern {strategy} ({confidence:.0}%): {reason}"),
            Event::TrackingCompleted {
                bot_name,
                strategy,
                final_result,
            } => format!(
                "[{bot_name}] {strategy} resolved {}",
                final_result.as_str()
            ),
            Event::TradeSettled {
                bot_name,
                profit,
                stake,
            } => format!("[{bot_name}] trade settled: profit {profit} on stake {stake}"),
            Event::BotStopped { bot_name, reason } => {
                format!("[{bot_name}] stopped: {reason}")
            }
        }
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, event: Event) {
        let bot = self.bot.clone();
        let chat_id = self.chat_id;
        let text = Self::render(&event);
        tokio::spawn(async move {
            if let Err(e) = bot.send_message(chat_id, text).await {
                warn!(error = %e, "telegram delivery failed");
            }
        });
    }
}
