//! TOML configuration, environment credentials and logging setup.
//!
//! Structural settings (intervals, stakes, contract parameters) come from
//! the TOML file; credentials only ever come from the environment.

use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::broker::{BrokerSettings, ContractType, RateLimits};
use crate::error::ConfigError;
use crate::executor::{ExecutorSettings, RiskSettings};
use crate::radar::RadarSettings;

const BOT_NAME_MIN: usize = 3;
const BOT_NAME_MAX: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub radar: RadarConfig,
    pub executor: ExecutorConfig,
    pub risk: RiskConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Identity key for the signal row and outcome rows.
    pub name: String,
    /// Stable id recorded alongside outcomes.
    pub id: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub ws_url: String,
    pub pool_size: usize,
    pub max_in_flight: usize,
    pub buys_per_min: usize,
    pub histories_per_min: usize,
    pub polls_per_min: usize,
    pub proposals_per_min: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        let limits = RateLimits::default();
        Self {
            ws_url: "wss://ws.derivws.com/websockets/v3".into(),
            pool_size: 3,
            max_in_flight: 8,
            buys_per_min: limits.buys_per_min,
            histories_per_min: limits.histories_per_min,
            polls_per_min: limits.polls_per_min,
            proposals_per_min: limits.proposals_per_min,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    pub analysis_interval_secs: u64,
    pub min_history: usize,
    pub required_post_operations: u8,
    pub window_size: usize,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            analysis_interval_secs: 5,
            min_history: 10,
            required_post_operations: 1,
            window_size: 35,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    pub symbol: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub contract_type: ContractType,
    /// ACCU growth rate as a percent (1..=5).
    #[serde(default = "default_growth_rate_percent")]
    pub growth_rate_percent: Decimal,
    /// Take profit as a percent of the stake.
    pub take_profit_percent: Option<Decimal>,
    pub duration: Option<u32>,
    pub duration_unit: Option<String>,
    #[serde(default = "default_barrier_no_loss")]
    pub barrier_no_loss: String,
    #[serde(default = "default_barrier_after_loss")]
    pub barrier_after_loss: String,
    #[serde(default = "default_true")]
    pub signal_driven: bool,
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_monitor_deadline")]
    pub monitor_deadline_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    pub base_stake: Decimal,
    #[serde(default = "default_martingale_factor")]
    pub martingale_factor: Decimal,
    pub daily_loss_floor: Decimal,
    pub daily_profit_ceiling: Decimal,
    #[serde(default = "default_max_open_contracts")]
    pub max_open_contracts: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    /// Install the global tracing subscriber. `RUST_LOG` wins over the
    /// configured level.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => fmt().json().with_env_filter(filter).init(),
            _ => fmt().with_env_filter(filter).init(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bot_name(&self.bot.name)?;

        if self.bot.id.is_empty() {
            return Err(ConfigError::MissingField { field: "bot.id" });
        }
        if self.broker.ws_url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "broker.ws_url",
            });
        }
        if self.broker.pool_size == 0 || self.broker.pool_size > 4 {
            return Err(ConfigError::InvalidValue {
                field: "broker.pool_size",
                reason: format!("must be 1..=4, got {}", self.broker.pool_size),
            });
        }
        if self.radar.analysis_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "radar.analysis_interval_secs",
                reason: "must be positive".into(),
            });
        }
        if !(1..=2).contains(&self.radar.required_post_operations) {
            return Err(ConfigError::InvalidValue {
                field: "radar.required_post_operations",
                reason: format!("must be 1 or 2, got {}", self.radar.required_post_operations),
            });
        }
        if self.radar.window_size == 0 || self.radar.window_size > 35 {
            return Err(ConfigError::InvalidValue {
                field: "radar.window_size",
                reason: format!("must be 1..=35, got {}", self.radar.window_size),
            });
        }
        if self.executor.symbol.is_empty() {
            return Err(ConfigError::MissingField {
                field: "executor.symbol",
            });
        }
        if self.executor.contract_type.is_accumulator()
            && !(dec!(1)..=dec!(5)).contains(&self.executor.growth_rate_percent)
        {
            return Err(ConfigError::InvalidValue {
                field: "executor.growth_rate_percent",
                reason: format!(
                    "must be within 1..=5, got {}",
                    self.executor.growth_rate_percent
                ),
            });
        }
        for (field, barrier) in [
            ("executor.barrier_no_loss", &self.executor.barrier_no_loss),
            (
                "executor.barrier_after_loss",
                &self.executor.barrier_after_loss,
            ),
        ] {
            if self.executor.contract_type.is_digit()
                && !(barrier.len() == 1 && barrier.chars().all(|c| c.is_ascii_digit()))
            {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("must be a single digit, got {barrier:?}"),
                });
            }
        }
        if self.risk.base_stake < crate::broker::MIN_STAKE {
            return Err(ConfigError::InvalidValue {
                field: "risk.base_stake",
                reason: format!(
                    "must be at least {}, got {}",
                    crate::broker::MIN_STAKE,
                    self.risk.base_stake
                ),
            });
        }
        if self.risk.daily_loss_floor <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "risk.daily_loss_floor",
                reason: "must be a positive magnitude".into(),
            });
        }
        if self.risk.max_open_contracts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "risk.max_open_contracts",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn radar_settings(&self) -> RadarSettings {
        RadarSettings {
            bot_name: self.bot.name.clone(),
            analysis_interval_secs: self.radar.analysis_interval_secs,
            min_history: self.radar.min_history,
            required_post_operations: self.radar.required_post_operations,
            window_size: self.radar.window_size,
        }
    }

    #[must_use]
    pub fn risk_settings(&self) -> RiskSettings {
        RiskSettings {
            active: self.bot.active,
            base_stake: self.risk.base_stake,
            martingale_factor: self.risk.martingale_factor,
            daily_loss_floor: self.risk.daily_loss_floor,
            daily_profit_ceiling: self.risk.daily_profit_ceiling,
            max_open_contracts: self.risk.max_open_contracts,
        }
    }

    #[must_use]
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            bot_name: self.bot.name.clone(),
            bot_id: self.bot.id.clone(),
            symbol: self.executor.symbol.clone(),
            currency: self.executor.currency.clone(),
            contract_type: self.executor.contract_type,
            growth_rate_percent: self.executor.growth_rate_percent,
            take_profit_percent: self.executor.take_profit_percent,
            duration: self.executor.duration,
            duration_unit: self.executor.duration_unit.clone(),
            barrier_no_loss: self.executor.barrier_no_loss.clone(),
            barrier_after_loss: self.executor.barrier_after_loss.clone(),
            signal_driven: self.executor.signal_driven,
            cycle_interval_secs: self.executor.cycle_interval_secs,
            poll_interval_secs: self.executor.poll_interval_secs,
            monitor_deadline_secs: self.executor.monitor_deadline_secs,
        }
    }

    /// Broker settings; the token and app id come from the environment.
    #[must_use]
    pub fn broker_settings(&self, env: &Environment) -> BrokerSettings {
        let ws_url = format!("{}?app_id={}", self.broker.ws_url, env.broker_app_id);
        BrokerSettings {
            ws_url,
            token: env.broker_api_token.clone(),
            pool_size: self.broker.pool_size,
            max_in_flight: self.broker.max_in_flight,
            limits: RateLimits {
                buys_per_min: self.broker.buys_per_min,
                histories_per_min: self.broker.histories_per_min,
                polls_per_min: self.broker.polls_per_min,
                proposals_per_min: self.broker.proposals_per_min,
            },
        }
    }
}

/// Identity key rules for the signal and outcome rows: 3..=50 chars from
/// `[A-Za-z0-9._-]`, no leading or trailing dot, no doubled separators.
pub fn validate_bot_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        field: "bot.name",
        reason,
    };

    let len = name.chars().count();
    if !(BOT_NAME_MIN..=BOT_NAME_MAX).contains(&len) {
        return Err(invalid(format!(
            "length must be {BOT_NAME_MIN}..={BOT_NAME_MAX}, got {len}"
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(invalid(format!("character {c:?} is not allowed")));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid("must not start or end with a dot".into()));
    }
    let mut prev_separator = false;
    for c in name.chars() {
        let separator = matches!(c, '.' | '_' | '-');
        if separator && prev_separator {
            return Err(invalid("separators must not repeat".into()));
        }
        prev_separator = separator;
    }
    Ok(())
}

/// Credentials pulled from the process environment (after `dotenvy`).
#[derive(Debug, Clone)]
pub struct Environment {
    pub broker_app_id: String,
    pub broker_api_token: String,
    pub store_url: String,
    pub store_anon_key: String,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<i64>,
}

impl Environment {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            broker_app_id: required("BROKER_APP_ID")?,
            broker_api_token: required("BROKER_API_TOKEN")?,
            store_url: required("STORE_URL")?,
            store_anon_key: required("STORE_ANON_KEY")?,
            telegram_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_chat_id: std::env::var("TELEGRAM_CHAT_ID")
                .ok()
                .and_then(|v| v.parse().ok()),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnv { name }),
    }
}

fn default_true() -> bool {
    true
}

fn default_currency() -> String {
    "USD".into()
}

fn default_growth_rate_percent() -> Decimal {
    dec!(2)
}

fn default_barrier_no_loss() -> String {
    "8".into()
}

fn default_barrier_after_loss() -> String {
    "5".into()
}

fn default_martingale_factor() -> Decimal {
    dec!(1)
}

fn default_max_open_contracts() -> usize {
    1
}

fn default_cycle_interval() -> u64 {
    5
}

fn default_poll_interval() -> u64 {
    2
}

fn default_monitor_deadline() -> u64 {
    90
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Config {
        toml::from_str(toml_src).expect("config parses")
    }

    fn minimal() -> Config {
        parse(
            r#"
            [bot]
            name = "alpha-bot.v2"
            id = "bot-001"

            [executor]
            symbol = "R_75"
            contract_type = "ACCU"

            [risk]
            base_stake = "1.00"
            daily_loss_floor = "25.00"
            daily_profit_ceiling = "50.00"
            "#,
        )
    }

    #[test]
    fn minimal_config_validates() {
        let config = minimal();
        config.validate().expect("valid");
        assert_eq!(config.radar.analysis_interval_secs, 5);
        assert_eq!(config.radar.window_size, 35);
        assert!(config.executor.signal_driven);
        assert_eq!(config.executor.barrier_no_loss, "8");
    }

    #[test]
    fn bot_name_rules() {
        assert!(validate_bot_name("alpha-bot.v2").is_ok());
        assert!(validate_bot_name("Bot_01").is_ok());

        assert!(validate_bot_name("ab").is_err());
        assert!(validate_bot_name(&"x".repeat(51)).is_err());
        assert!(validate_bot_name(".alpha").is_err());
        assert!(validate_bot_name("alpha.").is_err());
        assert!(validate_bot_name("alpha..beta").is_err());
        assert!(validate_bot_name("alpha--beta").is_err());
        assert!(validate_bot_name("alpha-_beta").is_err());
        assert!(validate_bot_name("alpha bot").is_err());
        assert!(validate_bot_name("alpha/bot").is_err());
    }

    #[test]
    fn accu_growth_rate_bounds() {
        let mut config = minimal();
        config.executor.growth_rate_percent = dec!(6);
        assert!(config.validate().is_err());

        config.executor.growth_rate_percent = dec!(5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn digit_barrier_must_be_single_digit() {
        let mut config = minimal();
        config.executor.contract_type = ContractType::DigitDiff;
        config.executor.barrier_no_loss = "10".into();
        assert!(config.validate().is_err());

        config.executor.barrier_no_loss = "8".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn stake_floor_enforced() {
        let mut config = minimal();
        config.risk.base_stake = dec!(0.10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn contract_type_parses_wire_names() {
        let config = parse(
            r#"
            [bot]
            name = "digit-bot"
            id = "bot-002"

            [executor]
            symbol = "R_100"
            contract_type = "DIGITDIFF"

            [risk]
            base_stake = "0.35"
            daily_loss_floor = "10.00"
            daily_profit_ceiling = "20.00"
            "#,
        );
        assert_eq!(config.executor.contract_type, ContractType::DigitDiff);
    }
}
