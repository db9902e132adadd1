use rust_decimal::Decimal;
use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("missing environment variable: {name}")]
    MissingEnv { name: &'static str },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Store adapter errors.
///
/// The transient/permanent split drives the retry policy: only
/// [`StoreError::is_transient`] kinds are retried, everything else
/// propagates to the caller immediately.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("store request timed out: {operation}")]
    Timeout { operation: &'static str },

    #[error("store returned {status} for {operation}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("store schema contract broken: {0}")]
    Schema(String),

    #[error("store rejected credentials: {0}")]
    Auth(String),

    #[error("failed to decode store row: {0}")]
    Decode(String),
}

impl StoreError {
    /// Whether the retry policy may re-attempt the operation.
    ///
    /// Connection failures, timeouts, rate limiting and server-side errors
    /// are transient. Schema and auth failures are contract violations and
    /// must surface to the caller unretried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Schema(_) | Self::Auth(_) | Self::Decode(_) => false,
        }
    }
}

/// Broker client errors.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("invalid proposal: {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Business-level rejections the admission logic must see
    /// (portfolio cap, insufficient funds, market closed).
    #[error("broker rejected request [{code}]: {message}")]
    Business { code: String, message: String },

    #[error("broker API error [{code}]: {message}")]
    Api { code: String, message: String },

    #[error("{endpoint} request timed out after {seconds}s")]
    Timeout { endpoint: &'static str, seconds: u64 },

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("no live connections in pool")]
    NoLiveConnections,

    #[error("request cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BrokerError {
    /// Transient errors trigger reconnection/backoff rather than failing
    /// the bot.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::WebSocket(_) | Self::ConnectionClosed(_)
        )
    }

    /// Fatal errors terminate the pool (and ultimately the bot).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::NoLiveConnections)
    }

    /// Business rejections are surfaced to admission logic; they are not
    /// retried blindly.
    #[must_use]
    pub fn is_business(&self) -> bool {
        matches!(self, Self::Business { .. })
    }
}

/// Pre-trade admission refusals.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RiskError {
    #[error("bot is configured inactive")]
    BotInactive,

    #[error("open contract cap reached: {open} >= {cap}")]
    OpenContractCap { open: usize, cap: usize },

    #[error("daily loss floor breached: {loss} <= -{floor}")]
    DailyLossFloor { loss: Decimal, floor: Decimal },

    #[error("daily profit ceiling reached: {profit} >= {ceiling}")]
    DailyProfitCeiling { profit: Decimal, ceiling: Decimal },

    #[error("signal is not safe to operate: {reason}")]
    SignalUnsafe { reason: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
