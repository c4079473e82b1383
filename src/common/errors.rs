//! Error types for the application

use thiserror::Error;

/// Result type alias using our TradingError
pub type Result<T> = std::result::Result<T, TradingError>;

/// Main error type for registry, routing and reconciliation operations
#[derive(Error, Debug)]
pub enum TradingError {
    /// Malformed or missing order intent fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown symbol, order or account, or zero lookup candidates
    #[error("Not found: {0}")]
    NotFound(String),

    /// More than one contract candidate matched a lookup
    #[error("Ambiguous symbol {symbol}: {candidates} candidates matched")]
    AmbiguousSymbol { symbol: String, candidates: usize },

    /// Identity collision in the symbol registry (absorbed and logged)
    #[error("Identity conflict: {0}")]
    Conflict(String),

    /// Broker adapter call failed or timed out
    #[error("Broker call failed: {0}")]
    BrokerCall(String),

    /// Durable symbol store unreachable or rejected a write
    #[error("Registry persistence error: {0}")]
    RegistryPersistence(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable error classification exposed to the command/RPC layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AmbiguousSymbol,
    Conflict,
    BrokerCall,
    RegistryPersistence,
    Configuration,
    Internal,
}

impl ErrorKind {
    /// Wire-level code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AmbiguousSymbol => "AMBIGUOUS_SYMBOL",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::BrokerCall => "BROKER_CALL",
            ErrorKind::RegistryPersistence => "REGISTRY_PERSISTENCE",
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl TradingError {
    /// Classify this error for callers that need a stable code
    pub fn kind(&self) -> ErrorKind {
        match self {
            TradingError::Validation(_) => ErrorKind::Validation,
            TradingError::NotFound(_) => ErrorKind::NotFound,
            TradingError::AmbiguousSymbol { .. } => ErrorKind::AmbiguousSymbol,
            TradingError::Conflict(_) => ErrorKind::Conflict,
            TradingError::BrokerCall(_) => ErrorKind::BrokerCall,
            TradingError::RegistryPersistence(_) => ErrorKind::RegistryPersistence,
            TradingError::Configuration(_) => ErrorKind::Configuration,
            TradingError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Human-readable rejection reason, prefixed with the stable code
    pub fn reason(&self) -> String {
        format!("[{}] {}", self.kind(), self)
    }
}

impl From<sqlx::Error> for TradingError {
    fn from(err: sqlx::Error) -> Self {
        TradingError::RegistryPersistence(err.to_string())
    }
}

impl From<serde_json::Error> for TradingError {
    fn from(err: serde_json::Error) -> Self {
        TradingError::Validation(err.to_string())
    }
}
