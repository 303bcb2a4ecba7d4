use qvote_ledger::LedgerError;
use qvote_registry::RegistryError;
use qvote_settlement::{GatewayError, SettlementError};
use qvote_types::{ErrorCategory, OracleError, TokenError};
use qvote_weight::WeightError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("weight error: {0}")]
    Weight(#[from] WeightError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error("config error: {0}")]
    Config(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Registry(e) => e.category(),
            Self::Ledger(e) => e.category(),
            Self::Weight(e) => e.category(),
            Self::Gateway(e) => e.category(),
            Self::Settlement(e) => e.category(),
            Self::Oracle(e) => e.category(),
            Self::Token(e) => e.category(),
            Self::Config(_) => ErrorCategory::Validation,
            Self::Io(_) => ErrorCategory::Transport,
            Self::Metrics(_) | Self::Task(_) => ErrorCategory::Internal,
        }
    }
}
