//! Error taxonomy for the ledger session.
//!
//! Ledger rejections (e.g. `tecUNFUNDED`) are not errors: they come back as an
//! [`EscrowOutcome`](crate::escrow::EscrowOutcome) result code.

use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Missing or empty endpoint. Fatal, raised before any connection attempt.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to connect: {0}")]
    Connection(String),

    #[error("Not connected to ledger")]
    NotConnected,

    /// Transport or server failure. `engine_result` carries the rippled
    /// engine code when the server reported one.
    #[error("{message}")]
    Network {
        message: String,
        engine_result: Option<String>,
    },

    #[error("Invalid seed: {0}")]
    InvalidSecret(String),

    #[error("{0}")]
    Validation(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Used outside session scope")]
    OutsideSession,
}

impl LedgerError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into(), engine_result: None }
    }

    pub fn rejected(message: impl Into<String>, engine_result: impl Into<String>) -> Self {
        Self::Network { message: message.into(), engine_result: Some(engine_result.into()) }
    }

    /// Engine result code reported by the network, if any.
    pub fn engine_result(&self) -> Option<&str> {
        match self {
            Self::Network { engine_result, .. } => engine_result.as_deref(),
            _ => None,
        }
    }

    /// Text shown to the user: the engine code when present, else the error text.
    pub fn status_text(&self) -> String {
        self.engine_result().map(str::to_string).unwrap_or_else(|| self.to_string())
    }
}
