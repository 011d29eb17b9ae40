//! LedgerSession - one persistent connection to a ledger endpoint

use super::{EscrowCreate, LedgerClient, PreparedTx, SignedTx, SubmissionResult};
use crate::error::{LedgerError, LedgerResult};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Connection state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed(String),
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed(_) => "failed",
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            ConnectionState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

pub struct LedgerSession {
    client: Arc<dyn LedgerClient>,
    state: RwLock<ConnectionState>,
    endpoint: RwLock<Option<String>>,
    connecting: Mutex<()>,
}

impl LedgerSession {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self {
            client,
            state: RwLock::new(ConnectionState::Disconnected),
            endpoint: RwLock::new(None),
            connecting: Mutex::new(()),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Connected
    }

    pub async fn endpoint(&self) -> Option<String> {
        self.endpoint.read().await.clone()
    }

    /// Connect to `endpoint`. A second caller while an attempt is in flight
    /// is rejected rather than queued.
    pub async fn connect(&self, endpoint: &str) -> LedgerResult<()> {
        let _attempt = self
            .connecting
            .try_lock()
            .map_err(|_| LedgerError::Connection("connection attempt already in progress".into()))?;

        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            let err = LedgerError::Configuration("ledger endpoint is empty".into());
            *self.state.write().await = ConnectionState::Failed(err.to_string());
            return Err(err);
        }

        if self.is_connected().await {
            return Ok(());
        }

        *self.endpoint.write().await = Some(endpoint.to_string());

        if !is_websocket_url(endpoint) {
            let err = LedgerError::Connection(format!("malformed endpoint URL: {}", endpoint));
            *self.state.write().await = ConnectionState::Failed(err.to_string());
            return Err(err);
        }

        *self.state.write().await = ConnectionState::Connecting;
        tracing::info!(%endpoint, "Connecting to ledger");

        match self.client.connect(endpoint).await {
            Ok(()) => {
                *self.state.write().await = ConnectionState::Connected;
                tracing::info!(%endpoint, "Ledger connected");
                Ok(())
            }
            Err(e) => {
                let err = match e {
                    LedgerError::Connection(_) | LedgerError::Configuration(_) => e,
                    other => LedgerError::Connection(other.to_string()),
                };
                tracing::warn!(%endpoint, error = %err, "Ledger connection failed");
                *self.state.write().await = ConnectionState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Close the connection. Safe from any state, any number of times.
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            tracing::warn!(error = %e, "Error while closing ledger connection");
        }
        let mut state = self.state.write().await;
        if *state != ConnectionState::Disconnected {
            tracing::info!("Ledger disconnected");
        }
        *state = ConnectionState::Disconnected;
    }

    pub async fn autofill(&self, tx: &EscrowCreate) -> LedgerResult<PreparedTx> {
        self.ensure_connected().await?;
        let result = self.client.autofill(tx).await;
        self.observe(result).await
    }

    pub async fn submit_and_wait(&self, signed: &SignedTx) -> LedgerResult<SubmissionResult> {
        self.ensure_connected().await?;
        let result = self.client.submit_and_wait(signed).await;
        self.observe(result).await
    }

    pub async fn fund_wallet(&self, address: &str) -> LedgerResult<f64> {
        self.ensure_connected().await?;
        let result = self.client.fund_wallet(address).await;
        self.observe(result).await
    }

    async fn ensure_connected(&self) -> LedgerResult<()> {
        if self.is_connected().await { Ok(()) } else { Err(LedgerError::NotConnected) }
    }

    /// A transport loss moves the session to `Failed` so no further requests are issued.
    async fn observe<T>(&self, result: LedgerResult<T>) -> LedgerResult<T> {
        if let Err(LedgerError::Connection(reason)) = &result {
            tracing::warn!(%reason, "Ledger connection lost");
            *self.state.write().await = ConnectionState::Failed(reason.clone());
        }
        result
    }
}

fn is_websocket_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("wss://")
        .or_else(|| url.strip_prefix("ws://"));
    matches!(rest, Some(r) if !r.is_empty() && !r.starts_with('/') && !r.contains(char::is_whitespace))
}
