//! Shared fixtures: a scripted in-memory ledger and deterministic wallets.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use xrpl_escrow::wallet::{KeyType, Seed};
use xrpl_escrow::{
    EscrowCreate, LedgerClient, LedgerError, LedgerResult, LedgerSession, PreparedTx, SignedTx,
    SubmissionResult, WalletSession,
};

pub const ENDPOINT: &str = "wss://ledger.test:51233";

/// Seed string for a deterministic test wallet.
pub fn seed(byte: u8) -> String {
    Seed::from_entropy([byte; 16], KeyType::Secp256k1).encode()
}

pub fn wallet(byte: u8) -> WalletSession {
    WalletSession::import_from_secret(&seed(byte)).expect("wallet")
}

/// A real, decodable classic address nobody holds a seed for in these tests.
pub fn destination() -> String {
    wallet(0xDD).address().to_string()
}

/// Ledger that answers from a script and records every call in order.
#[derive(Default)]
pub struct MockLedger {
    calls: Mutex<Vec<String>>,
    connect_error: Option<LedgerError>,
    connect_delay: Option<Duration>,
    autofill_error: Option<LedgerError>,
    submit_error: Option<LedgerError>,
    submit_delay: Option<Duration>,
    meta: Option<Value>,
    balance: f64,
    unsigned: Mutex<Vec<EscrowCreate>>,
    signed: Mutex<Vec<SignedTx>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self { meta: Some(json!({"TransactionResult": "tesSUCCESS"})), balance: 100.0, ..Default::default() }
    }

    pub fn with_connect_error(mut self, err: LedgerError) -> Self { self.connect_error = Some(err); self }
    pub fn with_connect_delay(mut self, delay: Duration) -> Self { self.connect_delay = Some(delay); self }
    pub fn with_autofill_error(mut self, err: LedgerError) -> Self { self.autofill_error = Some(err); self }
    pub fn with_submit_error(mut self, err: LedgerError) -> Self { self.submit_error = Some(err); self }
    pub fn with_submit_delay(mut self, delay: Duration) -> Self { self.submit_delay = Some(delay); self }
    pub fn with_meta(mut self, meta: Option<Value>) -> Self { self.meta = meta; self }
    pub fn with_balance(mut self, balance: f64) -> Self { self.balance = balance; self }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than connect/disconnect.
    pub fn requests(&self) -> Vec<String> {
        self.calls().into_iter().filter(|c| c != "connect" && c != "disconnect").collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == name).count()
    }

    pub fn last_unsigned(&self) -> Option<EscrowCreate> {
        self.unsigned.lock().unwrap().last().cloned()
    }

    pub fn last_signed(&self) -> Option<SignedTx> {
        self.signed.lock().unwrap().last().cloned()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn connect(&self, _endpoint: &str) -> LedgerResult<()> {
        self.record("connect");
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.connect_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn disconnect(&self) -> LedgerResult<()> {
        self.record("disconnect");
        Ok(())
    }

    async fn autofill(&self, tx: &EscrowCreate) -> LedgerResult<PreparedTx> {
        self.record("autofill");
        self.unsigned.lock().unwrap().push(tx.clone());
        if let Some(err) = &self.autofill_error {
            return Err(err.clone());
        }
        Ok(PreparedTx { tx: tx.clone(), sequence: 7, fee: "12".into(), last_ledger_sequence: 120 })
    }

    async fn submit_and_wait(&self, signed: &SignedTx) -> LedgerResult<SubmissionResult> {
        self.record("submit");
        self.signed.lock().unwrap().push(signed.clone());
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.submit_error {
            return Err(err.clone());
        }
        Ok(SubmissionResult { hash: signed.hash.clone(), meta: self.meta.clone(), validated: true, ledger_index: Some(110) })
    }

    async fn fund_wallet(&self, address: &str) -> LedgerResult<f64> {
        self.record(format!("fund:{}", address));
        Ok(self.balance)
    }
}

/// A session already connected to `ledger`.
pub async fn connected(ledger: Arc<MockLedger>) -> LedgerSession {
    let session = LedgerSession::new(ledger);
    session.connect(ENDPOINT).await.expect("connect");
    session
}
