//! Transaction values exchanged with the ledger.

use crate::error::{LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Drops per XRP.
pub const DROPS_PER_XRP: u64 = 1_000_000;

/// Largest native amount the ledger encodes: 100 billion XRP.
pub const MAX_DROPS: u64 = 100_000_000_000 * DROPS_PER_XRP;

/// Engine result of an applied, successful transaction.
pub const TES_SUCCESS: &str = "tesSUCCESS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    EscrowCreate,
}

impl TransactionType {
    /// Ledger type code used in the binary encoding.
    pub fn code(&self) -> u16 {
        match self {
            TransactionType::EscrowCreate => 1,
        }
    }
}

/// Unsigned `EscrowCreate`. Time fields are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EscrowCreate {
    pub transaction_type: TransactionType,
    pub account: String,
    /// Drops, as a decimal string.
    pub amount: String,
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_tag: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_after: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_after: Option<u32>,
}

impl EscrowCreate {
    pub fn new(account: impl Into<String>, destination: impl Into<String>, drops: u64) -> Self {
        Self {
            transaction_type: TransactionType::EscrowCreate,
            account: account.into(),
            amount: drops.to_string(),
            destination: destination.into(),
            destination_tag: None,
            finish_after: None,
            cancel_after: None,
        }
    }

    pub fn with_finish_after(mut self, at: u32) -> Self { self.finish_after = Some(at); self }
    pub fn with_cancel_after(mut self, at: u32) -> Self { self.cancel_after = Some(at); self }
    pub fn with_destination_tag(mut self, tag: u32) -> Self { self.destination_tag = Some(tag); self }

    pub fn amount_drops(&self) -> LedgerResult<u64> {
        parse_drops("Amount", &self.amount)
    }
}

/// An `EscrowCreate` with the ledger-required fields filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PreparedTx {
    #[serde(flatten)]
    pub tx: EscrowCreate,
    pub sequence: u32,
    /// Drops, as a decimal string.
    pub fee: String,
    pub last_ledger_sequence: u32,
}

impl PreparedTx {
    pub fn fee_drops(&self) -> LedgerResult<u64> {
        parse_drops("Fee", &self.fee)
    }
}

/// Signed transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedTx {
    /// Hex-encoded canonical binary.
    pub tx_blob: String,
    /// Locally computed transaction hash (uppercase hex).
    pub hash: String,
    pub last_ledger_sequence: Option<u32>,
}

/// Result of a submission that reached a validated ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResult {
    pub hash: String,
    pub meta: Option<Value>,
    pub validated: bool,
    pub ledger_index: Option<u32>,
}

impl SubmissionResult {
    /// `meta.TransactionResult`, when meta is an object carrying one.
    pub fn engine_result(&self) -> Option<&str> {
        self.meta.as_ref()?.as_object()?.get("TransactionResult")?.as_str()
    }
}

pub fn drops_to_xrp(drops: u64) -> f64 {
    drops as f64 / DROPS_PER_XRP as f64
}

fn parse_drops(field: &str, value: &str) -> LedgerResult<u64> {
    value
        .parse::<u64>()
        .map_err(|_| LedgerError::Signing(format!("{} is not an integer drop amount: {:?}", field, value)))
}
