//! Ledger - connection lifecycle and request contract
//!
//! [`LedgerSession`] owns the connection state machine. The transport behind it
//! is a [`LedgerClient`]; the crate ships [`RippledClient`] (WebSocket JSON-RPC)
//! and tests plug in fakes.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──ok──▶ Connected ──disconnect──▶ Disconnected
//!                                │
//!                                └──err──▶ Failed(reason)   (terminal until connect)
//! ```

mod session;
pub mod types;
#[cfg(feature = "rippled")]
pub mod rippled;

pub use session::{ConnectionState, LedgerSession};
pub use types::{drops_to_xrp, EscrowCreate, PreparedTx, SignedTx, SubmissionResult, TransactionType, DROPS_PER_XRP, MAX_DROPS, TES_SUCCESS};
#[cfg(feature = "rippled")]
pub use rippled::RippledClient;

use crate::error::LedgerResult;
use async_trait::async_trait;

/// Request/response contract with the ledger network.
///
/// Implementations must make `disconnect` idempotent. A lost transport is
/// reported as [`LedgerError::Connection`](crate::LedgerError::Connection).
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn connect(&self, endpoint: &str) -> LedgerResult<()>;
    async fn disconnect(&self) -> LedgerResult<()>;
    /// Fill `Sequence`, `Fee` and `LastLedgerSequence` from current ledger state.
    async fn autofill(&self, tx: &EscrowCreate) -> LedgerResult<PreparedTx>;
    /// Submit and wait until the transaction appears in a validated ledger.
    async fn submit_and_wait(&self, signed: &SignedTx) -> LedgerResult<SubmissionResult>;
    /// Ask the network faucet to fund `address`. Returns the balance in XRP.
    async fn fund_wallet(&self, address: &str) -> LedgerResult<f64>;
}
