//! xrpl-escrow: time-locked XRP Ledger escrows from a single session.
//!
//! # Architecture
//!
//! ```text
//! SessionCoordinator (entry point)
//!   │
//!   ├── LedgerSession ── LedgerClient (trait)
//!   │                        └── RippledClient (WebSocket JSON-RPC + faucet)
//!   │
//!   ├── WalletSession (seed → keypair → address, signing)
//!   │
//!   └── EscrowWorkflow
//!         validate → build → autofill → sign → submit_and_wait → classify
//! ```
//!
//! # Actions
//!
//! | Action | Method | Description |
//! |--------|--------|-------------|
//! | import | `coordinator.import_wallet(secret)` | Replace the active wallet |
//! | disconnect | `coordinator.disconnect_wallet()` | Drop the active wallet |
//! | generate | `coordinator.generate_funded_wallet()` | New wallet, funded by the faucet |
//! | escrow | `coordinator.submit_escrow(&request)` | Create one escrow |
//! | view | `coordinator.view()` | Connection state, address, status, hash |
//!
//! # Features
//!
//! - `rippled` - WebSocket transport and faucet client (default)
//! - `server` - HTTP session API (default)
//!
//! # Usage
//!
//! ```ignore
//! use xrpl_escrow::{EscrowRequest, SessionConfig, SessionCoordinator};
//!
//! let session = SessionCoordinator::start_rippled(SessionConfig::from_env()).await?;
//! session.import_wallet("sn3nxiW7v8KXzPzAqzyHXbSSKNuN9").await?;
//!
//! let outcome = session
//!     .submit_escrow(&EscrowRequest::new("rDestination…", "10").with_finish_after(1800))
//!     .await;
//! println!("{:?}", outcome.result_code);
//!
//! session.stop().await;
//! ```

pub mod config;
pub mod error;
pub mod escrow;
pub mod ledger;
pub mod logging;
pub mod session;
pub mod wallet;

#[cfg(feature = "server")]
pub mod server;

pub use config::{load_dotenv, SessionConfig};
pub use error::{LedgerError, LedgerResult};
pub use escrow::{sanitize_amount, xrp_to_drops, Clock, EscrowOutcome, EscrowRequest, EscrowWorkflow, SystemClock};
pub use ledger::{ConnectionState, EscrowCreate, LedgerClient, LedgerSession, PreparedTx, SignedTx, SubmissionResult};
pub use session::{FundingReport, SessionContext, SessionCoordinator, SessionView};
pub use wallet::{FundedWallet, KeyType, WalletSession};

#[cfg(feature = "rippled")]
pub use ledger::RippledClient;
#[cfg(feature = "server")]
pub use server::create_router;
