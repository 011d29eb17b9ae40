//! Session coordinator - one ledger connection, at most one wallet
//!
//! ```text
//! SessionCoordinator
//!   ├── LedgerSession (Arc, owned; disconnected on stop/drop)
//!   ├── WalletSession (Option, replaced wholesale on import)
//!   ├── status / last hash (what a UI shows)
//!   └── EscrowWorkflow (one submission in flight at a time)
//! ```
//!
//! Workflow calls receive an explicit [`SessionContext`]. Once the coordinator
//! has been stopped, [`SessionCoordinator::context`] fails with
//! [`LedgerError::OutsideSession`].

use crate::config::SessionConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::escrow::{EscrowOutcome, EscrowRequest, EscrowWorkflow};
use crate::ledger::{ConnectionState, LedgerClient, LedgerSession};
use crate::wallet::WalletSession;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const MSG_SUBMISSION_IN_FLIGHT: &str = "Escrow submission already in progress";
pub const MSG_INVALID_SEED: &str = "Invalid seed";

/// What a presentation layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub connection_state: ConnectionState,
    pub wallet_address: Option<String>,
    pub status_message: Option<String>,
    pub transaction_hash: Option<String>,
    pub explorer_url: Option<String>,
}

/// Shared context handed to workflow calls.
#[derive(Clone)]
pub struct SessionContext {
    pub ledger: Arc<LedgerSession>,
    pub wallet: Option<Arc<WalletSession>>,
}

/// Result of `generate_funded_wallet`. The seed is shown once.
#[derive(Debug, Clone, Serialize)]
pub struct FundingReport {
    pub address: String,
    pub secret: String,
    pub balance: f64,
}

impl FundingReport {
    pub fn status_text(&self) -> String {
        format!("Addr: {}\nSeed: {}\nBalance: {}", self.address, self.secret, self.balance)
    }
}

pub struct SessionCoordinator {
    config: SessionConfig,
    ledger: Arc<LedgerSession>,
    wallet: RwLock<Option<Arc<WalletSession>>>,
    status: RwLock<Option<String>>,
    last_hash: RwLock<Option<String>>,
    submitting: AtomicBool,
    active: AtomicBool,
    workflow: EscrowWorkflow,
}

/// Clears the in-flight flag however the submission ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SessionCoordinator {
    /// Create the session and connect. Only a missing endpoint fails here;
    /// connection errors land in the view as `Failed` plus a status message.
    pub async fn start(config: SessionConfig, client: Arc<dyn LedgerClient>) -> LedgerResult<Self> {
        let endpoint = config.endpoint()?.to_string();
        let coordinator = Self {
            ledger: Arc::new(LedgerSession::new(client)),
            wallet: RwLock::new(None),
            status: RwLock::new(None),
            last_hash: RwLock::new(None),
            submitting: AtomicBool::new(false),
            active: AtomicBool::new(true),
            workflow: EscrowWorkflow::default(),
            config,
        };

        if let Err(e) = coordinator.ledger.connect(&endpoint).await {
            coordinator.set_status(e.to_string()).await;
        }
        Ok(coordinator)
    }

    /// Start with the WebSocket transport.
    #[cfg(feature = "rippled")]
    pub async fn start_rippled(config: SessionConfig) -> LedgerResult<Self> {
        let client = Arc::new(crate::ledger::RippledClient::new(config.clone()));
        Self::start(config, client).await
    }

    pub fn with_workflow(mut self, workflow: EscrowWorkflow) -> Self {
        self.workflow = workflow;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Disconnect the ledger. Runs once; later calls do nothing.
    pub async fn stop(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            tracing::info!("Stopping session");
            self.ledger.disconnect().await;
            *self.wallet.write().await = None;
        }
    }

    pub async fn context(&self) -> LedgerResult<SessionContext> {
        if !self.is_active() {
            return Err(LedgerError::OutsideSession);
        }
        let wallet = self.wallet.read().await.clone();
        Ok(SessionContext { ledger: self.ledger.clone(), wallet })
    }

    pub async fn view(&self) -> SessionView {
        let transaction_hash = self.last_hash.read().await.clone();
        SessionView {
            connection_state: self.ledger.state().await,
            wallet_address: self.wallet.read().await.as_ref().map(|w| w.address().to_string()),
            status_message: self.status.read().await.clone(),
            explorer_url: transaction_hash.as_deref().map(|h| self.config.explorer_url(h)),
            transaction_hash,
        }
    }

    pub async fn wallet_address(&self) -> Option<String> {
        self.wallet.read().await.as_ref().map(|w| w.address().to_string())
    }

    /// Replace the active wallet. On failure the previous wallet stays.
    pub async fn import_wallet(&self, secret: &str) -> LedgerResult<String> {
        self.context().await?;
        match WalletSession::import_from_secret(secret) {
            Ok(wallet) => {
                let address = wallet.address().to_string();
                tracing::info!(%address, "Wallet imported");
                *self.wallet.write().await = Some(Arc::new(wallet));
                *self.status.write().await = None;
                Ok(address)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Wallet import rejected");
                self.set_status(MSG_INVALID_SEED).await;
                Err(e)
            }
        }
    }

    pub async fn disconnect_wallet(&self) -> LedgerResult<()> {
        self.context().await?;
        if self.wallet.write().await.take().is_some() {
            tracing::info!("Wallet disconnected");
        }
        *self.status.write().await = None;
        Ok(())
    }

    /// Generate a wallet, fund it from the faucet and make it the active wallet.
    pub async fn generate_funded_wallet(&self) -> LedgerResult<FundingReport> {
        let ctx = self.context().await?;
        self.set_status("Generating...").await;

        match WalletSession::request_funded(&ctx.ledger).await {
            Ok(funded) => {
                let report = FundingReport {
                    address: funded.wallet.address().to_string(),
                    secret: funded.wallet.reveal_secret(),
                    balance: funded.balance,
                };
                *self.wallet.write().await = Some(Arc::new(funded.wallet));
                self.set_status(report.status_text()).await;
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Funded wallet request failed");
                self.set_status(e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Run one escrow creation. Refused while another is outstanding.
    pub async fn submit_escrow(&self, request: &EscrowRequest) -> EscrowOutcome {
        let Some(_in_flight) = InFlight::acquire(&self.submitting) else {
            tracing::debug!("Escrow submission refused: one already in flight");
            return EscrowOutcome::failed(MSG_SUBMISSION_IN_FLIGHT);
        };

        let outcome = match self.context().await {
            Ok(ctx) => self.workflow.create(request, Some(&ctx.ledger), ctx.wallet.as_deref()).await,
            Err(e) => EscrowOutcome::failed(e.to_string()),
        };

        *self.last_hash.write().await = outcome.transaction_hash.clone();
        *self.status.write().await = outcome.status_message().map(str::to_string);
        outcome
    }

    pub async fn explorer_url(&self) -> Option<String> {
        self.last_hash.read().await.as_deref().map(|h| self.config.explorer_url(h))
    }

    async fn set_status(&self, message: impl Into<String>) {
        *self.status.write().await = Some(message.into());
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        let ledger = self.ledger.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { ledger.disconnect().await });
            }
            Err(_) => tracing::warn!("Session dropped outside a runtime; ledger not disconnected"),
        }
    }
}
