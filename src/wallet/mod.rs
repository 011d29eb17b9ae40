//! Wallet - in-memory signing identity
//!
//! A [`WalletSession`] exists only with secret material behind it. "No wallet"
//! is `None` at the coordinator, never a half-built value.
//!
//! ```text
//! secret ──Seed::decode──▶ Seed ──Keypair::from_seed──▶ Keypair ──▶ address
//!                                                          │
//!                                   PreparedTx ──codec::sign──▶ SignedTx
//! ```

mod codec;
pub mod keys;

pub use codec::transaction_hash;
pub use keys::{is_valid_address, KeyType, Keypair, Seed};

use crate::error::LedgerResult;
use crate::ledger::{LedgerSession, PreparedTx, SignedTx};
use crate::LedgerError;
use std::fmt;

/// Signing identity for one session. Secret bytes are zeroized on drop.
pub struct WalletSession {
    address: String,
    seed: Seed,
    keypair: Keypair,
}

/// A freshly generated wallet and its faucet balance in XRP.
#[derive(Debug)]
pub struct FundedWallet {
    pub wallet: WalletSession,
    pub balance: f64,
}

impl WalletSession {
    /// Import from a family seed (`s…` or `sEd…`). Offline and deterministic.
    pub fn import_from_secret(secret: &str) -> LedgerResult<Self> {
        let seed = Seed::decode(secret)?;
        Self::from_seed(seed)
    }

    pub fn from_seed(seed: Seed) -> LedgerResult<Self> {
        let keypair = Keypair::from_seed(&seed)?;
        let address = keypair.address();
        Ok(Self { address, seed, keypair })
    }

    /// Random secp256k1 wallet. Not known to the network until funded.
    pub fn generate() -> LedgerResult<Self> {
        Self::generate_with(KeyType::default())
    }

    pub fn generate_with(key_type: KeyType) -> LedgerResult<Self> {
        Self::from_seed(Seed::random(key_type))
    }

    /// Generate a wallet locally and have the network faucet fund it.
    pub async fn request_funded(ledger: &LedgerSession) -> LedgerResult<FundedWallet> {
        if !ledger.is_connected().await {
            return Err(LedgerError::NotConnected);
        }
        let wallet = Self::generate()?;
        tracing::info!(address = %wallet.address, "Requesting faucet funding");
        let balance = ledger.fund_wallet(&wallet.address).await?;
        tracing::info!(address = %wallet.address, balance, "Wallet funded");
        Ok(FundedWallet { wallet, balance })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Hex public key as it appears in `SigningPubKey`.
    pub fn public_key(&self) -> String {
        hex::encode_upper(self.keypair.public_key())
    }

    pub fn key_type(&self) -> KeyType {
        self.seed.key_type()
    }

    /// The seed string. Only call on explicit user request.
    pub fn reveal_secret(&self) -> String {
        self.seed.encode()
    }

    /// Sign a prepared transaction. Network-free; `prepared` is not modified.
    pub fn sign(&self, prepared: &PreparedTx) -> LedgerResult<SignedTx> {
        let signed = codec::sign(prepared, &self.keypair, &self.address)?;
        tracing::debug!(hash = %signed.hash, "Transaction signed");
        Ok(signed)
    }
}

impl fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSession")
            .field("address", &self.address)
            .field("key_type", &self.seed.key_type())
            .finish_non_exhaustive()
    }
}
