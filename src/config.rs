//! Session configuration - passed from higher layers

use crate::error::{LedgerError, LedgerResult};
use std::path::Path;
use std::time::Duration;

pub const ENV_RPC_URL: &str = "XRPL_RPC_URL";
pub const ENV_FAUCET_URL: &str = "XRPL_FAUCET_URL";
pub const ENV_EXPLORER_HOST: &str = "XRPL_EXPLORER_HOST";

pub const DEFAULT_EXPLORER_HOST: &str = "testnet.xrpl.org";

/// Session configuration. Higher layers construct this.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint_url: Option<String>,
    /// Faucet base URL. Inferred from the endpoint host when unset.
    pub faucet_url: Option<String>,
    pub explorer_host: String,
    pub request_timeout: Duration,
    pub submit_timeout: Duration,
    pub poll_interval: Duration,
    /// Upper bound on the autofilled fee.
    pub max_fee_drops: u64,
    /// `LastLedgerSequence` = current ledger + this offset.
    pub ledger_offset: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            faucet_url: None,
            explorer_host: DEFAULT_EXPLORER_HOST.into(),
            request_timeout: Duration::from_secs(20),
            submit_timeout: Duration::from_secs(90),
            poll_interval: Duration::from_secs(1),
            max_fee_drops: 2_000_000,
            ledger_offset: 20,
        }
    }
}

impl SessionConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint_url: Some(endpoint.into()), ..Default::default() }
    }

    pub fn testnet() -> Self { Self::new("wss://s.altnet.rippletest.net:51233") }
    pub fn devnet() -> Self { Self::new("wss://s.devnet.rippletest.net:51233").with_explorer_host("devnet.xrpl.org") }

    pub fn with_faucet(mut self, url: impl Into<String>) -> Self { self.faucet_url = Some(url.into()); self }
    pub fn with_explorer_host(mut self, host: impl Into<String>) -> Self { self.explorer_host = host.into(); self }
    pub fn with_request_timeout(mut self, t: Duration) -> Self { self.request_timeout = t; self }
    pub fn with_submit_timeout(mut self, t: Duration) -> Self { self.submit_timeout = t; self }
    pub fn with_poll_interval(mut self, t: Duration) -> Self { self.poll_interval = t; self }
    pub fn with_max_fee_drops(mut self, drops: u64) -> Self { self.max_fee_drops = drops; self }

    /// Build from `XRPL_RPC_URL`, `XRPL_FAUCET_URL` and `XRPL_EXPLORER_HOST`.
    /// A missing endpoint is not an error here; [`SessionConfig::endpoint`] reports it.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.endpoint_url = non_empty_env(ENV_RPC_URL);
        config.faucet_url = non_empty_env(ENV_FAUCET_URL);
        if let Some(host) = non_empty_env(ENV_EXPLORER_HOST) {
            config.explorer_host = host;
        }
        config
    }

    /// The configured endpoint, or `Configuration` if unset or blank.
    pub fn endpoint(&self) -> LedgerResult<&str> {
        match self.endpoint_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(LedgerError::Configuration(format!("ledger endpoint not set ({})", ENV_RPC_URL))),
        }
    }

    pub fn explorer_url(&self, hash: &str) -> String {
        format!("https://{}/transactions/{}", self.explorer_host, hash)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Load `KEY=VALUE` lines from a `.env` file. Variables already set win.
/// Returns the number of variables applied; a missing file applies none.
pub fn load_dotenv(path: impl AsRef<Path>) -> usize {
    let Ok(contents) = std::fs::read_to_string(path.as_ref()) else { return 0 };
    let mut applied = 0;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().trim_start_matches("export ").trim();
            let value = value.trim().trim_matches('"');
            if !key.is_empty() && !value.is_empty() && std::env::var(key).is_err() {
                std::env::set_var(key, value);
                applied += 1;
            }
        }
    }
    applied
}
