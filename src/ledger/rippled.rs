//! rippled client - tokio-tungstenite WebSocket JSON-RPC
//!
//! Requests carry a numeric `id`; the reader task routes each response back to
//! the waiting caller. Stream messages (`ledgerClosed`, ...) are ignored.

use super::types::{drops_to_xrp, EscrowCreate, PreparedTx, SignedTx, SubmissionResult};
use super::LedgerClient;
use crate::config::SessionConfig;
use crate::error::{LedgerError, LedgerResult};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const TESTNET_FAUCET: &str = "https://faucet.altnet.rippletest.net";
const DEVNET_FAUCET: &str = "https://faucet.devnet.rippletest.net";
const FUND_POLL_ATTEMPTS: usize = 20;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// One WebSocket connection. Its tasks only ever touch their own link.
struct Link {
    sender: mpsc::Sender<Message>,
    pending: Pending,
    open: Arc<AtomicBool>,
}

impl Link {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        let _ = self.sender.send(Message::Close(None)).await;
        self.open.store(false, Ordering::SeqCst);
        self.pending.lock().await.clear();
    }
}

/// rippled WebSocket client
pub struct RippledClient {
    config: SessionConfig,
    endpoint: RwLock<Option<String>>,
    link: RwLock<Option<Arc<Link>>>,
    next_id: AtomicU64,
    http: reqwest::Client,
}

impl RippledClient {
    pub fn new(config: SessionConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            endpoint: RwLock::new(None),
            link: RwLock::new(None),
            next_id: AtomicU64::new(1),
            http,
        }
    }

    /// Send one command and wait for its response `result`.
    pub async fn request(&self, command: &str, params: Value) -> LedgerResult<Value> {
        let link = self.link.read().await.clone().ok_or(LedgerError::NotConnected)?;
        if !link.is_open() {
            return Err(LedgerError::Connection("connection closed".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut body = match params {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        body.insert("id".into(), json!(id));
        body.insert("command".into(), json!(command));

        let (reply_tx, reply_rx) = oneshot::channel();
        link.pending.lock().await.insert(id, reply_tx);

        if link.sender.send(Message::Text(Value::Object(body).to_string())).await.is_err() {
            link.pending.lock().await.remove(&id);
            return Err(LedgerError::Connection("connection closed".into()));
        }
        tracing::debug!(id, command, "rippled request sent");

        let response = match tokio::time::timeout(self.config.request_timeout, reply_rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(LedgerError::Connection("connection closed".into())),
            Err(_) => {
                link.pending.lock().await.remove(&id);
                return Err(LedgerError::network(format!("{} timed out", command)));
            }
        };
        parse_response(response)
    }

    async fn current_ledger(&self) -> LedgerResult<u32> {
        let result = self.request("ledger_current", json!({})).await?;
        let index = result["ledger_current_index"]
            .as_u64()
            .ok_or_else(|| LedgerError::network("ledger_current: missing ledger_current_index"))?;
        to_u32(index, "ledger_current_index")
    }

    async fn open_ledger_fee(&self) -> LedgerResult<u64> {
        let result = self.request("fee", json!({})).await?;
        let drops = &result["drops"];
        let fee = drops["open_ledger_fee"]
            .as_str()
            .or_else(|| drops["base_fee"].as_str())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| LedgerError::network("fee: missing drops"))?;
        Ok(fee.min(self.config.max_fee_drops))
    }

    async fn wait_for_validation(&self, hash: &str, last_ledger: Option<u32>, preliminary: &str) -> LedgerResult<SubmissionResult> {
        loop {
            tokio::time::sleep(self.config.poll_interval).await;

            match self.request("tx", json!({"transaction": hash})).await {
                Ok(result) if result["validated"].as_bool() == Some(true) => {
                    let ledger_index = match result["ledger_index"].as_u64() {
                        Some(index) => Some(to_u32(index, "ledger_index")?),
                        None => None,
                    };
                    return Ok(SubmissionResult {
                        hash: result["hash"].as_str().unwrap_or(hash).to_string(),
                        meta: result.get("meta").cloned(),
                        validated: true,
                        ledger_index,
                    });
                }
                Ok(_) => {}
                Err(LedgerError::Network { ref message, .. }) if message.starts_with("txnNotFound") => {}
                Err(e) => return Err(e),
            }

            if let Some(last) = last_ledger {
                let current = self.current_ledger().await?;
                if current > last {
                    return Err(LedgerError::rejected(
                        format!("transaction {} not validated by ledger {}", hash, last),
                        preliminary,
                    ));
                }
            }
        }
    }

    async fn faucet_url(&self) -> LedgerResult<String> {
        if let Some(url) = &self.config.faucet_url {
            return Ok(url.trim_end_matches('/').to_string());
        }
        let endpoint = self.endpoint.read().await.clone().unwrap_or_default();
        faucet_for_endpoint(&endpoint)
            .map(str::to_string)
            .ok_or_else(|| LedgerError::network(format!("no faucet for this network ({})", endpoint)))
    }

    async fn account_balance(&self, address: &str) -> LedgerResult<Option<u64>> {
        match self.request("account_info", json!({"account": address, "ledger_index": "validated"})).await {
            Ok(info) => Ok(info["account_data"]["Balance"].as_str().and_then(|b| b.parse().ok())),
            Err(LedgerError::Network { ref message, .. }) if message.starts_with("actNotFound") => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl LedgerClient for RippledClient {
    async fn connect(&self, endpoint: &str) -> LedgerResult<()> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let (ws, _) = tokio::time::timeout(self.config.request_timeout, connect_async(endpoint))
            .await
            .map_err(|_| LedgerError::Connection(format!("timed out connecting to {}", endpoint)))?
            .map_err(|e| LedgerError::Connection(e.to_string()))?;
        let (mut write, mut read) = ws.split();

        // Channel for outgoing messages
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(32);
        let link = Arc::new(Link {
            sender: out_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            open: Arc::new(AtomicBool::new(true)),
        });

        // Spawn writer task
        let open_w = link.open.clone();
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if write.send(msg).await.is_err() || closing {
                    break;
                }
            }
            let _ = write.close().await;
            open_w.store(false, Ordering::SeqCst);
        });

        // Spawn reader task
        let pending = link.pending.clone();
        let open_r = link.open.clone();
        tokio::spawn(async move {
            while let Some(Ok(msg)) = read.next().await {
                match msg {
                    Message::Text(txt) => route_response(&pending, &txt).await,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            open_r.store(false, Ordering::SeqCst);
            // Dropping the senders wakes every waiter with a closed-channel error
            pending.lock().await.clear();
            tracing::debug!("rippled reader finished");
        });

        let previous = self.link.write().await.replace(link);
        if let Some(previous) = previous {
            previous.close().await;
        }
        *self.endpoint.write().await = Some(endpoint.to_string());
        Ok(())
    }

    async fn disconnect(&self) -> LedgerResult<()> {
        let link = self.link.write().await.take();
        if let Some(link) = link {
            link.close().await;
        }
        Ok(())
    }

    async fn autofill(&self, tx: &EscrowCreate) -> LedgerResult<PreparedTx> {
        let info = self
            .request("account_info", json!({"account": tx.account, "ledger_index": "current"}))
            .await?;
        let sequence = info["account_data"]["Sequence"]
            .as_u64()
            .ok_or_else(|| LedgerError::network("account_info: missing Sequence"))?;
        let sequence = to_u32(sequence, "Sequence")?;
        let fee = self.open_ledger_fee().await?;
        let current = self.current_ledger().await?;
        let last_ledger_sequence = current
            .checked_add(self.config.ledger_offset)
            .ok_or_else(|| LedgerError::network(format!("ledger_current_index out of range: {}", current)))?;

        Ok(PreparedTx {
            tx: tx.clone(),
            sequence,
            fee: fee.to_string(),
            last_ledger_sequence,
        })
    }

    async fn submit_and_wait(&self, signed: &SignedTx) -> LedgerResult<SubmissionResult> {
        let submit = self.request("submit", json!({"tx_blob": signed.tx_blob})).await?;
        let preliminary = submit["engine_result"].as_str().unwrap_or_default().to_string();
        let hash = submit["tx_json"]["hash"].as_str().unwrap_or(&signed.hash).to_string();

        if is_final_rejection(&preliminary) {
            let message = submit["engine_result_message"].as_str().unwrap_or(&preliminary).to_string();
            return Err(LedgerError::rejected(message, preliminary));
        }
        tracing::info!(%hash, %preliminary, "Transaction submitted, waiting for validation");

        tokio::time::timeout(
            self.config.submit_timeout,
            self.wait_for_validation(&hash, signed.last_ledger_sequence, &preliminary),
        )
        .await
        .map_err(|_| LedgerError::network(format!("timed out waiting for {} to validate", hash)))?
    }

    async fn fund_wallet(&self, address: &str) -> LedgerResult<f64> {
        let faucet = self.faucet_url().await?;
        let response = self
            .http
            .post(format!("{}/accounts", faucet))
            .json(&json!({"destination": address}))
            .send()
            .await
            .map_err(|e| LedgerError::network(format!("faucet: {}", e)))?;
        if !response.status().is_success() {
            return Err(LedgerError::network(format!("faucet returned {}", response.status())));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| LedgerError::network(format!("faucet: {}", e)))?;
        tracing::info!(%address, amount = %body["amount"], "Faucet accepted funding request");

        for _ in 0..FUND_POLL_ATTEMPTS {
            if let Some(drops) = self.account_balance(address).await? {
                return Ok(drops_to_xrp(drops));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        Err(LedgerError::network(format!("funded account {} did not appear on ledger", address)))
    }
}

/// Faucet for a public test network, inferred from the endpoint host.
pub fn faucet_for_endpoint(endpoint: &str) -> Option<&'static str> {
    let endpoint = endpoint.to_ascii_lowercase();
    if endpoint.contains("altnet") || endpoint.contains("testnet") {
        Some(TESTNET_FAUCET)
    } else if endpoint.contains("devnet") {
        Some(DEVNET_FAUCET)
    } else {
        None
    }
}

fn to_u32(value: u64, field: &str) -> LedgerResult<u32> {
    u32::try_from(value).map_err(|_| LedgerError::network(format!("{} out of range: {}", field, value)))
}

/// `tem`/`tef`/`tel` results are never applied; no point waiting for validation.
fn is_final_rejection(engine_result: &str) -> bool {
    ["tem", "tef", "tel"].iter().any(|p| engine_result.starts_with(p))
}

async fn route_response(pending: &Pending, msg: &str) {
    let Ok(value) = serde_json::from_str::<Value>(msg) else { return };
    let Some(id) = value.get("id").and_then(Value::as_u64) else { return };
    if let Some(waiter) = pending.lock().await.remove(&id) {
        let _ = waiter.send(value);
    }
}

/// Map a rippled response envelope to its `result`, or a network error.
fn parse_response(response: Value) -> LedgerResult<Value> {
    if response["status"].as_str() == Some("error") {
        let code = response["error"].as_str().unwrap_or("error");
        let message = match response["error_message"].as_str() {
            Some(detail) => format!("{}: {}", code, detail),
            None => code.to_string(),
        };
        let engine_result = response["result"]["engine_result"]
            .as_str()
            .or_else(|| response["engine_result"].as_str())
            .map(str::to_string);
        return Err(LedgerError::Network { message, engine_result });
    }
    Ok(response.get("result").cloned().unwrap_or(Value::Null))
}
