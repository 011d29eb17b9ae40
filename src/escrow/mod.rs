//! Escrow workflow - validate, build, autofill, sign, submit, classify
//!
//! ```text
//! EscrowRequest ──validate──▶ EscrowCreate ──autofill──▶ PreparedTx
//!                                                            │ sign
//!                 EscrowOutcome ◀──classify── SubmissionResult ◀──submit_and_wait── SignedTx
//! ```
//!
//! `create` never returns an error. Every failure ends up in
//! [`EscrowOutcome::error_message`]; ledger rejections end up in
//! [`EscrowOutcome::result_code`].

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{EscrowCreate, LedgerSession, DROPS_PER_XRP, MAX_DROPS};
use crate::wallet::{is_valid_address, WalletSession};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

pub const MSG_NOT_INITIALIZED: &str = "Client or wallet not initialized";
pub const MSG_INVALID_AMOUNT: &str = "Please enter a valid amount";
pub const MSG_AMOUNT_PRECISION: &str = "Amount has too many decimal places";
pub const MSG_AMOUNT_TOO_LARGE: &str = "Amount exceeds the XRP supply";
pub const MSG_MISSING_DESTINATION: &str = "Please enter a destination";
pub const MSG_INVALID_DESTINATION: &str = "Please enter a valid destination address";
pub const MSG_INVALID_FINISH: &str = "Please enter a valid finish time";
pub const MSG_INVALID_CANCEL: &str = "Please enter a valid cancel time";
pub const MSG_CANCEL_BEFORE_FINISH: &str = "Cancel time must be after finish time";

/// Result code reported when validated metadata carries none.
pub const UNKNOWN_RESULT: &str = "Unknown";

const MAX_DECIMALS: usize = 6;

/// Source of "now" in Unix seconds.
pub trait Clock: Send + Sync {
    fn unix_now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Raw escrow parameters as the user typed them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRequest {
    #[serde(default)]
    pub destination: String,
    #[serde(default, alias = "amount")]
    pub amount_xrp: String,
    /// Seconds from now.
    #[serde(default, deserialize_with = "text_or_number")]
    pub finish_after: Option<String>,
    /// Seconds from now. Must exceed `finish_after`.
    #[serde(default, deserialize_with = "text_or_number")]
    pub cancel_after: Option<String>,
}

impl EscrowRequest {
    pub fn new(destination: impl Into<String>, amount_xrp: impl Into<String>) -> Self {
        Self { destination: destination.into(), amount_xrp: amount_xrp.into(), ..Default::default() }
    }

    pub fn with_finish_after(mut self, seconds: impl ToString) -> Self {
        self.finish_after = Some(seconds.to_string());
        self
    }

    pub fn with_cancel_after(mut self, seconds: impl ToString) -> Self {
        self.cancel_after = Some(seconds.to_string());
        self
    }
}

fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(n) => n.to_string(),
    }))
}

/// Classified result of one `create` attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EscrowOutcome {
    pub result_code: Option<String>,
    /// Set only when the transaction made it into a validated ledger.
    pub transaction_hash: Option<String>,
    pub error_message: Option<String>,
}

impl EscrowOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self { error_message: Some(message.into()), ..Default::default() }
    }

    pub fn classified(result_code: Option<&str>, transaction_hash: impl Into<String>) -> Self {
        Self {
            result_code: Some(result_code.unwrap_or(UNKNOWN_RESULT).to_string()),
            transaction_hash: Some(transaction_hash.into()),
            error_message: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_message.is_none() && self.result_code.as_deref() == Some(crate::ledger::TES_SUCCESS)
    }

    /// Text for a status display: the error, else the result code.
    pub fn status_message(&self) -> Option<&str> {
        self.error_message.as_deref().or(self.result_code.as_deref())
    }
}

/// Keep digits and the first decimal point; drop everything else.
pub fn sanitize_amount(input: &str) -> String {
    let mut seen_point = false;
    input
        .chars()
        .filter(|&c| match c {
            '0'..='9' => true,
            '.' if !seen_point => {
                seen_point = true;
                true
            }
            _ => false,
        })
        .collect()
}

/// Exact decimal XRP → drops conversion. Zero and negative amounts are invalid.
pub fn xrp_to_drops(amount: &str) -> LedgerResult<u64> {
    let amount = amount.trim();
    let invalid = || LedgerError::Validation(MSG_INVALID_AMOUNT.into());

    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > MAX_DECIMALS {
        return Err(LedgerError::Validation(MSG_AMOUNT_PRECISION.into()));
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let fraction_drops: u64 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = MAX_DECIMALS);
        padded.parse().map_err(|_| invalid())?
    };

    let drops = whole
        .checked_mul(DROPS_PER_XRP)
        .and_then(|d| d.checked_add(fraction_drops))
        .ok_or_else(invalid)?;
    if drops == 0 {
        return Err(invalid());
    }
    if drops > MAX_DROPS {
        return Err(LedgerError::Validation(MSG_AMOUNT_TOO_LARGE.into()));
    }
    Ok(drops)
}

fn parse_offset(raw: Option<&str>, message: &str) -> LedgerResult<Option<u64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse::<u64>().map(Some).map_err(|_| LedgerError::Validation(message.into())),
    }
}

/// Validated request with derived values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEscrow {
    pub destination: String,
    pub amount_drops: u64,
    pub finish_after: u64,
    pub cancel_after: Option<u64>,
}

pub struct EscrowWorkflow {
    clock: Arc<dyn Clock>,
}

impl Default for EscrowWorkflow {
    fn default() -> Self {
        Self { clock: Arc::new(SystemClock) }
    }
}

impl EscrowWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Field checks, in the order the user sees them.
    pub fn validate(&self, request: &EscrowRequest) -> LedgerResult<ValidatedEscrow> {
        let amount_drops = xrp_to_drops(&request.amount_xrp)?;

        let destination = request.destination.trim();
        if destination.is_empty() {
            return Err(LedgerError::Validation(MSG_MISSING_DESTINATION.into()));
        }
        if !is_valid_address(destination) {
            return Err(LedgerError::Validation(MSG_INVALID_DESTINATION.into()));
        }

        let finish_after = parse_offset(request.finish_after.as_deref(), MSG_INVALID_FINISH)?
            .ok_or_else(|| LedgerError::Validation(MSG_INVALID_FINISH.into()))?;
        let cancel_after = parse_offset(request.cancel_after.as_deref(), MSG_INVALID_CANCEL)?;
        if matches!(cancel_after, Some(cancel) if cancel <= finish_after) {
            return Err(LedgerError::Validation(MSG_CANCEL_BEFORE_FINISH.into()));
        }

        Ok(ValidatedEscrow { destination: destination.to_string(), amount_drops, finish_after, cancel_after })
    }

    /// Unsigned transaction with offsets resolved against the clock.
    pub fn build(&self, account: &str, escrow: &ValidatedEscrow) -> LedgerResult<EscrowCreate> {
        let now = self.clock.unix_now();
        let at = |offset: u64| -> LedgerResult<u32> {
            i64::try_from(offset)
                .ok()
                .and_then(|o| now.checked_add(o))
                .and_then(|t| u32::try_from(t).ok())
                .ok_or_else(|| LedgerError::Validation(format!("time offset out of range: {}", offset)))
        };

        let mut tx = EscrowCreate::new(account, &escrow.destination, escrow.amount_drops)
            .with_finish_after(at(escrow.finish_after)?);
        if let Some(cancel) = escrow.cancel_after {
            tx = tx.with_cancel_after(at(cancel)?);
        }
        Ok(tx)
    }

    /// One attempt, no retry. Steps run strictly validate → autofill → sign → submit.
    pub async fn create(
        &self,
        request: &EscrowRequest,
        ledger: Option<&LedgerSession>,
        wallet: Option<&WalletSession>,
    ) -> EscrowOutcome {
        let ready = match ledger {
            Some(ledger) => ledger.is_connected().await,
            None => false,
        };
        let (Some(ledger), Some(wallet), true) = (ledger, wallet, ready) else {
            tracing::warn!("Escrow requested without a connected ledger and wallet");
            return EscrowOutcome::failed(MSG_NOT_INITIALIZED);
        };

        let escrow = match self.validate(request) {
            Ok(escrow) => escrow,
            Err(e) => {
                tracing::debug!(error = %e, "Escrow request rejected");
                return EscrowOutcome::failed(e.to_string());
            }
        };

        match self.submit(&escrow, ledger, wallet).await {
            Ok(outcome) => {
                tracing::info!(
                    result = outcome.result_code.as_deref().unwrap_or(UNKNOWN_RESULT),
                    hash = outcome.transaction_hash.as_deref().unwrap_or(""),
                    "Escrow validated"
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(error = %e, "Escrow submission failed");
                EscrowOutcome::failed(e.status_text())
            }
        }
    }

    async fn submit(
        &self,
        escrow: &ValidatedEscrow,
        ledger: &LedgerSession,
        wallet: &WalletSession,
    ) -> LedgerResult<EscrowOutcome> {
        let unsigned = self.build(wallet.address(), escrow)?;
        tracing::debug!(destination = %unsigned.destination, amount = %unsigned.amount, "Autofilling escrow");

        let prepared = ledger.autofill(&unsigned).await?;
        tracing::debug!(sequence = prepared.sequence, fee = %prepared.fee, "Escrow autofilled");

        let signed = wallet.sign(&prepared)?;
        tracing::info!(hash = %signed.hash, "Submitting escrow");

        let result = ledger.submit_and_wait(&signed).await?;
        let code = result.engine_result().map(str::to_string);
        Ok(EscrowOutcome::classified(code.as_deref(), result.hash))
    }
}
