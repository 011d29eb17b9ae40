//! HTTP routes for the session observables and actions

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::escrow::{EscrowOutcome, EscrowRequest};
use crate::session::{FundingReport, SessionCoordinator, SessionView};
use crate::LedgerError;

#[derive(Clone)]
pub struct SessionState { pub session: Arc<SessionCoordinator>, pub app_name: String }

impl SessionState {
    pub fn new(session: Arc<SessionCoordinator>, app_name: impl Into<String>) -> Self {
        Self { session, app_name: app_name.into() }
    }
}

#[derive(Deserialize)]
pub struct ImportRequest { secret: String }

#[derive(Debug, Serialize)]
pub struct ImportResponse { address: String }

#[derive(Debug, Serialize)]
pub struct EscrowResponse {
    #[serde(flatten)]
    outcome: EscrowOutcome,
    explorer_url: Option<String>,
}

type ApiError = (StatusCode, String);

pub fn create_router(session: Arc<SessionCoordinator>) -> Router { create_router_with_name(session, "xrpl-escrow") }

pub fn create_router_with_name(session: Arc<SessionCoordinator>, app_name: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/session", get(session_view))
        .route("/wallet/import", post(import_wallet))
        .route("/wallet/disconnect", post(disconnect_wallet))
        .route("/wallet/generate", post(generate_wallet))
        .route("/escrow", post(create_escrow))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(SessionState::new(session, app_name))
}

fn api_error(err: LedgerError) -> ApiError {
    let status = match &err {
        LedgerError::InvalidSecret(_) | LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::Network { .. } => StatusCode::BAD_GATEWAY,
        LedgerError::NotConnected | LedgerError::Connection(_) | LedgerError::OutsideSession => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        LedgerError::Configuration(_) | LedgerError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

async fn health(State(s): State<SessionState>) -> impl IntoResponse {
    let connection = s.session.view().await.connection_state;
    Json(json!({"status": "ok", "service": s.app_name, "ledger": connection.as_str()}))
}

async fn session_view(State(s): State<SessionState>) -> Json<SessionView> {
    Json(s.session.view().await)
}

async fn import_wallet(State(s): State<SessionState>, Json(payload): Json<ImportRequest>) -> Result<Json<ImportResponse>, ApiError> {
    match s.session.import_wallet(&payload.secret).await {
        Ok(address) => Ok(Json(ImportResponse { address })),
        Err(LedgerError::InvalidSecret(_)) => Err((StatusCode::BAD_REQUEST, crate::session::MSG_INVALID_SEED.into())),
        Err(e) => Err(api_error(e)),
    }
}

async fn disconnect_wallet(State(s): State<SessionState>) -> Result<Json<SessionView>, ApiError> {
    s.session.disconnect_wallet().await.map_err(api_error)?;
    Ok(Json(s.session.view().await))
}

async fn generate_wallet(State(s): State<SessionState>) -> Result<Json<FundingReport>, ApiError> {
    s.session.generate_funded_wallet().await.map(Json).map_err(api_error)
}

async fn create_escrow(State(s): State<SessionState>, Json(request): Json<EscrowRequest>) -> Json<EscrowResponse> {
    let outcome = s.session.submit_escrow(&request).await;
    let explorer_url = outcome.transaction_hash.as_deref().map(|h| s.session.config().explorer_url(h));
    Json(EscrowResponse { outcome, explorer_url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::error::LedgerResult;
    use crate::ledger::{EscrowCreate, LedgerClient, PreparedTx, SignedTx, SubmissionResult};
    use async_trait::async_trait;

    struct OfflineLedger;

    #[async_trait]
    impl LedgerClient for OfflineLedger {
        async fn connect(&self, _endpoint: &str) -> LedgerResult<()> {
            Err(LedgerError::Connection("offline".into()))
        }
        async fn disconnect(&self) -> LedgerResult<()> { Ok(()) }
        async fn autofill(&self, _tx: &EscrowCreate) -> LedgerResult<PreparedTx> { Err(LedgerError::NotConnected) }
        async fn submit_and_wait(&self, _signed: &SignedTx) -> LedgerResult<SubmissionResult> { Err(LedgerError::NotConnected) }
        async fn fund_wallet(&self, _address: &str) -> LedgerResult<f64> { Err(LedgerError::NotConnected) }
    }

    async fn state() -> SessionState {
        let session = SessionCoordinator::start(SessionConfig::new("ws://127.0.0.1:1"), Arc::new(OfflineLedger))
            .await
            .unwrap();
        SessionState::new(Arc::new(session), "test")
    }

    #[tokio::test]
    async fn session_reports_failed_connection() {
        let s = state().await;
        let Json(view) = session_view(State(s)).await;
        assert_eq!(view.connection_state.as_str(), "failed");
        assert_eq!(view.status_message.as_deref(), Some("Failed to connect: offline"));
        assert_eq!(view.wallet_address, None);
    }

    #[tokio::test]
    async fn import_then_disconnect() {
        let s = state().await;
        let seed = crate::wallet::Seed::from_entropy([9; 16], crate::KeyType::Secp256k1).encode();

        let Json(imported) = import_wallet(State(s.clone()), Json(ImportRequest { secret: seed })).await.unwrap();
        let Json(view) = session_view(State(s.clone())).await;
        assert_eq!(view.wallet_address.as_deref(), Some(imported.address.as_str()));

        let Json(view) = disconnect_wallet(State(s.clone())).await.unwrap();
        assert_eq!(view.wallet_address, None);

        s.session.stop().await;
        let (status, _) = disconnect_wallet(State(s)).await.unwrap_err();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn invalid_seed_is_bad_request() {
        let s = state().await;
        let err = import_wallet(State(s), Json(ImportRequest { secret: "nope".into() })).await.unwrap_err();
        assert_eq!(err, (StatusCode::BAD_REQUEST, "Invalid seed".to_string()));
    }

    #[tokio::test]
    async fn escrow_without_connection_is_an_outcome() {
        let s = state().await;
        let request = EscrowRequest::new("rDest", "10").with_finish_after(60);
        let Json(response) = create_escrow(State(s), Json(request)).await;
        assert_eq!(response.outcome.error_message.as_deref(), Some("Client or wallet not initialized"));
        assert_eq!(response.explorer_url, None);
    }

    #[tokio::test]
    async fn generate_requires_connection() {
        let s = state().await;
        let (status, message) = generate_wallet(State(s)).await.unwrap_err();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(message, "Not connected to ledger");
    }
}
