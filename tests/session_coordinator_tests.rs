//! SessionCoordinator: lifecycle, wallet actions and submission serialization

mod common;

use common::{destination, seed, MockLedger, ENDPOINT};
use std::sync::Arc;
use std::time::Duration;
use xrpl_escrow::session::{MSG_INVALID_SEED, MSG_SUBMISSION_IN_FLIGHT};
use xrpl_escrow::{ConnectionState, EscrowRequest, LedgerError, SessionConfig, SessionCoordinator};

async fn start(ledger: Arc<MockLedger>) -> SessionCoordinator {
    SessionCoordinator::start(SessionConfig::new(ENDPOINT), ledger).await.expect("start")
}

fn request() -> EscrowRequest {
    EscrowRequest::new(destination(), "10").with_finish_after(1800).with_cancel_after(3600)
}

#[tokio::test]
async fn start_connects_once() {
    let ledger = MockLedger::new().arc();
    let session = start(ledger.clone()).await;

    let view = session.view().await;
    assert_eq!(view.connection_state, ConnectionState::Connected);
    assert_eq!(view.wallet_address, None);
    assert_eq!(view.status_message, None);
    assert_eq!(ledger.count("connect"), 1);
}

#[tokio::test]
async fn missing_endpoint_fails_before_connecting() {
    let ledger = MockLedger::new().arc();
    let err = SessionCoordinator::start(SessionConfig::default(), ledger.clone()).await.err().unwrap();
    assert!(matches!(err, LedgerError::Configuration(_)));
    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn connection_failure_is_a_status() {
    let ledger = MockLedger::new()
        .with_connect_error(LedgerError::Connection("refused".into()))
        .arc();
    let session = start(ledger).await;

    let view = session.view().await;
    assert!(matches!(view.connection_state, ConnectionState::Failed(_)));
    assert_eq!(view.status_message.as_deref(), Some("Failed to connect: refused"));

    session.import_wallet(&seed(1)).await.unwrap();
    let outcome = session.submit_escrow(&request()).await;
    assert_eq!(outcome.error_message.as_deref(), Some("Client or wallet not initialized"));
}

#[tokio::test]
async fn invalid_import_keeps_previous_wallet() {
    let session = start(MockLedger::new().arc()).await;

    let address = session.import_wallet(&seed(1)).await.unwrap();
    let err = session.import_wallet("sNotARealSeed").await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidSecret(_)));

    let view = session.view().await;
    assert_eq!(view.wallet_address.as_deref(), Some(address.as_str()));
    assert_eq!(view.status_message.as_deref(), Some(MSG_INVALID_SEED));

    // A good import replaces the wallet and clears the status
    let other = session.import_wallet(&seed(2)).await.unwrap();
    assert_ne!(other, address);
    let view = session.view().await;
    assert_eq!(view.wallet_address.as_deref(), Some(other.as_str()));
    assert_eq!(view.status_message, None);
}

#[tokio::test]
async fn disconnect_wallet_is_repeatable() {
    let session = start(MockLedger::new().arc()).await;
    session.import_wallet(&seed(1)).await.unwrap();

    session.disconnect_wallet().await.unwrap();
    session.disconnect_wallet().await.unwrap();
    assert_eq!(session.wallet_address().await, None);

    let outcome = session.submit_escrow(&request()).await;
    assert_eq!(outcome.error_message.as_deref(), Some("Client or wallet not initialized"));
}

#[tokio::test]
async fn generate_funded_wallet_becomes_active() {
    let ledger = MockLedger::new().with_balance(1000.0).arc();
    let session = start(ledger.clone()).await;

    let report = session.generate_funded_wallet().await.unwrap();
    assert_eq!(report.balance, 1000.0);
    assert!(report.secret.starts_with('s'));
    assert_eq!(session.wallet_address().await.as_deref(), Some(report.address.as_str()));
    assert_eq!(ledger.calls(), vec!["connect".to_string(), format!("fund:{}", report.address)]);

    let status = session.view().await.status_message.unwrap();
    assert_eq!(status, format!("Addr: {}\nSeed: {}\nBalance: 1000", report.address, report.secret));
}

#[tokio::test]
async fn submit_updates_view() {
    let session = start(MockLedger::new().arc()).await;
    session.import_wallet(&seed(1)).await.unwrap();

    let outcome = session.submit_escrow(&request()).await;
    assert!(outcome.is_success());

    let view = session.view().await;
    let hash = outcome.transaction_hash.unwrap();
    assert_eq!(view.transaction_hash.as_deref(), Some(hash.as_str()));
    assert_eq!(view.status_message.as_deref(), Some("tesSUCCESS"));
    assert_eq!(view.explorer_url, Some(format!("https://testnet.xrpl.org/transactions/{}", hash)));
}

#[tokio::test]
async fn second_submission_is_refused_while_in_flight() {
    let ledger = MockLedger::new().with_submit_delay(Duration::from_millis(200)).arc();
    let session = Arc::new(start(ledger.clone()).await);
    session.import_wallet(&seed(1)).await.unwrap();

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.submit_escrow(&request()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let refused = session.submit_escrow(&request()).await;
    assert_eq!(refused.error_message.as_deref(), Some(MSG_SUBMISSION_IN_FLIGHT));

    let outcome = first.await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(ledger.count("autofill"), 1);
    assert_eq!(ledger.count("submit"), 1);

    // Guard released once the first one finished
    assert!(session.submit_escrow(&request()).await.is_success());
    assert_eq!(ledger.count("submit"), 2);
}

#[tokio::test]
async fn stop_disconnects_once_and_closes_scope() {
    let ledger = MockLedger::new().arc();
    let session = start(ledger.clone()).await;
    session.import_wallet(&seed(1)).await.unwrap();
    assert!(session.context().await.unwrap().wallet.is_some());

    session.stop().await;
    session.stop().await;
    assert_eq!(ledger.count("disconnect"), 1);
    assert_eq!(session.view().await.connection_state, ConnectionState::Disconnected);

    assert_eq!(session.context().await.err(), Some(LedgerError::OutsideSession));
    assert_eq!(session.import_wallet(&seed(2)).await.unwrap_err(), LedgerError::OutsideSession);
    assert_eq!(session.disconnect_wallet().await.unwrap_err(), LedgerError::OutsideSession);
    assert_eq!(session.generate_funded_wallet().await.unwrap_err(), LedgerError::OutsideSession);
    let outcome = session.submit_escrow(&request()).await;
    assert_eq!(outcome.error_message.as_deref(), Some("Used outside session scope"));

    drop(session);
    tokio::task::yield_now().await;
    assert_eq!(ledger.count("disconnect"), 1);
}

#[tokio::test]
async fn drop_without_stop_disconnects() {
    let ledger = MockLedger::new().arc();
    let session = start(ledger.clone()).await;
    drop(session);

    for _ in 0..10 {
        if ledger.count("disconnect") == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(ledger.count("disconnect"), 1);
}
