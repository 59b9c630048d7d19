//! Unit tests for the Tron creation correlator
//!
//! Each test drives `TvmCorrelator::create` against a mocked full node and
//! event server and checks both the result and the terminal state.

use create2_gateway::chains::TronEvent;
use create2_gateway::correlator::tvm::decode_creation_event;
use create2_gateway::crypto::sha256;
use create2_gateway::{
    CorrelationState, CreationRequest, FactoryMethod, GatewayError, PollPolicy, Salt,
    TransactionSigner, TronAddress, TronClient, TvmCorrelator,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "../helpers.rs"]
mod test_helpers;
use test_helpers::{
    RecordingSleeper, ABI_FALSE, ABI_TRUE, DUMMY_BYTECODE, DUMMY_FACTORY_ADDR_TVM,
    DUMMY_PRIVATE_KEY, DUMMY_RECIPIENT_ADDR_TVM, EXPECTED_ACCOUNT_ADDR_TVM,
    EXPECTED_SENDER_ACCOUNT_ADDR_TVM, OWNABLE_REVERT_DATA,
};

const RAW_DATA_HEX: &str = "0a02c0de2208bbbbbbbbbbbbbbbb";

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn tx_id() -> String {
    hex::encode(sha256(&hex::decode(RAW_DATA_HEX).unwrap()))
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn constant_result(word: &str) -> Value {
    json!({
        "result": { "result": true },
        "energy_used": 500,
        "constant_result": [word.strip_prefix("0x").unwrap_or(word)],
        "transaction": { "ret": [{}] }
    })
}

/// Mocks `accounts(address)`: `before` for the first call, `after` for every later one.
async fn mock_existence(server: &MockServer, before: bool, after: bool) {
    let flag = |b: bool| constant_result(if b { ABI_TRUE } else { ABI_FALSE });
    Mock::given(method("POST"))
        .and(path("/wallet/triggerconstantcontract"))
        .and(body_partial_json(json!({ "function_selector": "accounts(address)" })))
        .respond_with(ok(flag(before)))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/wallet/triggerconstantcontract"))
        .and(body_partial_json(json!({ "function_selector": "accounts(address)" })))
        .respond_with(ok(flag(after)))
        .mount(server)
        .await;
}

/// Mocks a passing simulation, transaction build and broadcast of `create`.
async fn mock_submission(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/wallet/triggerconstantcontract"))
        .and(body_partial_json(json!({ "function_selector": "create(address,bytes32)" })))
        .respond_with(ok(constant_result("")))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/wallet/triggersmartcontract"))
        .respond_with(ok(json!({
            "result": { "result": true },
            "transaction": {
                "visible": true,
                "txID": tx_id(),
                "raw_data": {},
                "raw_data_hex": RAW_DATA_HEX
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/wallet/broadcasttransaction"))
        .respond_with(ok(json!({ "result": true, "txid": tx_id() })))
        .mount(server)
        .await;
}

async fn mock_transaction_info(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path("/wallet/gettransactioninfobyid"))
        .respond_with(ok(body))
        .mount(server)
        .await;
}

fn included_info() -> Value {
    json!({
        "id": tx_id(),
        "blockNumber": 42,
        "receipt": { "result": "SUCCESS", "energy_usage_total": 80000 }
    })
}

fn create_event(address: &str) -> Value {
    json!({
        "transaction_id": tx_id(),
        "block_number": 42,
        "contract_address": DUMMY_FACTORY_ADDR_TVM,
        "event_name": "Create",
        "result": { "0": address, "account": address }
    })
}

async fn mock_events(server: &MockServer, events: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/transactions/{}/events", tx_id())))
        .respond_with(ok(json!({ "data": events, "success": true })))
        .mount(server)
        .await;
}

fn create_correlator(server: &MockServer, sleeper: Arc<RecordingSleeper>) -> TvmCorrelator {
    let client = TronClient::new(&server.uri(), None, 1_000_000_000).unwrap();
    let factory: TronAddress = DUMMY_FACTORY_ADDR_TVM.parse().unwrap();
    TvmCorrelator::new(client, factory, FactoryMethod::Create)
        .with_policy(PollPolicy::new(Duration::from_millis(1000), 10))
        .with_sleeper(sleeper)
}

fn request() -> CreationRequest {
    CreationRequest::new(Salt::from_label("user1"), hex::decode(DUMMY_BYTECODE).unwrap())
        .with_recipient(DUMMY_RECIPIENT_ADDR_TVM)
}

fn signer() -> TransactionSigner {
    TransactionSigner::from_hex(DUMMY_PRIVATE_KEY).unwrap()
}

// ============================================================================
// PREDICTION
// ============================================================================

/// 1. Test: Recipient Is The Constructor Argument
/// Verifies that create(address,bytes32) predictions use the request's recipient.
/// Why: Account(recipient) is what the Tron factory deploys.
#[test]
fn test_tvm_correlator_predicts_recipient_account() {
    let client = TronClient::new("http://127.0.0.1:9090", None, 1_000_000_000).unwrap();
    let factory: TronAddress = DUMMY_FACTORY_ADDR_TVM.parse().unwrap();
    let correlator = TvmCorrelator::new(client, factory, FactoryMethod::Create);

    let predicted = correlator
        .predict(&signer().tron_address(), &request())
        .unwrap();
    assert_eq!(predicted.to_string(), EXPECTED_ACCOUNT_ADDR_TVM);
}

/// 2. Test: createWallet Flavour On Tron
/// Verifies that a createWallet factory on Tron uses the sender as constructor argument.
/// Why: Both factory flavours must be predictable on both chain families.
#[test]
fn test_tvm_correlator_predicts_sender_wallet() {
    let client = TronClient::new("http://127.0.0.1:9090", None, 1_000_000_000).unwrap();
    let factory: TronAddress = DUMMY_FACTORY_ADDR_TVM.parse().unwrap();
    let correlator = TvmCorrelator::new(client, factory, FactoryMethod::CreateWallet);

    let request = CreationRequest::new(
        Salt::from_label("user1"),
        hex::decode(DUMMY_BYTECODE).unwrap(),
    );
    let predicted = correlator
        .predict(&signer().tron_address(), &request)
        .unwrap();
    assert_eq!(predicted.to_string(), EXPECTED_SENDER_ACCOUNT_ADDR_TVM);
}

// ============================================================================
// EVENT DECODING
// ============================================================================

/// 3. Test: Creation Event Decoding
/// Verifies that the first event argument is read in 0x or 41-hex form and
/// that other event names are ignored.
/// Why: Event servers differ in how they render address arguments.
#[test]
fn test_decode_creation_event() {
    let event: TronEvent = serde_json::from_value(create_event(EXPECTED_ACCOUNT_ADDR_TVM)).unwrap();
    let decoded = decode_creation_event(&event, "Create").unwrap();
    assert_eq!(decoded.address, EXPECTED_ACCOUNT_ADDR_TVM);
    assert_eq!(decoded.transaction_id, tx_id());
    assert_eq!(decoded.block_number, Some(42));

    let hex41 = format!("41{}", EXPECTED_ACCOUNT_ADDR_TVM.strip_prefix("0x").unwrap());
    let event: TronEvent = serde_json::from_value(create_event(&hex41)).unwrap();
    assert_eq!(
        decode_creation_event(&event, "Create").unwrap().address,
        EXPECTED_ACCOUNT_ADDR_TVM
    );

    assert!(decode_creation_event(&event, "CreateWallet").is_none());
}

// ============================================================================
// CORRELATION SCENARIOS
// ============================================================================

/// 4. Test: Successful Creation
/// Verifies the happy path: not registered, broadcast, event matches, registered after.
/// Why: This is the end-to-end guarantee the correlator exists to provide.
#[tokio::test]
async fn test_tvm_create_confirmed() {
    let mock_server = MockServer::start().await;
    mock_existence(&mock_server, false, true).await;
    mock_submission(&mock_server).await;
    mock_transaction_info(&mock_server, included_info()).await;
    mock_events(&mock_server, json!([create_event(EXPECTED_ACCOUNT_ADDR_TVM)])).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut correlator = create_correlator(&mock_server, sleeper.clone());

    let confirmation = correlator.create(&signer(), &request()).await.unwrap();

    assert_eq!(confirmation.predicted.to_string(), EXPECTED_ACCOUNT_ADDR_TVM);
    assert_eq!(confirmation.event.transaction_id, tx_id());
    assert!(!confirmation.existed_before);
    assert_eq!(correlator.state(), CorrelationState::Confirmed);
    assert_eq!(sleeper.calls(), 1);
}

/// 5. Test: Event Indexed Late
/// Verifies that the correlator keeps polling until the event server has the event.
/// Why: Events show up a few seconds after the block.
#[tokio::test]
async fn test_tvm_create_event_indexed_late() {
    let mock_server = MockServer::start().await;
    mock_existence(&mock_server, false, true).await;
    mock_submission(&mock_server).await;
    Mock::given(method("POST"))
        .and(path("/wallet/gettransactioninfobyid"))
        .respond_with(ok(json!({})))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    mock_transaction_info(&mock_server, included_info()).await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/transactions/{}/events", tx_id())))
        .respond_with(ok(json!({ "data": [], "success": true })))
        .up_to_n_times(3)
        .mount(&mock_server)
        .await;
    mock_events(&mock_server, json!([create_event(EXPECTED_ACCOUNT_ADDR_TVM)])).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut correlator = create_correlator(&mock_server, sleeper.clone());

    correlator.create(&signer(), &request()).await.unwrap();

    assert_eq!(correlator.state(), CorrelationState::Confirmed);
    assert_eq!(sleeper.calls(), 4);
}

/// 6. Test: Event Never Arrives
/// Verifies Timeout after exactly ten one-second polls.
/// Why: The wait window is bounded at 10 x 1000 ms.
#[tokio::test]
async fn test_tvm_create_times_out() {
    let mock_server = MockServer::start().await;
    mock_existence(&mock_server, false, false).await;
    mock_submission(&mock_server).await;
    mock_transaction_info(&mock_server, json!({})).await;
    mock_events(&mock_server, json!([])).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut correlator = create_correlator(&mock_server, sleeper.clone());

    let err = correlator.create(&signer(), &request()).await.unwrap_err();

    match err {
        GatewayError::Timeout { what, attempts } => {
            assert_eq!(what, "Create");
            assert_eq!(attempts, 10);
        }
        other => panic!("Expected Timeout, got {:?}", other),
    }
    assert_eq!(correlator.state(), CorrelationState::TimedOut);
    assert_eq!(sleeper.calls(), 10);
    assert!(sleeper
        .durations()
        .iter()
        .all(|d| *d == Duration::from_millis(1000)));
}

/// 7. Test: Non-Owner Caller
/// Verifies that an OwnableUnauthorizedAccount simulation revert is Rejected
/// and nothing is broadcast.
/// Why: Only the factory owner may create accounts.
#[tokio::test]
async fn test_tvm_create_unauthorized() {
    let mock_server = MockServer::start().await;
    mock_existence(&mock_server, false, false).await;
    Mock::given(method("POST"))
        .and(path("/wallet/triggerconstantcontract"))
        .and(body_partial_json(json!({ "function_selector": "create(address,bytes32)" })))
        .respond_with(ok(json!({
            "result": { "result": true, "message": hex::encode("REVERT opcode executed") },
            "constant_result": [OWNABLE_REVERT_DATA.strip_prefix("0x").unwrap()],
            "transaction": { "ret": [{ "ret": "FAILED" }] }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/wallet/broadcasttransaction"))
        .respond_with(ok(json!({ "result": true })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut correlator = create_correlator(&mock_server, sleeper.clone());

    let err = correlator.create(&signer(), &request()).await.unwrap_err();

    assert!(matches!(err, GatewayError::Authorization { .. }));
    assert_eq!(correlator.state(), CorrelationState::Rejected);
    assert_eq!(sleeper.calls(), 0);
}

/// 8. Test: Revert Ends The Wait Early
/// Verifies that a FAILED transaction info stops polling on the first attempt.
/// Why: A reverted creation will never emit its event; waiting 10 s is pointless.
#[tokio::test]
async fn test_tvm_create_reverted_fails_early() {
    let mock_server = MockServer::start().await;
    mock_existence(&mock_server, false, false).await;
    mock_submission(&mock_server).await;
    mock_transaction_info(
        &mock_server,
        json!({
            "id": tx_id(),
            "blockNumber": 42,
            "result": "FAILED",
            "resMessage": hex::encode("REVERT opcode executed"),
            "receipt": { "result": "REVERT" },
            "contractResult": [OWNABLE_REVERT_DATA.strip_prefix("0x").unwrap()]
        }),
    )
    .await;
    Mock::given(method("GET"))
        .respond_with(ok(json!({ "data": [] })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut correlator = create_correlator(&mock_server, sleeper.clone());

    let err = correlator.create(&signer(), &request()).await.unwrap_err();

    assert!(matches!(err, GatewayError::Authorization { .. }));
    assert_eq!(correlator.state(), CorrelationState::Rejected);
    assert_eq!(sleeper.calls(), 1);
}

/// 9. Test: Emitted Address Differs
/// Verifies PredictionMismatch when the event reports another address.
/// Why: A mismatch means the bytecode, recipient or factory inputs are wrong.
#[tokio::test]
async fn test_tvm_create_prediction_mismatch() {
    let mock_server = MockServer::start().await;
    mock_existence(&mock_server, false, true).await;
    mock_submission(&mock_server).await;
    mock_transaction_info(&mock_server, included_info()).await;
    let wrong = "0x00000000000000000000000000000000000000dd";
    mock_events(&mock_server, json!([create_event(wrong)])).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut correlator = create_correlator(&mock_server, sleeper);

    match correlator.create(&signer(), &request()).await {
        Err(GatewayError::PredictionMismatch { predicted, emitted }) => {
            assert_eq!(predicted, EXPECTED_ACCOUNT_ADDR_TVM);
            assert_eq!(emitted, wrong);
        }
        other => panic!("Expected PredictionMismatch, got {:?}", other),
    }
    assert_eq!(correlator.state(), CorrelationState::Failed);
}

/// 10. Test: Recipient Already Has This Salt
/// Verifies that an address registered before submission ends in DuplicateSalt.
/// Why: The same (recipient, salt) can only ever be created once.
#[tokio::test]
async fn test_tvm_create_existing_address_is_duplicate() {
    let mock_server = MockServer::start().await;
    mock_existence(&mock_server, true, true).await;
    mock_submission(&mock_server).await;
    mock_transaction_info(&mock_server, included_info()).await;
    mock_events(&mock_server, json!([create_event(EXPECTED_ACCOUNT_ADDR_TVM)])).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut correlator = create_correlator(&mock_server, sleeper);

    let err = correlator.create(&signer(), &request()).await.unwrap_err();
    assert!(matches!(err, GatewayError::DuplicateSalt { .. }));
    assert_eq!(correlator.state(), CorrelationState::Rejected);
}

/// 11. Test: Registry Not Updated
/// Verifies NotPersisted when the event matched but accounts() is still false.
/// Why: The existence map is the factory's source of truth.
#[tokio::test]
async fn test_tvm_create_not_persisted() {
    let mock_server = MockServer::start().await;
    mock_existence(&mock_server, false, false).await;
    mock_submission(&mock_server).await;
    mock_transaction_info(&mock_server, included_info()).await;
    mock_events(&mock_server, json!([create_event(EXPECTED_ACCOUNT_ADDR_TVM)])).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut correlator = create_correlator(&mock_server, sleeper);

    let err = correlator.create(&signer(), &request()).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotPersisted { .. }));
    assert_eq!(correlator.state(), CorrelationState::Failed);
}

/// 12. Test: Missing Recipient
/// Verifies that create() without a recipient fails before any network call.
/// Why: Input errors are detected locally.
#[tokio::test]
async fn test_tvm_create_without_recipient() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut correlator = create_correlator(&mock_server, sleeper);
    let request = CreationRequest::new(
        Salt::from_label("user1"),
        hex::decode(DUMMY_BYTECODE).unwrap(),
    );

    let err = correlator.create(&signer(), &request).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidAddressEncoding { .. }));
    assert_eq!(correlator.state(), CorrelationState::Failed);
}
