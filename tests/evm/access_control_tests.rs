//! Owner-only calls, token funding and native-currency sends on EVM
//!
//! Test ordering matches the TVM access control tests.

use create2_gateway::chains::{EvmLog, TransactionReceipt};
use create2_gateway::factory;
use create2_gateway::{EvmAddress, EvmClient, GatewayError, TransactionSigner};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

#[path = "../helpers.rs"]
mod test_helpers;
use test_helpers::{
    ownable_revert_data, DUMMY_FACTORY_ADDR_EVM, DUMMY_OTHER_ADDR_EVM, DUMMY_OTHER_PRIVATE_KEY,
    DUMMY_PRIVATE_KEY, DUMMY_SENDER_ADDR_EVM, DUMMY_TOKEN_ADDR_EVM, DUMMY_TX_HASH,
    EXPECTED_WALLET_ADDR_EVM, OWNABLE_REVERT_DATA,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Matches JSON-RPC calls whose first param carries `from == address`.
struct FromAddress(&'static str);

impl Match for FromAddress {
    fn matches(&self, request: &Request) -> bool {
        serde_json::from_slice::<Value>(&request.body)
            .ok()
            .and_then(|body| {
                body.pointer("/params/0/from")
                    .and_then(|from| from.as_str())
                    .map(|from| from.eq_ignore_ascii_case(self.0))
            })
            .unwrap_or(false)
    }
}

async fn mock_rpc(server: &MockServer, rpc_method: &str, result: Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": result,
            "id": 1
        })))
        .mount(server)
        .await;
}

/// Mounts the nonce / gas price / broadcast responses of a successful write.
async fn mock_submission(server: &MockServer, expected_sends: u64) {
    mock_rpc(server, "eth_getTransactionCount", json!("0x0")).await;
    mock_rpc(server, "eth_gasPrice", json!("0x3b9aca00")).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendRawTransaction" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "result": DUMMY_TX_HASH, "id": 1
        })))
        .expect(expected_sends)
        .mount(server)
        .await;
}

async fn estimate_gas_request(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    let body = requests
        .iter()
        .map(|r| serde_json::from_slice::<Value>(&r.body).unwrap())
        .find(|b| b["method"] == "eth_estimateGas")
        .unwrap();
    body["params"][0].clone()
}

// ============================================================================
// OWNER-ONLY CALLS
// ============================================================================

/// 1. Test: Owner-Only Calls From A Non-Owner
/// Verifies that transferOwnership, renounceOwnership and withdraw from another
/// account stop at simulation with Authorization, while the owner's calls go out.
/// Why: Only the factory owner manages the factory and only the wallet owner withdraws.
#[tokio::test]
async fn test_evm_owner_only_calls() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_estimateGas" })))
        .and(FromAddress(DUMMY_OTHER_ADDR_EVM))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "error": {
                "code": 3,
                "message": "execution reverted",
                "data": ownable_revert_data(DUMMY_OTHER_ADDR_EVM)
            },
            "id": 1
        })))
        .mount(&mock_server)
        .await;
    mock_rpc(&mock_server, "eth_estimateGas", json!("0x7530")).await;
    mock_submission(&mock_server, 3).await;

    let client = EvmClient::new(&mock_server.uri(), 31337).unwrap();
    let owner = TransactionSigner::from_hex(DUMMY_PRIVATE_KEY).unwrap();
    let other = TransactionSigner::from_hex(DUMMY_OTHER_PRIVATE_KEY).unwrap();
    let factory_addr: EvmAddress = DUMMY_FACTORY_ADDR_EVM.parse().unwrap();
    let wallet: EvmAddress = EXPECTED_WALLET_ADDR_EVM.parse().unwrap();
    let token: EvmAddress = DUMMY_TOKEN_ADDR_EVM.parse().unwrap();

    let calls = [
        (
            "transferOwnership",
            factory_addr,
            factory::encode_transfer_ownership(other.evm_address().as_bytes()),
        ),
        ("renounceOwnership", factory_addr, factory::encode_renounce_ownership()),
        (
            "withdraw",
            wallet,
            factory::encode_withdraw(other.evm_address().as_bytes(), 1_000_000, token.as_bytes()),
        ),
    ];

    for (name, to, data) in &calls {
        let err = client
            .send_transaction(&other, Some(to), 0, data)
            .await
            .unwrap_err();
        match GatewayError::from_anyhow(err) {
            GatewayError::Authorization { reason } => {
                assert_eq!(reason, "OwnableUnauthorizedAccount", "{}", name)
            }
            unexpected => panic!("Expected Authorization for {}, got {:?}", name, unexpected),
        }

        let tx_hash = client
            .send_transaction(&owner, Some(to), 0, data)
            .await
            .unwrap();
        assert_eq!(tx_hash, DUMMY_TX_HASH, "{}", name);
    }
}

/// 2. Test: Revert Data Names The Caller
/// Verifies that the revert helper reproduces the node payload for the sender.
/// Why: The access-control fixtures build revert data per caller.
#[test]
fn test_evm_ownable_revert_data_for_sender() {
    assert_eq!(ownable_revert_data(DUMMY_SENDER_ADDR_EVM), OWNABLE_REVERT_DATA);
}

// ============================================================================
// TOKEN FUNDING
// ============================================================================

/// 3. Test: ERC20 Transfer
/// Verifies that erc20_transfer() calls transfer(address,uint256) on the token.
/// Why: A wallet is funded with USDT before the owner withdraws from it.
#[tokio::test]
async fn test_evm_erc20_transfer() {
    let mock_server = MockServer::start().await;
    mock_rpc(&mock_server, "eth_estimateGas", json!("0xc350")).await;
    mock_submission(&mock_server, 1).await;

    let client = EvmClient::new(&mock_server.uri(), 31337).unwrap();
    let signer = TransactionSigner::from_hex(DUMMY_PRIVATE_KEY).unwrap();
    let token: EvmAddress = DUMMY_TOKEN_ADDR_EVM.parse().unwrap();
    let wallet: EvmAddress = EXPECTED_WALLET_ADDR_EVM.parse().unwrap();

    let tx_hash = client
        .erc20_transfer(&signer, &token, &wallet, 1_500_000)
        .await
        .unwrap();
    assert_eq!(tx_hash, DUMMY_TX_HASH);

    let call = estimate_gas_request(&mock_server).await;
    assert_eq!(call["to"], DUMMY_TOKEN_ADDR_EVM);
    assert_eq!(call["value"], "0x0");
    assert_eq!(
        call["data"],
        format!(
            "0x{}",
            hex::encode(factory::encode_token_transfer(wallet.as_bytes(), 1_500_000))
        )
    );
}

// ============================================================================
// NATIVE CURRENCY
// ============================================================================

/// 4. Test: Native Send To A Wallet Is Rejected
/// Verifies that sending ETH to a sub-contract reverts in simulation and nothing is broadcast.
/// Why: Wallets have no payable entry point; value sent to them must not be lost.
#[tokio::test]
async fn test_evm_native_send_to_wallet_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_estimateGas" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "error": { "code": 3, "message": "execution reverted" },
            "id": 1
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendRawTransaction" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = EvmClient::new(&mock_server.uri(), 31337).unwrap();
    let signer = TransactionSigner::from_hex(DUMMY_PRIVATE_KEY).unwrap();
    let wallet: EvmAddress = EXPECTED_WALLET_ADDR_EVM.parse().unwrap();

    let err = client
        .send_transaction(&signer, Some(&wallet), 10_000_000_000_000_000, &[])
        .await
        .unwrap_err();

    let err = GatewayError::from_anyhow(err);
    assert!(err.is_rejection());
    match err {
        GatewayError::Reverted { reason } => assert_eq!(reason, "execution reverted"),
        other => panic!("Expected Reverted, got {:?}", other),
    }

    let call = estimate_gas_request(&mock_server).await;
    assert_eq!(call["value"], "0x2386f26fc10000");
}

// ============================================================================
// QUANTITIES
// ============================================================================

/// 5. Test: Oversized Block Numbers
/// Verifies that a block number above u64::MAX reads as None instead of wrapping.
/// Why: A truncated block number would point log lookups at the wrong block.
#[test]
fn test_evm_block_number_out_of_range() {
    let log: EvmLog = serde_json::from_value(json!({
        "address": DUMMY_TOKEN_ADDR_EVM,
        "topics": [],
        "data": "0x",
        "blockNumber": "0x10000000000000000",
        "transactionHash": DUMMY_TX_HASH
    }))
    .unwrap();
    assert_eq!(log.block_number(), None);

    let receipt: TransactionReceipt = serde_json::from_value(json!({
        "transactionHash": DUMMY_TX_HASH,
        "status": "0x1",
        "gasUsed": "0x5208",
        "blockNumber": "0x10000000000000001"
    }))
    .unwrap();
    assert_eq!(receipt.block_number(), None);

    let mined: TransactionReceipt = serde_json::from_value(json!({
        "transactionHash": DUMMY_TX_HASH,
        "status": "0x1",
        "gasUsed": "0x5208",
        "blockNumber": "0xffffffffffffffff"
    }))
    .unwrap();
    assert_eq!(mined.block_number(), Some(u64::MAX));
}
