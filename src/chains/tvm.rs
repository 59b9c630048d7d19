//! Tron Chain Client
//!
//! Client for the java-tron HTTP API (full node `/wallet/*`) and the event
//! server (`/v1/transactions/{id}/events`). Transactions are built by the
//! node, verified and signed locally, then broadcast.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::abi::{classify_revert, decode_uint, encode_args};
use crate::address::TronAddress;
use crate::config::TvmChainConfig;
use crate::correlator::{poll_until, PollPolicy, Sleeper};
use crate::crypto::{sha256, TransactionSigner};
use crate::error::{decode_hex, GatewayError};
use crate::factory::{balance_of_parameter, token_transfer_args, BALANCE_OF, TRANSFER};

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

/// `result` object of trigger/deploy responses
#[derive(Debug, Clone, Default, Deserialize)]
struct ReturnStatus {
    #[serde(default)]
    result: bool,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    #[serde(default)]
    result: ReturnStatus,
    #[serde(default)]
    transaction: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ConstantResponse {
    #[serde(default)]
    result: ReturnStatus,
    #[serde(default)]
    constant_result: Vec<String>,
    #[serde(default)]
    energy_used: u64,
    #[serde(default)]
    transaction: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    #[serde(default)]
    result: bool,
    #[serde(default)]
    txid: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    data: Vec<TronEvent>,
}

/// Result of a read-only `triggerconstantcontract` call
#[derive(Debug, Clone)]
pub struct ConstantCallResult {
    /// Hex-encoded return values, one per output
    pub constant_result: Vec<String>,
    pub energy_used: u64,
}

impl ConstantCallResult {
    /// First return value, or an error if the call returned nothing.
    pub fn first(&self) -> Result<&str, GatewayError> {
        self.constant_result
            .first()
            .map(String::as_str)
            .ok_or_else(|| GatewayError::Reverted {
                reason: "constant call returned no result".to_string(),
            })
    }
}

/// Contract metadata returned by `/wallet/getcontract`
#[derive(Debug, Clone, Deserialize)]
pub struct ContractInfo {
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub bytecode: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub abi: Option<Value>,
}

impl ContractInfo {
    /// A contract exists when both its ABI and bytecode are present.
    pub fn exists(&self) -> bool {
        self.abi.is_some() && self.bytecode.as_deref().map(|b| !b.is_empty()).unwrap_or(false)
    }
}

/// Unsigned or signed transaction as produced by the full node
#[derive(Debug, Clone, Serialize)]
pub struct TronTransaction {
    /// SHA-256 of `raw_data_hex`
    pub tx_id: String,
    pub raw_data_hex: String,
    /// Full JSON body; `signature` is added by `sign_transaction`
    pub body: Value,
}

impl TronTransaction {
    /// Extracts a transaction from a node response body.
    pub fn from_value(body: Value) -> Result<Self> {
        let tx_id = body
            .get("txID")
            .and_then(|v| v.as_str())
            .context("Transaction has no txID")?
            .to_string();
        let raw_data_hex = body
            .get("raw_data_hex")
            .and_then(|v| v.as_str())
            .context("Transaction has no raw_data_hex")?
            .to_string();
        Ok(Self {
            tx_id,
            raw_data_hex,
            body,
        })
    }

    pub fn is_signed(&self) -> bool {
        self.body
            .get("signature")
            .and_then(|s| s.as_array())
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }
}

/// Resource receipt nested in `gettransactioninfobyid`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceReceipt {
    /// `SUCCESS`, `REVERT`, `OUT_OF_ENERGY`, ...
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub energy_usage_total: Option<u64>,
    #[serde(default)]
    pub net_usage: Option<u64>,
}

/// Execution result of an included transaction
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionInfo {
    pub id: String,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub fee: Option<u64>,
    /// `41`-hex address of a contract created by this transaction
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub receipt: ResourceReceipt,
    /// `FAILED` when execution failed; absent on success
    #[serde(default)]
    pub result: Option<String>,
    /// Hex-encoded failure message
    #[serde(rename = "resMessage", default)]
    pub res_message: Option<String>,
    #[serde(rename = "contractResult", default)]
    pub contract_result: Vec<String>,
}

impl TransactionInfo {
    /// The typed rejection if execution failed, `None` on success.
    pub fn failure(&self) -> Option<GatewayError> {
        let receipt_failed = self
            .receipt
            .result
            .as_deref()
            .map(|r| r != "SUCCESS")
            .unwrap_or(false);
        if self.result.as_deref() != Some("FAILED") && !receipt_failed {
            return None;
        }

        let message = self
            .res_message
            .as_deref()
            .map(decode_message)
            .or_else(|| self.receipt.result.clone())
            .unwrap_or_else(|| "FAILED".to_string());
        let data = self
            .contract_result
            .first()
            .filter(|d| !d.is_empty())
            .map(String::as_str);
        Some(classify_revert(data, &message))
    }

    pub fn contract_address(&self) -> Result<Option<TronAddress>, GatewayError> {
        self.contract_address
            .as_deref()
            .map(|a| a.parse::<TronAddress>())
            .transpose()
    }
}

/// Event returned by the event server
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TronEvent {
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub contract_address: Option<String>,
    pub event_name: String,
    /// Decoded arguments, keyed both by position ("0") and by name
    #[serde(default)]
    pub result: Map<String, Value>,
}

impl TronEvent {
    /// Address argument at position `index`.
    pub fn address_arg(&self, index: usize) -> Option<TronAddress> {
        self.result
            .get(&index.to_string())
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<TronAddress>().ok())
    }
}

/// Decodes a hex-encoded node message, falling back to the raw text.
fn decode_message(message: &str) -> String {
    hex::decode(message)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| message.to_string())
}

// ============================================================================
// TRON CLIENT IMPLEMENTATION
// ============================================================================

/// Client for a java-tron full node and its event server
#[derive(Debug, Clone)]
pub struct TronClient {
    /// HTTP client for making requests
    client: Client,
    /// Full node URL (e.g., "http://127.0.0.1:9090")
    full_node_url: String,
    /// Event server URL; same as the full node on quickstart images
    event_server_url: String,
    /// Energy fee cap for contract calls, in sun
    fee_limit: u64,
}

impl TronClient {
    /// Creates a new Tron client
    ///
    /// # Arguments
    ///
    /// * `full_node_url` - Full node HTTP endpoint
    /// * `event_server_url` - Event server endpoint (defaults to the full node)
    /// * `fee_limit` - Energy fee cap for contract calls, in sun
    ///
    /// # Returns
    ///
    /// * `Ok(TronClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create client
    pub fn new(full_node_url: &str, event_server_url: Option<&str>, fee_limit: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy() // Avoid macOS system-configuration issues in tests
            .build()
            .context("Failed to create HTTP client")?;

        let full_node_url = full_node_url.trim_end_matches('/').to_string();
        let event_server_url = event_server_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| full_node_url.clone());

        Ok(Self {
            client,
            full_node_url,
            event_server_url,
            fee_limit,
        })
    }

    /// Creates a client from an `[[chain]]` entry.
    pub fn from_config(config: &TvmChainConfig) -> Result<Self> {
        Self::new(
            &config.full_node_url,
            Some(config.event_server_url()),
            config.fee_limit,
        )
    }

    pub fn fee_limit(&self) -> u64 {
        self.fee_limit
    }

    /// POSTs `body` to a full-node `/wallet/*` endpoint.
    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        let url = format!("{}{}", self.full_node_url, path);
        debug!("Tron POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::from)
            .with_context(|| format!("Failed to send request to {}", url))?
            .error_for_status()
            .map_err(GatewayError::from)
            .with_context(|| format!("Request to {} failed", url))?;

        let parsed: T = response
            .json()
            .await
            .map_err(GatewayError::from)
            .with_context(|| format!("Failed to parse response from {}", url))?;
        Ok(parsed)
    }

    /// TRX balance in sun (0 for accounts that were never activated)
    pub async fn get_account_balance(&self, address: &TronAddress) -> Result<u64> {
        let account: Value = self
            .post(
                "/wallet/getaccount",
                json!({ "address": address.to_base58(), "visible": true }),
            )
            .await?;
        Ok(account.get("balance").and_then(|b| b.as_u64()).unwrap_or(0))
    }

    /// Contract metadata, or `None` if nothing is deployed at `address`.
    pub async fn get_contract(&self, address: &TronAddress) -> Result<Option<ContractInfo>> {
        let info: ContractInfo = self
            .post(
                "/wallet/getcontract",
                json!({ "value": address.to_base58(), "visible": true }),
            )
            .await?;
        Ok(if info.exists() { Some(info) } else { None })
    }

    pub async fn is_contract(&self, address: &TronAddress) -> Result<bool> {
        Ok(self.get_contract(address).await?.is_some())
    }

    /// Executes a read-only call; reverts are classified into typed errors.
    ///
    /// # Arguments
    ///
    /// * `owner` - Caller address (`msg.sender` during the call)
    /// * `function_selector` - Solidity signature, e.g. `"accounts(address)"`
    /// * `parameter` - ABI-encoded arguments without selector
    /// * `call_value` - Sun attached to the call
    pub async fn trigger_constant_contract(
        &self,
        owner: &TronAddress,
        contract: &TronAddress,
        function_selector: &str,
        parameter: &[u8],
        call_value: u64,
    ) -> Result<ConstantCallResult> {
        let response: ConstantResponse = self
            .post(
                "/wallet/triggerconstantcontract",
                json!({
                    "owner_address": owner.to_base58(),
                    "contract_address": contract.to_base58(),
                    "function_selector": function_selector,
                    "parameter": hex::encode(parameter),
                    "call_value": call_value,
                    "visible": true,
                }),
            )
            .await?;

        if let Some(code) = response.result.code.as_deref() {
            let message = response
                .result
                .message
                .as_deref()
                .map(decode_message)
                .unwrap_or_default();
            return Err(GatewayError::Rpc {
                code: 0,
                message: format!("{}: {}", code, message),
                data: None,
            }
            .into());
        }

        let execution_failed = response
            .transaction
            .as_ref()
            .and_then(|tx| tx.pointer("/ret/0/ret"))
            .and_then(|r| r.as_str())
            == Some("FAILED");
        if execution_failed || !response.result.result {
            let message = response
                .result
                .message
                .as_deref()
                .map(decode_message)
                .unwrap_or_else(|| "REVERT opcode executed".to_string());
            let data = response.constant_result.first().map(String::as_str);
            return Err(classify_revert(data, &message).into());
        }

        Ok(ConstantCallResult {
            constant_result: response.constant_result,
            energy_used: response.energy_used,
        })
    }

    /// Builds an unsigned contract-call transaction (nothing is executed).
    pub async fn trigger_smart_contract(
        &self,
        owner: &TronAddress,
        contract: &TronAddress,
        function_selector: &str,
        parameter: &[u8],
        call_value: u64,
    ) -> Result<TronTransaction> {
        let response: TriggerResponse = self
            .post(
                "/wallet/triggersmartcontract",
                json!({
                    "owner_address": owner.to_base58(),
                    "contract_address": contract.to_base58(),
                    "function_selector": function_selector,
                    "parameter": hex::encode(parameter),
                    "fee_limit": self.fee_limit,
                    "call_value": call_value,
                    "visible": true,
                }),
            )
            .await?;

        if !response.result.result {
            let message = response
                .result
                .message
                .as_deref()
                .map(decode_message)
                .unwrap_or_default();
            anyhow::bail!(
                "triggersmartcontract {} rejected: {} {}",
                function_selector,
                response.result.code.unwrap_or_default(),
                message
            );
        }

        let transaction = response
            .transaction
            .context("triggersmartcontract returned no transaction")?;
        TronTransaction::from_value(transaction)
    }

    /// Builds an unsigned contract-deployment transaction.
    ///
    /// # Arguments
    ///
    /// * `abi` - Contract ABI (JSON array)
    /// * `bytecode` - Creation bytecode
    /// * `parameter` - ABI-encoded constructor arguments
    pub async fn deploy_contract(
        &self,
        owner: &TronAddress,
        name: &str,
        abi: &Value,
        bytecode: &[u8],
        parameter: &[u8],
    ) -> Result<TronTransaction> {
        let body: Value = self
            .post(
                "/wallet/deploycontract",
                json!({
                    "owner_address": owner.to_base58(),
                    "name": name,
                    "abi": abi.to_string(),
                    "bytecode": hex::encode(bytecode),
                    "parameter": hex::encode(parameter),
                    "fee_limit": self.fee_limit,
                    "call_value": 0,
                    "consume_user_resource_percent": 100,
                    "origin_energy_limit": 10_000_000,
                    "visible": true,
                }),
            )
            .await?;

        if let Some(error) = body.get("Error").and_then(|e| e.as_str()) {
            anyhow::bail!("deploycontract rejected: {}", error);
        }
        TronTransaction::from_value(body)
    }

    /// Builds an unsigned TRX transfer.
    pub async fn create_transfer(
        &self,
        owner: &TronAddress,
        to: &TronAddress,
        amount: u64,
    ) -> Result<TronTransaction> {
        let body: Value = self
            .post(
                "/wallet/createtransaction",
                json!({
                    "owner_address": owner.to_base58(),
                    "to_address": to.to_base58(),
                    "amount": amount,
                    "visible": true,
                }),
            )
            .await?;

        if let Some(error) = body.get("Error").and_then(|e| e.as_str()) {
            return Err(GatewayError::Reverted {
                reason: error.to_string(),
            }
            .into());
        }
        TronTransaction::from_value(body)
    }

    /// Broadcasts a signed transaction and returns its id.
    ///
    /// Validation failures reported by the node (e.g. `CONTRACT_VALIDATE_ERROR`)
    /// surface as `GatewayError::Reverted`.
    pub async fn broadcast_transaction(&self, transaction: &TronTransaction) -> Result<String> {
        if !transaction.is_signed() {
            anyhow::bail!("Transaction {} is not signed", transaction.tx_id);
        }

        let response: BroadcastResponse = self
            .post("/wallet/broadcasttransaction", transaction.body.clone())
            .await?;

        if !response.result {
            let message = response
                .message
                .as_deref()
                .map(decode_message)
                .unwrap_or_default();
            let code = response.code.unwrap_or_else(|| "UNKNOWN".to_string());
            return Err(match code.as_str() {
                "CONTRACT_VALIDATE_ERROR" | "CONTRACT_EXE_ERROR" => GatewayError::Reverted {
                    reason: message,
                },
                _ => GatewayError::Rpc {
                    code: 0,
                    message: format!("{}: {}", code, message),
                    data: None,
                },
            }
            .into());
        }

        let tx_id = response.txid.unwrap_or_else(|| transaction.tx_id.clone());
        info!("Broadcast Tron transaction {}", tx_id);
        Ok(tx_id)
    }

    /// Execution info for `tx_id`, or `None` while it is not yet included.
    pub async fn get_transaction_info(&self, tx_id: &str) -> Result<Option<TransactionInfo>> {
        let body: Value = self
            .post("/wallet/gettransactioninfobyid", json!({ "value": tx_id }))
            .await?;
        if body.get("id").is_none() {
            return Ok(None);
        }
        let info: TransactionInfo =
            serde_json::from_value(body).context("Failed to parse transaction info")?;
        Ok(Some(info))
    }

    /// Polls until `tx_id` is included, failing on the first attempt that shows a revert.
    pub async fn wait_for_transaction_info(
        &self,
        tx_id: &str,
        policy: &PollPolicy,
        sleeper: &dyn Sleeper,
    ) -> Result<TransactionInfo, GatewayError> {
        poll_until(policy, sleeper, "transaction info", |_| {
            self.included_transaction_info(tx_id)
        })
        .await
    }

    /// One inclusion check; `Some` once included, `Err` if execution failed.
    pub async fn included_transaction_info(
        &self,
        tx_id: &str,
    ) -> Result<Option<TransactionInfo>, GatewayError> {
        let info = self
            .get_transaction_info(tx_id)
            .await
            .map_err(GatewayError::from_anyhow)?;
        match info {
            Some(info) => match info.failure() {
                Some(err) => Err(err),
                None => Ok(Some(info)),
            },
            None => Ok(None),
        }
    }

    /// Events emitted by `tx_id` (empty until the event server indexes them).
    pub async fn get_events_by_transaction_id(&self, tx_id: &str) -> Result<Vec<TronEvent>> {
        let url = format!("{}/v1/transactions/{}/events", self.event_server_url, tx_id);
        debug!("Tron GET {}", url);

        let response: EventsResponse = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(GatewayError::from)
            .with_context(|| format!("Failed to send request to {}", url))?
            .error_for_status()
            .map_err(GatewayError::from)
            .with_context(|| format!("Request to {} failed", url))?
            .json()
            .await
            .map_err(GatewayError::from)
            .with_context(|| format!("Failed to parse response from {}", url))?;

        Ok(response.data)
    }

    /// TRC20 `balanceOf(owner)`
    pub async fn trc20_balance_of(&self, token: &TronAddress, owner: &TronAddress) -> Result<u128> {
        let result = self
            .trigger_constant_contract(owner, token, BALANCE_OF, &balance_of_parameter(&owner.core()), 0)
            .await?;
        Ok(decode_uint(result.first()?)?)
    }

    // ------------------------------------------------------------------------
    // Signed writes
    // ------------------------------------------------------------------------

    /// Simulates, signs and broadcasts a contract call from `signer`.
    ///
    /// The constant-call simulation surfaces reverts (authorization, duplicate
    /// salt) before anything is broadcast.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Transaction id
    /// * `Err(anyhow::Error)` - Simulation reverted, node rejected, or signing failed
    pub async fn send_contract_call(
        &self,
        signer: &TransactionSigner,
        contract: &TronAddress,
        function_selector: &str,
        parameter: &[u8],
        call_value: u64,
    ) -> Result<String> {
        let owner = signer.tron_address();

        self.trigger_constant_contract(&owner, contract, function_selector, parameter, call_value)
            .await?;

        let mut transaction = self
            .trigger_smart_contract(&owner, contract, function_selector, parameter, call_value)
            .await?;
        sign_transaction(&mut transaction, signer)?;

        info!(
            "Calling {} on {} from {}",
            function_selector, contract, owner
        );
        self.broadcast_transaction(&transaction).await
    }

    /// Sends TRX from `signer` to `to`.
    pub async fn transfer_trx(
        &self,
        signer: &TransactionSigner,
        to: &TronAddress,
        amount: u64,
    ) -> Result<String> {
        let owner = signer.tron_address();
        let mut transaction = self.create_transfer(&owner, to, amount).await?;
        sign_transaction(&mut transaction, signer)?;
        self.broadcast_transaction(&transaction).await
    }

    /// Sends `amount` base units of TRC20 `token` from `signer` to `to`.
    pub async fn trc20_transfer(
        &self,
        signer: &TransactionSigner,
        token: &TronAddress,
        to: &TronAddress,
        amount: u128,
    ) -> Result<String> {
        let parameter = encode_args(&token_transfer_args(&to.core(), amount));
        self.send_contract_call(signer, token, TRANSFER, &parameter, 0)
            .await
    }

    /// Deploys a contract and waits for its address.
    pub async fn deploy(
        &self,
        signer: &TransactionSigner,
        name: &str,
        abi: &Value,
        bytecode: &[u8],
        parameter: &[u8],
        policy: &PollPolicy,
        sleeper: &dyn Sleeper,
    ) -> Result<TronAddress> {
        let owner = signer.tron_address();
        let mut transaction = self
            .deploy_contract(&owner, name, abi, bytecode, parameter)
            .await?;
        sign_transaction(&mut transaction, signer)?;
        let tx_id = self.broadcast_transaction(&transaction).await?;

        let info = self.wait_for_transaction_info(&tx_id, policy, sleeper).await?;
        let address = info
            .contract_address()?
            .with_context(|| format!("Transaction {} created no contract", tx_id))?;
        info!("Deployed {} at {} (tx {})", name, address, tx_id);
        Ok(address)
    }
}

/// Signs a node-built transaction in place.
///
/// The node-supplied `txID` is checked against SHA-256 of `raw_data_hex` so a
/// tampered body is never signed. The signature is `r ++ s ++ (recovery_id + 27)`.
pub fn sign_transaction(transaction: &mut TronTransaction, signer: &TransactionSigner) -> Result<()> {
    let raw = decode_hex("raw_data_hex", &transaction.raw_data_hex)?;
    let digest = sha256(&raw);
    let expected = decode_hex("txID", &transaction.tx_id)?;
    if digest.as_slice() != expected.as_slice() {
        anyhow::bail!(
            "txID {} does not match SHA-256 of raw_data_hex",
            transaction.tx_id
        );
    }

    let (r, s, recovery_id) = signer.sign_prehash(&digest)?;
    let mut signature = Vec::with_capacity(65);
    signature.extend_from_slice(&r);
    signature.extend_from_slice(&s);
    signature.push(recovery_id + 27);

    transaction.body["signature"] = json!([hex::encode(signature)]);
    Ok(())
}
