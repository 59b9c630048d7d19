//! EVM Chain Client
//!
//! JSON-RPC client for EVM nodes (Hardhat, Sepolia). Reads go straight to the
//! node; writes are built as legacy EIP-155 transactions, signed locally and
//! submitted with `eth_sendRawTransaction`, so the node never holds keys.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::parse_quantity;
use super::rlp::LegacyTransaction;
use crate::abi::{classify_revert, decode_uint};
use crate::address::{pad_address_word, EvmAddress};
use crate::config::EvmChainConfig;
use crate::correlator::{poll_until, PollPolicy, Sleeper};
use crate::crypto::{event_topic, TransactionSigner};
use crate::error::{decode_hex, GatewayError};
use crate::factory::{encode_balance_of, encode_token_transfer, TRANSFER_EVENT};

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    /// Revert payload; geth sends a hex string, some nodes nest it in an object
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpcError {
    fn into_gateway_error(self) -> GatewayError {
        let data = match self.data {
            Some(Value::String(data)) => Some(data),
            Some(Value::Object(map)) => map
                .get("data")
                .and_then(|d| d.as_str())
                .map(str::to_string),
            _ => None,
        };
        GatewayError::Rpc {
            code: self.code,
            message: self.message,
            data,
        }
    }
}

/// EVM event log entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmLog {
    /// Address of the contract that emitted the event
    pub address: String,
    /// Array of topics (indexed event parameters)
    pub topics: Vec<String>,
    /// Event data (non-indexed parameters)
    pub data: String,
    /// Block number (null while pending)
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    /// Transaction hash
    #[serde(rename = "transactionHash", default)]
    pub transaction_hash: Option<String>,
    /// Log index
    #[serde(rename = "logIndex", default)]
    pub log_index: Option<String>,
}

impl EvmLog {
    /// Block number as an integer, if the log is mined.
    pub fn block_number(&self) -> Option<u64> {
        self.block_number
            .as_deref()
            .and_then(|b| parse_quantity("blockNumber", b).ok())
            .and_then(|b| u64::try_from(b).ok())
    }

    /// Whether this log was emitted by `tx_hash` (case-insensitive).
    pub fn is_from_transaction(&self, tx_hash: &str) -> bool {
        self.transaction_hash
            .as_deref()
            .map(|h| h.eq_ignore_ascii_case(tx_hash))
            .unwrap_or(false)
    }
}

/// Receipt returned by `eth_getTransactionReceipt`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionReceipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    /// `0x1` success, `0x0` reverted
    #[serde(default)]
    pub status: Option<String>,
    /// Set for contract-creation transactions
    #[serde(rename = "contractAddress", default)]
    pub contract_address: Option<String>,
    #[serde(rename = "gasUsed")]
    pub gas_used: String,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub logs: Vec<EvmLog>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() == Some("0x1")
    }

    pub fn block_number(&self) -> Option<u64> {
        self.block_number
            .as_deref()
            .and_then(|b| parse_quantity("blockNumber", b).ok())
            .and_then(|b| u64::try_from(b).ok())
    }

    pub fn gas_used(&self) -> Result<u128, GatewayError> {
        parse_quantity("gasUsed", &self.gas_used)
    }

    /// Address of a deployed contract, if this receipt created one.
    pub fn contract_address(&self) -> Result<Option<EvmAddress>, GatewayError> {
        self.contract_address
            .as_deref()
            .map(|a| a.parse::<EvmAddress>())
            .transpose()
    }
}

/// Decoded ERC20 `Transfer(address,address,uint256)` log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLog {
    pub from: EvmAddress,
    pub to: EvmAddress,
    pub value: u128,
    pub transaction_hash: Option<String>,
    pub block_number: Option<u64>,
}

impl TransferLog {
    /// Decodes a `Transfer` log; `None` if the shape does not match.
    pub fn from_log(log: &EvmLog) -> Option<Self> {
        if log.topics.len() < 3 {
            return None;
        }
        let from = EvmAddress::from_word_hex(&log.topics[1]).ok()?;
        let to = EvmAddress::from_word_hex(&log.topics[2]).ok()?;
        let value = decode_uint(&log.data).ok()?;
        Some(Self {
            from,
            to,
            value,
            transaction_hash: log.transaction_hash.clone(),
            block_number: log.block_number(),
        })
    }
}

// ============================================================================
// EVM CLIENT IMPLEMENTATION
// ============================================================================

/// Client for communicating with EVM-compatible blockchain nodes via JSON-RPC
#[derive(Debug, Clone)]
pub struct EvmClient {
    /// HTTP client for making requests
    client: Client,
    /// Base URL of the EVM node (e.g., "http://127.0.0.1:8545")
    base_url: String,
    /// Chain ID used for EIP-155 signing
    chain_id: u64,
}

impl EvmClient {
    /// Creates a new EVM client for the given node URL
    ///
    /// # Arguments
    ///
    /// * `rpc_url` - JSON-RPC endpoint of the node
    /// * `chain_id` - Chain ID used when signing transactions
    ///
    /// # Returns
    ///
    /// * `Ok(EvmClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create client
    pub fn new(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy() // Avoid macOS system-configuration issues in tests
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: rpc_url.to_string(),
            chain_id,
        })
    }

    /// Creates a client from an `[[chain]]` entry.
    pub fn from_config(config: &EvmChainConfig) -> Result<Self> {
        Self::new(&config.rpc_url, config.chain_id)
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one JSON-RPC request.
    ///
    /// Node-reported errors are returned as `GatewayError::Rpc` (revert data
    /// preserved); transport failures as `GatewayError::Network`.
    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        debug!("EVM RPC {} -> {}", method, self.base_url);

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(GatewayError::from)
            .with_context(|| format!("Failed to send {} request to {}", method, self.base_url))?
            .json()
            .await
            .map_err(GatewayError::from)
            .with_context(|| format!("Failed to parse {} response from {}", method, self.base_url))?;

        if let Some(error) = response.error {
            return Err(error.into_gateway_error().into());
        }

        Ok(response.result)
    }

    /// Sends a request whose result must be a hex quantity.
    async fn quantity(&self, method: &str, params: Vec<Value>) -> Result<u128> {
        let value: String = self
            .rpc(method, params)
            .await?
            .with_context(|| format!("{} returned no result", method))?;
        Ok(parse_quantity("quantity", &value)?)
    }

    /// Gets the current block number
    pub async fn get_block_number(&self) -> Result<u64> {
        let block_number = self.quantity("eth_blockNumber", vec![]).await?;
        debug!("Current EVM block number: {}", block_number);
        u64::try_from(block_number).context("Block number does not fit in u64")
    }

    /// Native balance in wei
    pub async fn get_balance(&self, address: &EvmAddress) -> Result<u128> {
        self.quantity("eth_getBalance", vec![json!(address.to_string()), json!("latest")])
            .await
    }

    /// Deployed runtime bytecode (empty for externally-owned accounts)
    pub async fn get_code(&self, address: &EvmAddress) -> Result<Vec<u8>> {
        let code: String = self
            .rpc("eth_getCode", vec![json!(address.to_string()), json!("latest")])
            .await?
            .unwrap_or_default();
        Ok(decode_hex("code", &code)?)
    }

    pub async fn is_contract(&self, address: &EvmAddress) -> Result<bool> {
        Ok(!self.get_code(address).await?.is_empty())
    }

    /// Executes a read-only call (`eth_call`) and returns the hex result.
    ///
    /// `from` matters for functions that read `msg.sender`.
    pub async fn call(
        &self,
        from: Option<&EvmAddress>,
        to: &EvmAddress,
        data: &[u8],
    ) -> Result<String> {
        let mut call = json!({
            "to": to.to_string(),
            "data": format!("0x{}", hex::encode(data)),
        });
        if let Some(from) = from {
            call["from"] = json!(from.to_string());
        }
        let result: String = self
            .rpc("eth_call", vec![call, json!("latest")])
            .await?
            .unwrap_or_else(|| "0x".to_string());
        Ok(result)
    }

    /// Estimates gas; a revert comes back as `GatewayError::Rpc` carrying the revert data.
    pub async fn estimate_gas(
        &self,
        from: Option<&EvmAddress>,
        to: Option<&EvmAddress>,
        value: u128,
        data: &[u8],
    ) -> Result<u64> {
        let mut tx = json!({
            "value": format!("0x{:x}", value),
            "data": format!("0x{}", hex::encode(data)),
        });
        if let Some(from) = from {
            tx["from"] = json!(from.to_string());
        }
        if let Some(to) = to {
            tx["to"] = json!(to.to_string());
        }
        let gas = self.quantity("eth_estimateGas", vec![tx]).await?;
        u64::try_from(gas).context("Gas estimate does not fit in u64")
    }

    /// Next nonce for `address`, including pending transactions
    pub async fn get_transaction_count(&self, address: &EvmAddress) -> Result<u64> {
        let nonce = self
            .quantity(
                "eth_getTransactionCount",
                vec![json!(address.to_string()), json!("pending")],
            )
            .await?;
        u64::try_from(nonce).context("Nonce does not fit in u64")
    }

    pub async fn gas_price(&self) -> Result<u64> {
        let price = self.quantity("eth_gasPrice", vec![]).await?;
        u64::try_from(price).context("Gas price does not fit in u64")
    }

    /// Submits a signed raw transaction and returns its hash.
    pub async fn send_raw_transaction(&self, raw_tx: &str) -> Result<String> {
        let tx_hash: String = self
            .rpc("eth_sendRawTransaction", vec![json!(raw_tx)])
            .await?
            .context("eth_sendRawTransaction returned no transaction hash")?;
        Ok(tx_hash)
    }

    /// Receipt for `tx_hash`, or `None` while the transaction is pending.
    pub async fn get_transaction_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>> {
        self.rpc("eth_getTransactionReceipt", vec![json!(tx_hash)])
            .await
    }

    /// Polls for a receipt until one is available or the policy is exhausted.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        policy: &PollPolicy,
        sleeper: &dyn Sleeper,
    ) -> Result<TransactionReceipt, GatewayError> {
        poll_until(policy, sleeper, "transaction receipt", |_| async move {
            self.get_transaction_receipt(tx_hash)
                .await
                .map_err(GatewayError::from_anyhow)
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Log filters
    // ------------------------------------------------------------------------

    /// Installs a log filter on `address` starting at the latest block.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Filter id to pass to `get_filter_changes` / `uninstall_filter`
    pub async fn new_filter(&self, address: &EvmAddress, topics: &[Option<String>]) -> Result<String> {
        let filter = json!({
            "address": address.to_string(),
            "topics": topics,
            "fromBlock": "latest",
        });
        let filter_id: String = self
            .rpc("eth_newFilter", vec![filter])
            .await?
            .context("eth_newFilter returned no filter id")?;
        debug!("Installed EVM log filter {} on {}", filter_id, address);
        Ok(filter_id)
    }

    /// Logs matched by `filter_id` since the previous poll.
    pub async fn get_filter_changes(&self, filter_id: &str) -> Result<Vec<EvmLog>> {
        let logs: Option<Vec<EvmLog>> = self
            .rpc("eth_getFilterChanges", vec![json!(filter_id)])
            .await?;
        Ok(logs.unwrap_or_default())
    }

    pub async fn uninstall_filter(&self, filter_id: &str) -> Result<bool> {
        let removed: Option<bool> = self
            .rpc("eth_uninstallFilter", vec![json!(filter_id)])
            .await?;
        debug!("Uninstalled EVM log filter {}", filter_id);
        Ok(removed.unwrap_or(false))
    }

    /// Historical logs for `address` (`eth_getLogs`); `None` block bounds mean "latest".
    pub async fn get_logs(
        &self,
        address: &EvmAddress,
        topics: &[Option<String>],
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> Result<Vec<EvmLog>> {
        let block_tag = |block: Option<u64>| {
            block
                .map(|n| format!("0x{:x}", n))
                .unwrap_or_else(|| "latest".to_string())
        };
        let filter = json!({
            "address": address.to_string(),
            "topics": topics,
            "fromBlock": block_tag(from_block),
            "toBlock": block_tag(to_block),
        });
        let logs: Option<Vec<EvmLog>> = self.rpc("eth_getLogs", vec![filter]).await?;
        Ok(logs.unwrap_or_default())
    }

    // ------------------------------------------------------------------------
    // ERC20
    // ------------------------------------------------------------------------

    /// ERC20 `balanceOf(owner)`
    pub async fn erc20_balance_of(&self, token: &EvmAddress, owner: &EvmAddress) -> Result<u128> {
        let result = self
            .call(None, token, &encode_balance_of(owner.as_bytes()))
            .await?;
        Ok(decode_uint(&result)?)
    }

    /// `Transfer` logs of `token`, optionally restricted to one recipient.
    pub async fn erc20_transfer_logs(
        &self,
        token: &EvmAddress,
        to: Option<&EvmAddress>,
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> Result<Vec<TransferLog>> {
        let topics = vec![
            Some(event_topic(TRANSFER_EVENT)),
            None,
            to.map(|addr| format!("0x{}", hex::encode(pad_address_word(addr.as_bytes())))),
        ];
        let logs = self.get_logs(token, &topics, from_block, to_block).await?;
        Ok(logs.iter().filter_map(TransferLog::from_log).collect())
    }

    // ------------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------------

    /// Signs and submits a transaction from `signer`.
    ///
    /// The call is first simulated with `eth_estimateGas`; a revert there is
    /// classified (authorization, duplicate salt, other) and nothing is sent.
    ///
    /// # Arguments
    ///
    /// * `to` - Target contract or account; `None` deploys `data` as init code
    /// * `value` - Wei attached to the call
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Transaction hash
    /// * `Err(anyhow::Error)` - Simulation reverted, RPC failure or signing failure
    pub async fn send_transaction(
        &self,
        signer: &TransactionSigner,
        to: Option<&EvmAddress>,
        value: u128,
        data: &[u8],
    ) -> Result<String> {
        let from = signer.evm_address();

        let gas = self
            .estimate_gas(Some(&from), to, value, data)
            .await
            .map_err(classify_rpc_revert)?;
        let nonce = self.get_transaction_count(&from).await?;
        let gas_price = self.gas_price().await?;

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            // 20% headroom over the estimate
            gas_limit: gas.saturating_mul(120) / 100,
            to: to.copied(),
            value,
            data: data.to_vec(),
            chain_id: self.chain_id,
        };
        let raw_tx = tx.sign(signer)?;
        let tx_hash = self.send_raw_transaction(&raw_tx).await?;

        info!(
            "Sent EVM transaction {} from {} (nonce {}, gas limit {})",
            tx_hash, from, nonce, tx.gas_limit
        );
        Ok(tx_hash)
    }

    /// Sends `amount` base units of ERC20 `token` from `signer` to `to`.
    pub async fn erc20_transfer(
        &self,
        signer: &TransactionSigner,
        token: &EvmAddress,
        to: &EvmAddress,
        amount: u128,
    ) -> Result<String> {
        let data = encode_token_transfer(to.as_bytes(), amount);
        self.send_transaction(signer, Some(token), 0, &data).await
    }

    /// Deploys `init_code` and returns the created contract address.
    pub async fn deploy_contract(
        &self,
        signer: &TransactionSigner,
        init_code: &[u8],
        policy: &PollPolicy,
        sleeper: &dyn Sleeper,
    ) -> Result<EvmAddress> {
        let tx_hash = self.send_transaction(signer, None, 0, init_code).await?;
        let receipt = self.wait_for_receipt(&tx_hash, policy, sleeper).await?;
        if !receipt.succeeded() {
            return Err(GatewayError::Reverted {
                reason: format!("deployment {} reverted", tx_hash),
            }
            .into());
        }
        let address = receipt
            .contract_address()?
            .with_context(|| format!("Receipt for {} has no contract address", tx_hash))?;
        info!("Deployed contract at {} (tx {})", address, tx_hash);
        Ok(address)
    }
}

/// Turns an RPC error that carries a revert into a typed rejection.
fn classify_rpc_revert(err: anyhow::Error) -> anyhow::Error {
    let classified = match err.downcast_ref::<GatewayError>() {
        Some(GatewayError::Rpc { message, data, .. })
            if data.is_some() || message.to_lowercase().contains("revert") =>
        {
            Some(classify_revert(data.as_deref(), message))
        }
        _ => None,
    };
    match classified {
        Some(rejection) => rejection.into(),
        None => err,
    }
}
