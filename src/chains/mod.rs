//! Chain client implementations
//!
//! One HTTP client per chain family: JSON-RPC for EVM nodes and the java-tron
//! HTTP API for Tron nodes. Both sign transactions locally.

pub mod evm;
pub mod rlp;
pub mod tvm;

pub use evm::{EvmClient, EvmLog, TransactionReceipt, TransferLog};
pub use rlp::LegacyTransaction;
pub use tvm::{TransactionInfo, TronClient, TronEvent, TronTransaction};

use crate::error::GatewayError;

/// Parses a `0x`-prefixed hex quantity.
pub(crate) fn parse_quantity(field: &'static str, value: &str) -> Result<u128, GatewayError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16).map_err(|e| GatewayError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}
