//! Error Taxonomy
//!
//! Typed failures shared by the predictors, chain clients and the transaction
//! correlator. Pure input validation fails before any network call; on-chain
//! rejections are surfaced as-is and never retried.

use thiserror::Error;

/// Errors produced while predicting, submitting or correlating a creation.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// A byte value had the wrong length (factory address, salt, ...)
    #[error("invalid {field} length: expected {expected} bytes, got {actual}")]
    InvalidInputLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// An address string could not be decoded into the expected network form
    #[error("invalid address encoding '{value}': {reason}")]
    InvalidAddressEncoding { value: String, reason: String },

    /// A hex string could not be decoded
    #[error("invalid hex for {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    /// A privileged call was made from a non-owner account
    #[error("unauthorized caller: {reason}")]
    Authorization { reason: String },

    /// The factory refused a creation whose (recipient, salt) was already used
    #[error("duplicate salt: {reason}")]
    DuplicateSalt { reason: String },

    /// Any other on-chain revert
    #[error("transaction reverted: {reason}")]
    Reverted { reason: String },

    /// The creation event did not show up within the poll budget
    #[error("timed out after {attempts} attempts waiting for {what}")]
    Timeout { what: String, attempts: u32 },

    /// The emitted address differs from the CREATE2 prediction
    #[error("predicted address {predicted} does not match emitted address {emitted}")]
    PredictionMismatch { predicted: String, emitted: String },

    /// The creation was observed but the factory does not report the address
    #[error("address {address} is not registered by the factory after creation")]
    NotPersisted { address: String },

    /// Transport-level failure talking to a node
    #[error("network error: {0}")]
    Network(String),

    /// Node answered with a JSON-RPC / HTTP API error
    #[error("rpc error ({code}): {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<String>,
    },
}

impl GatewayError {
    /// Returns true for the on-chain rejection variants.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            GatewayError::Authorization { .. }
                | GatewayError::DuplicateSalt { .. }
                | GatewayError::Reverted { .. }
        )
    }

    /// Recovers the typed error carried by a client-layer `anyhow::Error`.
    ///
    /// Anything that is not a `GatewayError` (I/O, decoding) becomes `Network`.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast_ref::<GatewayError>() {
            Some(inner) => inner.clone(),
            None => GatewayError::Network(format!("{:#}", err)),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Network(err.to_string())
    }
}

/// Decodes a hex string with or without the `0x` prefix.
pub fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, GatewayError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped).map_err(|e| GatewayError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}
