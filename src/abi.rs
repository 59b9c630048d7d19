//! ABI Encoding Helpers
//!
//! Just enough of the Solidity ABI for the gateway surface: static argument
//! words, call data, return-value decoding and revert classification. Every
//! function this crate calls takes only `address`, `bytes32` and `uint256`.

use crate::address::pad_address_word;
use crate::crypto::function_selector;
use crate::error::{decode_hex, GatewayError};

/// Selector of the built-in `Error(string)` revert.
const ERROR_STRING_SIGNATURE: &str = "Error(string)";

/// Custom errors that mean the caller is not the owner.
const AUTHORIZATION_ERRORS: &[&str] = &["OwnableUnauthorizedAccount(address)"];

/// Custom errors raised when CREATE2 hits an already-occupied address.
const DUPLICATE_SALT_ERRORS: &[&str] = &["FailedDeployment()", "Create2FailedDeployment()"];

/// A single static ABI argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Address([u8; 20]),
    Bytes32([u8; 32]),
    Uint(u128),
}

impl Token {
    fn to_word(self) -> [u8; 32] {
        match self {
            Token::Address(core) => pad_address_word(&core),
            Token::Bytes32(bytes) => bytes,
            Token::Uint(value) => {
                let mut word = [0u8; 32];
                word[16..].copy_from_slice(&value.to_be_bytes());
                word
            }
        }
    }
}

/// Encodes arguments without a selector (Tron `parameter` field, constructor args).
pub fn encode_args(args: &[Token]) -> Vec<u8> {
    let mut data = Vec::with_capacity(args.len() * 32);
    for arg in args {
        data.extend_from_slice(&arg.to_word());
    }
    data
}

/// Encodes `selector(signature) ++ args`.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = function_selector(signature).to_vec();
    data.extend(encode_args(args));
    data
}

/// Splits return data into 32-byte words.
fn words(field: &'static str, data: &str) -> Result<Vec<[u8; 32]>, GatewayError> {
    let bytes = decode_hex(field, data)?;
    if bytes.is_empty() || bytes.len() % 32 != 0 {
        return Err(GatewayError::InvalidInputLength {
            field,
            expected: 32,
            actual: bytes.len(),
        });
    }
    Ok(bytes
        .chunks(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

/// Decodes an ABI `bool` return value.
pub fn decode_bool(data: &str) -> Result<bool, GatewayError> {
    let word = words("bool return", data)?[0];
    Ok(word[31] == 1 && word[..31].iter().all(|b| *b == 0))
}

/// Decodes an ABI `address` return value into its 20-byte core.
pub fn decode_address(data: &str) -> Result<[u8; 20], GatewayError> {
    let word = words("address return", data)?[0];
    let mut core = [0u8; 20];
    core.copy_from_slice(&word[12..]);
    Ok(core)
}

/// Decodes an ABI `uint256` return value; fails if it does not fit in `u128`.
pub fn decode_uint(data: &str) -> Result<u128, GatewayError> {
    let word = words("uint256 return", data)?[0];
    if word[..16].iter().any(|b| *b != 0) {
        return Err(GatewayError::InvalidHex {
            field: "uint256 return",
            reason: "value exceeds 128 bits".to_string(),
        });
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

/// Decodes the message of an `Error(string)` revert payload.
pub fn decode_error_string(data: &[u8]) -> Option<String> {
    if data.len() < 4 + 64 || data[..4] != function_selector(ERROR_STRING_SIGNATURE) {
        return None;
    }
    let body = &data[4..];
    let len_word = &body[32..64];
    if len_word[..24].iter().any(|b| *b != 0) {
        return None;
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&len_word[24..]);
    let len = usize::try_from(u64::from_be_bytes(len_bytes)).ok()?;
    let text = body.get(64..64usize.checked_add(len)?)?;
    String::from_utf8(text.to_vec()).ok()
}

/// Maps revert data and/or a node error message to a typed rejection.
///
/// # Arguments
///
/// * `data` - Hex revert payload, if the node returned one
/// * `message` - Human-readable error message from the node
pub fn classify_revert(data: Option<&str>, message: &str) -> GatewayError {
    let payload = data
        .and_then(|d| decode_hex("revert data", d).ok())
        .unwrap_or_default();

    let selector_matches = |signatures: &[&str]| {
        payload.len() >= 4
            && signatures
                .iter()
                .any(|sig| payload[..4] == function_selector(sig))
    };

    let reason = decode_error_string(&payload).unwrap_or_else(|| message.to_string());
    let lowered = reason.to_lowercase();

    if selector_matches(AUTHORIZATION_ERRORS)
        || reason.contains("OwnableUnauthorizedAccount")
        || lowered.contains("not the owner")
        || lowered.contains("not owner")
    {
        return GatewayError::Authorization {
            reason: if selector_matches(AUTHORIZATION_ERRORS) {
                "OwnableUnauthorizedAccount".to_string()
            } else {
                reason
            },
        };
    }

    if selector_matches(DUPLICATE_SALT_ERRORS) || lowered.contains("exist") {
        return GatewayError::DuplicateSalt { reason };
    }

    GatewayError::Reverted { reason }
}
