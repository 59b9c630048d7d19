use std::fmt;
use std::str::FromStr;

use crate::error::GatewayError;

/// Tron mainnet/testnet network prefix byte.
pub const TRON_ADDRESS_PREFIX: u8 = 0x41;

/// 21-byte Tron address: `0x41` followed by the 20-byte core identifier.
///
/// Accepts base58check (`T...`), raw hex (`41...`) and EVM-style `0x` hex for
/// the 20-byte core. Renders as base58 by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TronAddress([u8; 21]);

impl TronAddress {
    /// Wraps a 20-byte core with the network prefix.
    pub fn from_core(core: [u8; 20]) -> Self {
        let mut raw = [0u8; 21];
        raw[0] = TRON_ADDRESS_PREFIX;
        raw[1..].copy_from_slice(&core);
        Self(raw)
    }

    /// Builds an address from 21 raw bytes; the first must be `0x41`.
    pub fn from_raw(bytes: &[u8]) -> Result<Self, GatewayError> {
        let raw: [u8; 21] = bytes
            .try_into()
            .map_err(|_| GatewayError::InvalidAddressEncoding {
                value: hex::encode(bytes),
                reason: format!("expected 21 bytes, got {}", bytes.len()),
            })?;
        if raw[0] != TRON_ADDRESS_PREFIX {
            return Err(GatewayError::InvalidAddressEncoding {
                value: hex::encode(bytes),
                reason: format!("expected network prefix 0x41, got 0x{:02x}", raw[0]),
            });
        }
        Ok(Self(raw))
    }

    /// Decodes a base58check address.
    pub fn from_base58(value: &str) -> Result<Self, GatewayError> {
        let raw = bs58::decode(value)
            .with_check(None)
            .into_vec()
            .map_err(|e| GatewayError::InvalidAddressEncoding {
                value: value.to_string(),
                reason: e.to_string(),
            })?;
        Self::from_raw(&raw).map_err(|e| match e {
            GatewayError::InvalidAddressEncoding { reason, .. } => {
                GatewayError::InvalidAddressEncoding {
                    value: value.to_string(),
                    reason,
                }
            }
            other => other,
        })
    }

    /// Raw 21 bytes including the prefix.
    pub fn as_bytes(&self) -> &[u8; 21] {
        &self.0
    }

    /// The 20-byte identifier without the network prefix.
    pub fn core(&self) -> [u8; 20] {
        let mut core = [0u8; 20];
        core.copy_from_slice(&self.0[1..]);
        core
    }

    /// Base58check rendering (`T...`).
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).with_check().into_string()
    }

    /// Raw hex rendering with the prefix (`41...`), as used by the node HTTP API.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// `0x`-prefixed lowercase hex of the core, as emitted in event results.
    pub fn to_evm_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0[1..]))
    }
}

impl FromStr for TronAddress {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = |reason: String| GatewayError::InvalidAddressEncoding {
            value: s.to_string(),
            reason,
        };

        if let Some(stripped) = trimmed.strip_prefix("0x") {
            let bytes = hex::decode(stripped).map_err(|e| invalid(e.to_string()))?;
            return match bytes.len() {
                20 => {
                    let mut core = [0u8; 20];
                    core.copy_from_slice(&bytes);
                    Ok(Self::from_core(core))
                }
                21 => Self::from_raw(&bytes),
                n => Err(invalid(format!("expected 20 or 21 bytes, got {}", n))),
            };
        }

        if trimmed.len() == 42 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            let bytes = hex::decode(trimmed).map_err(|e| invalid(e.to_string()))?;
            return Self::from_raw(&bytes);
        }

        Self::from_base58(trimmed)
    }
}

impl fmt::Display for TronAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}
