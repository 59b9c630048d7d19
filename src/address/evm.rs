use std::fmt;
use std::str::FromStr;

use crate::crypto::keccak256;
use crate::error::GatewayError;

/// 20-byte EVM account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EvmAddress([u8; 20]);

impl EvmAddress {
    /// The zero address (`renounceOwnership` leaves the owner here).
    pub const ZERO: EvmAddress = EvmAddress([0u8; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Builds an address from a slice, rejecting anything but 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, GatewayError> {
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| GatewayError::InvalidInputLength {
                field: "address",
                expected: 20,
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }

    /// Extracts the address from a 32-byte ABI word or log topic (`0x` + 64 hex).
    pub fn from_word_hex(word: &str) -> Result<Self, GatewayError> {
        let bytes = crate::error::decode_hex("address word", word)?;
        if bytes.len() != 32 {
            return Err(GatewayError::InvalidInputLength {
                field: "address word",
                expected: 32,
                actual: bytes.len(),
            });
        }
        Self::from_slice(&bytes[12..])
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Mixed-case EIP-55 rendering, as returned by viem/ethers.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for EvmAddress {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let stripped = trimmed.strip_prefix("0x").ok_or_else(|| {
            GatewayError::InvalidAddressEncoding {
                value: s.to_string(),
                reason: "EVM address must be 0x-prefixed hex".to_string(),
            }
        })?;
        let bytes = hex::decode(stripped).map_err(|e| GatewayError::InvalidAddressEncoding {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
