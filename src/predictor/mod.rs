//! CREATE2 Address Prediction
//!
//! Both chain families share one derivation:
//!
//! ```text
//! address = keccak256(prefix ++ creator ++ salt ++ keccak256(init_code))[12..32]
//! ```
//!
//! EVM uses the `0xff` marker byte; TVM replaces it with its network byte `0x41`
//! and re-attaches that prefix to the resulting 20 bytes. Everything here is pure:
//! the same inputs always produce the same address.

pub mod evm;
pub mod tvm;

use std::fmt;

use crate::address::{pad_address_word, EvmAddress, TronAddress};
use crate::crypto::{keccak256, sha256};
use crate::error::{decode_hex, GatewayError};

/// Preimage marker byte for EVM CREATE2.
pub const EVM_CREATE2_PREFIX: u8 = 0xff;

/// Preimage marker byte for TVM CREATE2 (the Tron network prefix).
pub const TVM_CREATE2_PREFIX: u8 = 0x41;

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Caller-chosen 32-byte value disambiguating deployments from one factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Salt([u8; 32]);

impl Salt {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, GatewayError> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| GatewayError::InvalidInputLength {
                field: "salt",
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }

    /// Parses 32 bytes of hex, with or without `0x`.
    pub fn from_hex(value: &str) -> Result<Self, GatewayError> {
        Self::from_slice(&decode_hex("salt", value)?)
    }

    /// SHA-256 of a user label, e.g. `Salt::from_label("user1")`.
    pub fn from_label(label: &str) -> Self {
        Self(sha256(label.as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Contract bytecode followed by its ABI-encoded constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InitCode(Vec<u8>);

impl InitCode {
    pub fn new(bytecode: &[u8]) -> Self {
        Self(bytecode.to_vec())
    }

    /// Appends already-encoded constructor arguments.
    pub fn with_encoded_args(mut self, args: &[u8]) -> Self {
        self.0.extend_from_slice(args);
        self
    }

    /// Appends a single `address` constructor argument as a left-padded word.
    pub fn with_address_arg(mut self, core: &[u8; 20]) -> Self {
        self.0.extend_from_slice(&pad_address_word(core));
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn hash(&self) -> [u8; 32] {
        keccak256(&self.0)
    }
}

// ============================================================================
// SHARED DERIVATION
// ============================================================================

/// Core CREATE2 derivation over already-validated inputs.
pub fn create2_address(
    prefix: u8,
    creator: &[u8; 20],
    salt: &Salt,
    init_code_hash: &[u8; 32],
) -> [u8; 20] {
    // prefix (1) || creator (20) || salt (32) || init_code_hash (32) = 85 bytes
    let mut preimage = [0u8; 85];
    preimage[0] = prefix;
    preimage[1..21].copy_from_slice(creator);
    preimage[21..53].copy_from_slice(salt.as_bytes());
    preimage[53..85].copy_from_slice(init_code_hash);

    let hash = keccak256(&preimage);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    address
}

// ============================================================================
// POLYMORPHIC PREDICTOR
// ============================================================================

/// Chain family selecting the byte layout of the CREATE2 preimage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPredictor {
    Evm,
    Tvm,
}

/// Address predicted for a not-yet-deployed sub-contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictedAddress {
    Evm(EvmAddress),
    Tvm(TronAddress),
}

impl PredictedAddress {
    /// The 20 bytes shared by both representations.
    pub fn core(&self) -> [u8; 20] {
        match self {
            PredictedAddress::Evm(addr) => *addr.as_bytes(),
            PredictedAddress::Tvm(addr) => addr.core(),
        }
    }
}

impl fmt::Display for PredictedAddress {
    /// `0x` hex for both families, matching what each chain's event decoder reports.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictedAddress::Evm(addr) => write!(f, "{}", addr),
            PredictedAddress::Tvm(addr) => f.write_str(&addr.to_evm_hex()),
        }
    }
}

impl AddressPredictor {
    /// Marker byte placed in front of the creator in the preimage.
    pub fn preimage_prefix(&self) -> u8 {
        match self {
            AddressPredictor::Evm => EVM_CREATE2_PREFIX,
            AddressPredictor::Tvm => TVM_CREATE2_PREFIX,
        }
    }

    /// Normalizes a factory address string to its 20-byte core.
    ///
    /// EVM expects `0x` hex; TVM accepts base58, `41` hex or `0x` hex.
    pub fn factory_core(&self, factory: &str) -> Result<[u8; 20], GatewayError> {
        match self {
            AddressPredictor::Evm => Ok(*factory.parse::<EvmAddress>()?.as_bytes()),
            AddressPredictor::Tvm => Ok(factory.parse::<TronAddress>()?.core()),
        }
    }

    /// Predicts the address for arbitrary init code.
    pub fn predict(
        &self,
        factory: &str,
        salt: &Salt,
        init_code: &InitCode,
    ) -> Result<PredictedAddress, GatewayError> {
        let creator = self.factory_core(factory)?;
        let address = create2_address(self.preimage_prefix(), &creator, salt, &init_code.hash());
        Ok(match self {
            AddressPredictor::Evm => PredictedAddress::Evm(EvmAddress::new(address)),
            AddressPredictor::Tvm => PredictedAddress::Tvm(TronAddress::from_core(address)),
        })
    }

    /// Predicts a sub-contract whose constructor takes exactly one `address`
    /// (the wallet owner on EVM, the account recipient on TVM).
    pub fn predict_with_address_arg(
        &self,
        factory: &str,
        constructor_address: &str,
        salt: &Salt,
        bytecode: &[u8],
    ) -> Result<PredictedAddress, GatewayError> {
        let arg = self.factory_core(constructor_address)?;
        let init_code = InitCode::new(bytecode).with_address_arg(&arg);
        self.predict(factory, salt, &init_code)
    }
}
