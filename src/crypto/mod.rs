//! Cryptographic Operations Module
//!
//! Hashing primitives (Keccak-256, SHA-256) and the secp256k1 transaction
//! signer shared by the EVM and Tron clients. Both chains derive account
//! addresses from the same key material: `keccak256(uncompressed_pubkey)[12..]`,
//! with Tron prefixing the network byte `0x41`.
//!
//! ## Security Requirements
//!
//! Private keys must never be exposed or logged.

use anyhow::{Context, Result};
use k256::ecdsa::{
    Signature as EcdsaSignature, SigningKey as EcdsaSigningKey, VerifyingKey as EcdsaVerifyingKey,
};
use sha2::Sha256;
use sha3::{Digest, Keccak256};

use crate::address::{EvmAddress, TronAddress};

// ============================================================================
// HASHING
// ============================================================================

/// Network-standard Keccak-256 (the `sha3` of web3 libraries, not NIST SHA3-256).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256, used for salts derived from user labels and Tron transaction ids.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Keccak-256 of an event signature string, rendered as a `0x` topic.
pub fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}

/// First four bytes of `keccak256(signature)`.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

// ============================================================================
// TRANSACTION SIGNER
// ============================================================================

/// secp256k1 signer for locally-built transactions.
pub struct TransactionSigner {
    signing_key: EcdsaSigningKey,
}

impl std::fmt::Debug for TransactionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSigner")
            .field("address", &self.evm_address())
            .finish_non_exhaustive()
    }
}

impl TransactionSigner {
    /// Creates a signer from a 32-byte hex private key (with or without `0x`).
    ///
    /// # Returns
    ///
    /// * `Ok(TransactionSigner)` - Key parsed successfully
    /// * `Err(anyhow::Error)` - Key is not 32 bytes of valid hex or not a valid scalar
    pub fn from_hex(private_key: &str) -> Result<Self> {
        let key_hex = private_key.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);
        let key_bytes = hex::decode(key_hex).context("Private key is not valid hex")?;
        if key_bytes.len() != 32 {
            anyhow::bail!(
                "Invalid private key length: expected 32 bytes, got {}",
                key_bytes.len()
            );
        }
        let mut key_array = [0u8; 32];
        key_array.copy_from_slice(&key_bytes);

        let signing_key = EcdsaSigningKey::from_bytes(&key_array.into())
            .map_err(|e| anyhow::anyhow!("Failed to create ECDSA signing key: {}", e))?;

        Ok(Self { signing_key })
    }

    /// Uncompressed public key without the `0x04` marker (64 bytes).
    fn public_key_xy(&self) -> Vec<u8> {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        point.as_bytes()[1..].to_vec()
    }

    /// Ethereum account address of this key.
    pub fn evm_address(&self) -> EvmAddress {
        let hash = keccak256(&self.public_key_xy());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash[12..32]);
        EvmAddress::new(bytes)
    }

    /// Tron account address of this key (same core bytes, `0x41` prefix).
    pub fn tron_address(&self) -> TronAddress {
        TronAddress::from_core(*self.evm_address().as_bytes())
    }

    /// Signs a 32-byte digest without any message prefix.
    ///
    /// # Returns
    ///
    /// * `Ok((r, s, recovery_id))` - r and s are 32-byte big-endian, recovery_id is 0 or 1
    pub fn sign_prehash(&self, digest: &[u8; 32]) -> Result<([u8; 32], [u8; 32], u8)> {
        use k256::ecdsa::signature::hazmat::PrehashSigner;
        let signature: EcdsaSignature = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|e| anyhow::anyhow!("Failed to sign digest: {}", e))?;

        let sig_bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&sig_bytes[..32]);
        s.copy_from_slice(&sig_bytes[32..64]);

        // Recovery id: whichever of 0/1 recovers our own public key
        let own_point = self.signing_key.verifying_key().to_encoded_point(false);
        let recovery_id_0 = k256::ecdsa::RecoveryId::try_from(0u8)
            .map_err(|e| anyhow::anyhow!("Invalid recovery id: {}", e))?;
        let recovery_id = match EcdsaVerifyingKey::recover_from_prehash(digest, &signature, recovery_id_0) {
            Ok(recovered) if recovered.to_encoded_point(false) == own_point => 0u8,
            _ => 1u8,
        };

        Ok((r, s, recovery_id))
    }
}
