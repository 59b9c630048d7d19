//! RLP encoding and legacy (EIP-155) transaction assembly.

use anyhow::Result;

use crate::address::EvmAddress;
use crate::crypto::{keccak256, TransactionSigner};

// ============================================================================
// RLP ENCODING HELPERS
// ============================================================================

/// Big-endian bytes with no leading zeros (RLP integer format).
pub(crate) fn rlp_encode_u64(val: u64) -> Vec<u8> {
    trim_leading_zeros(&val.to_be_bytes())
}

pub(crate) fn rlp_encode_u128(val: u128) -> Vec<u8> {
    trim_leading_zeros(&val.to_be_bytes())
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

/// RLP-encode a single byte-string item.
pub(crate) fn rlp_encode_item(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        vec![data[0]]
    } else if data.len() <= 55 {
        let mut out = vec![0x80 + data.len() as u8];
        out.extend_from_slice(data);
        out
    } else {
        let len_bytes = rlp_encode_u64(data.len() as u64);
        let mut out = vec![0xb7 + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out.extend_from_slice(data);
        out
    }
}

/// RLP-encode a list of raw byte strings (items are NOT pre-encoded).
pub(crate) fn rlp_encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let mut payload = Vec::new();
    for item in items {
        payload.extend(rlp_encode_item(item));
    }

    if payload.len() <= 55 {
        let mut out = vec![0xc0 + payload.len() as u8];
        out.extend(payload);
        out
    } else {
        let len_bytes = rlp_encode_u64(payload.len() as u64);
        let mut out = vec![0xf7 + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out.extend(payload);
        out
    }
}

// ============================================================================
// LEGACY TRANSACTION
// ============================================================================

/// Pre-EIP-1559 transaction; works against public RPCs that hold no keys.
#[derive(Debug, Clone)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u64,
    pub gas_limit: u64,
    /// `None` deploys a contract
    pub to: Option<EvmAddress>,
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl LegacyTransaction {
    fn base_items(&self) -> Vec<Vec<u8>> {
        vec![
            rlp_encode_u64(self.nonce),
            rlp_encode_u64(self.gas_price),
            rlp_encode_u64(self.gas_limit),
            self.to.map(|a| a.as_bytes().to_vec()).unwrap_or_default(),
            rlp_encode_u128(self.value),
            self.data.clone(),
        ]
    }

    /// Keccak hash of `[nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]`.
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut items = self.base_items();
        items.push(rlp_encode_u64(self.chain_id));
        items.push(vec![]);
        items.push(vec![]);
        keccak256(&rlp_encode_list(&items))
    }

    /// Signs and returns the raw transaction as `0x` hex.
    pub fn sign(&self, signer: &TransactionSigner) -> Result<String> {
        let (r, s, recovery_id) = signer.sign_prehash(&self.signing_hash())?;

        // EIP-155: v = recovery_id + chainId * 2 + 35
        let v = recovery_id as u64 + self.chain_id * 2 + 35;

        let mut items = self.base_items();
        items.push(rlp_encode_u64(v));
        items.push(trim_leading_zeros(&r));
        items.push(trim_leading_zeros(&s));
        Ok(format!("0x{}", hex::encode(rlp_encode_list(&items))))
    }
}
