//! Address Types
//!
//! Canonical raw-byte account identifiers for both chain families. Display
//! encodings (hex, EIP-55 checksum, Tron base58check) are lossless views of the
//! raw bytes.

mod evm;
mod tvm;

pub use evm::EvmAddress;
pub use tvm::{TronAddress, TRON_ADDRESS_PREFIX};

/// Left-pads a 20-byte address into a 32-byte ABI word.
pub fn pad_address_word(core: &[u8; 20]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(core);
    word
}
