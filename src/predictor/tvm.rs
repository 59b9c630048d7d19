//! TVM (Tron) CREATE2 prediction.
//!
//! Tron replaces the `0xff` marker with its network byte and works on the
//! 20-byte core of each address. The recipient is the single `address`
//! constructor argument of the account contract, zero-padded to a full word.

use super::{create2_address, InitCode, Salt, TVM_CREATE2_PREFIX};
use crate::address::TronAddress;
use crate::error::GatewayError;

/// Builds `bytecode ++ pad32(recipient_core)`.
pub fn build_init_code(bytecode: &[u8], recipient: &TronAddress) -> InitCode {
    InitCode::new(bytecode).with_address_arg(&recipient.core())
}

/// Predicts an account address from typed inputs.
pub fn predict_account_address(
    factory: &TronAddress,
    recipient: &TronAddress,
    salt: &Salt,
    bytecode: &[u8],
) -> TronAddress {
    let init_code = build_init_code(bytecode, recipient);
    TronAddress::from_core(create2_address(
        TVM_CREATE2_PREFIX,
        &factory.core(),
        salt,
        &init_code.hash(),
    ))
}

/// Predicts an account address from string inputs.
///
/// # Arguments
///
/// * `factory` - Factory address in base58, `41` hex or `0x` hex form
/// * `recipient` - Recipient address (base58)
/// * `salt_hex` - 32-byte salt as hex
/// * `bytecode` - Account contract creation bytecode
///
/// # Returns
///
/// * `Ok(String)` - `0x` + 40 lowercase hex characters
/// * `Err(GatewayError::InvalidAddressEncoding)` - an address failed to decode or lacks the `0x41` prefix
/// * `Err(GatewayError::InvalidInputLength)` - salt is not 32 bytes
pub fn predict(
    factory: &str,
    recipient: &str,
    salt_hex: &str,
    bytecode: &[u8],
) -> Result<String, GatewayError> {
    let factory: TronAddress = factory.parse()?;
    let recipient: TronAddress = recipient.parse()?;
    let salt = Salt::from_hex(salt_hex)?;

    Ok(predict_account_address(&factory, &recipient, &salt, bytecode).to_evm_hex())
}
