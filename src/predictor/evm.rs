//! EVM CREATE2 prediction.

use super::{create2_address, InitCode, Salt, EVM_CREATE2_PREFIX};
use crate::address::EvmAddress;
use crate::error::GatewayError;

/// Predicts `keccak256(0xff ++ factory ++ salt ++ keccak256(bytecode ++ args))[12..]`.
///
/// # Arguments
///
/// * `factory` - Raw factory address (must be 20 bytes)
/// * `constructor_args` - ABI-encoded constructor parameters (may be empty)
/// * `bytecode` - Creation bytecode of the sub-contract
/// * `salt` - Raw salt (must be 32 bytes)
///
/// # Returns
///
/// * `Ok(EvmAddress)` - The deterministic address
/// * `Err(GatewayError::InvalidInputLength)` - factory or salt has the wrong length
pub fn predict(
    factory: &[u8],
    constructor_args: &[u8],
    bytecode: &[u8],
    salt: &[u8],
) -> Result<EvmAddress, GatewayError> {
    let factory = EvmAddress::from_slice(factory).map_err(|_| GatewayError::InvalidInputLength {
        field: "factory address",
        expected: 20,
        actual: factory.len(),
    })?;
    let salt = Salt::from_slice(salt)?;
    let init_code = InitCode::new(bytecode).with_encoded_args(constructor_args);

    Ok(EvmAddress::new(create2_address(
        EVM_CREATE2_PREFIX,
        factory.as_bytes(),
        &salt,
        &init_code.hash(),
    )))
}

/// Predicts a Gateway `Wallet` whose constructor is `constructor(address owner)`.
pub fn predict_wallet_address(
    factory: &EvmAddress,
    owner: &EvmAddress,
    salt: &Salt,
    bytecode: &[u8],
) -> EvmAddress {
    let init_code = InitCode::new(bytecode).with_address_arg(owner.as_bytes());
    EvmAddress::new(create2_address(
        EVM_CREATE2_PREFIX,
        factory.as_bytes(),
        salt,
        &init_code.hash(),
    ))
}
