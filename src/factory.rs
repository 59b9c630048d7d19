//! Gateway Contract Surface
//!
//! Call data builders for the externally-deployed Gateway factory, its
//! per-user sub-contracts and ERC20/TRC20 tokens. Contract logic lives on chain;
//! this module only knows the function and event signatures.

use serde::{Deserialize, Serialize};

use crate::abi::{encode_args, encode_call, Token};
use crate::predictor::Salt;

pub const OWNER: &str = "owner()";
pub const TRANSFER_OWNERSHIP: &str = "transferOwnership(address)";
pub const RENOUNCE_OWNERSHIP: &str = "renounceOwnership()";
pub const WITHDRAW: &str = "withdraw(address,uint256,address)";
pub const BALANCE_OF: &str = "balanceOf(address)";
pub const TRANSFER: &str = "transfer(address,uint256)";
pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";

/// Which creation entry point the factory exposes.
///
/// The EVM Gateway deploys a `Wallet(owner = msg.sender)` per salt; the Tron
/// Gateway deploys an `Account(recipient)` per (recipient, salt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactoryMethod {
    /// `createWallet(bytes32)`, event `CreateWallet(address)`, map `wallets(address)`
    CreateWallet,
    /// `create(address,bytes32)`, event `Create(address)`, map `accounts(address)`
    Create,
}

impl FactoryMethod {
    pub fn create_signature(&self) -> &'static str {
        match self {
            FactoryMethod::CreateWallet => "createWallet(bytes32)",
            FactoryMethod::Create => "create(address,bytes32)",
        }
    }

    pub fn event_signature(&self) -> &'static str {
        match self {
            FactoryMethod::CreateWallet => "CreateWallet(address)",
            FactoryMethod::Create => "Create(address)",
        }
    }

    pub fn existence_signature(&self) -> &'static str {
        match self {
            FactoryMethod::CreateWallet => "wallets(address)",
            FactoryMethod::Create => "accounts(address)",
        }
    }

    /// Arguments of the creation call. `recipient` is ignored by `createWallet`,
    /// whose owner is the transaction sender.
    pub fn create_args(&self, recipient: &[u8; 20], salt: &Salt) -> Vec<Token> {
        match self {
            FactoryMethod::CreateWallet => vec![Token::Bytes32(*salt.as_bytes())],
            FactoryMethod::Create => vec![Token::Address(*recipient), Token::Bytes32(*salt.as_bytes())],
        }
    }

    pub fn encode_create(&self, recipient: &[u8; 20], salt: &Salt) -> Vec<u8> {
        encode_call(self.create_signature(), &self.create_args(recipient, salt))
    }

    pub fn encode_exists(&self, address: &[u8; 20]) -> Vec<u8> {
        encode_call(self.existence_signature(), &[Token::Address(*address)])
    }
}

pub fn encode_owner() -> Vec<u8> {
    encode_call(OWNER, &[])
}

pub fn encode_transfer_ownership(new_owner: &[u8; 20]) -> Vec<u8> {
    encode_call(TRANSFER_OWNERSHIP, &[Token::Address(*new_owner)])
}

pub fn encode_renounce_ownership() -> Vec<u8> {
    encode_call(RENOUNCE_OWNERSHIP, &[])
}

pub fn withdraw_args(to: &[u8; 20], amount: u128, token: &[u8; 20]) -> Vec<Token> {
    vec![Token::Address(*to), Token::Uint(amount), Token::Address(*token)]
}

pub fn encode_withdraw(to: &[u8; 20], amount: u128, token: &[u8; 20]) -> Vec<u8> {
    encode_call(WITHDRAW, &withdraw_args(to, amount, token))
}

pub fn encode_balance_of(owner: &[u8; 20]) -> Vec<u8> {
    encode_call(BALANCE_OF, &[Token::Address(*owner)])
}

/// Tron `parameter` field for `balanceOf(address)`.
pub fn balance_of_parameter(owner: &[u8; 20]) -> Vec<u8> {
    encode_args(&[Token::Address(*owner)])
}

pub fn token_transfer_args(to: &[u8; 20], amount: u128) -> Vec<Token> {
    vec![Token::Address(*to), Token::Uint(amount)]
}

pub fn encode_token_transfer(to: &[u8; 20], amount: u128) -> Vec<u8> {
    encode_call(TRANSFER, &token_transfer_args(to, amount))
}

/// Renders an integer amount with `decimals` fractional digits (`formatUnits`).
pub fn format_units(value: u128, decimals: u32) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let digits = format!("{:0>width$}", value, width = decimals as usize + 1);
    let (int_part, frac_part) = digits.split_at(digits.len() - decimals as usize);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

/// Parses a decimal amount with `decimals` fractional digits (`parseUnits`).
pub fn parse_units(value: &str, decimals: u32) -> anyhow::Result<u128> {
    let (int_part, frac_part) = match value.split_once('.') {
        Some((i, f)) => (i, f),
        None => (value, ""),
    };
    if frac_part.len() > decimals as usize {
        anyhow::bail!("Amount '{}' has more than {} decimals", value, decimals);
    }
    let int_value: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse()?
    };
    let frac_padded = format!("{:0<width$}", frac_part, width = decimals as usize);
    let frac_value: u128 = if frac_padded.is_empty() {
        0
    } else {
        frac_padded.parse()?
    };
    let scale = 10u128
        .checked_pow(decimals)
        .ok_or_else(|| anyhow::anyhow!("Too many decimals: {}", decimals))?;
    int_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| anyhow::anyhow!("Amount '{}' overflows", value))
}
