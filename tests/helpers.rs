//! Shared test helpers for gateway tests
//!
//! This module provides constants, a recording sleeper and mock-response
//! builders used by the predictor, client and correlator tests.

#![allow(dead_code)]

use create2_gateway::correlator::Sleeper;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// CONSTANTS
// ============================================================================

// --------------------------------- KEYS ---------------------------------

/// Test private key (the EIP-155 example key)
pub const DUMMY_PRIVATE_KEY: &str =
    "0x4646464646464646464646464646464646464646464646464646464646464646";

/// EVM address of `DUMMY_PRIVATE_KEY`
pub const DUMMY_SENDER_ADDR_EVM: &str = "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f";

/// Tron address of `DUMMY_PRIVATE_KEY` (same core, `0x41` prefix)
pub const DUMMY_SENDER_ADDR_TVM: &str = "TQLCsShbQNXMTVCjprY64qZmEA4rBarpQp";

/// Second test key (scalar 1), never an owner in the fixtures
pub const DUMMY_OTHER_PRIVATE_KEY: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000001";

/// EVM address of `DUMMY_OTHER_PRIVATE_KEY`
pub const DUMMY_OTHER_ADDR_EVM: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";

/// Tron address of `DUMMY_OTHER_PRIVATE_KEY`
pub const DUMMY_OTHER_ADDR_TVM: &str = "TMVQGm1qAQYVdetCeGRRkTWYYrLXuHK2HC";

// ------------------------------ CONTRACTS -------------------------------

/// Dummy factory address (EVM format, 40 hex characters)
pub const DUMMY_FACTORY_ADDR_EVM: &str = "0x000000000000000000000000000000000000000f";

/// The same factory core as a Tron base58 address
pub const DUMMY_FACTORY_ADDR_TVM: &str = "T9yD14Nj9j7xAB4dbGeiX9h8unkLvQbFxh";

/// Dummy account recipient (Tron base58, core `00..aa`)
pub const DUMMY_RECIPIENT_ADDR_TVM: &str = "T9yD14Nj9j7xAB4dbGeiX9h8unkeStP68h";

/// Dummy token address (EVM format, 40 hex characters)
pub const DUMMY_TOKEN_ADDR_EVM: &str = "0x000000000000000000000000000000000000000a";

/// Sub-contract creation bytecode used throughout the tests
pub const DUMMY_BYTECODE: &str = "6080604052";

/// `Salt::from_label("user1")`
pub const DUMMY_SALT_HEX: &str =
    "0a041b9462caa4a31bac3567e0b6e6fd9100787db2ab433d96f6d178cabfce90";

// ------------------------------ PREDICTIONS -----------------------------

/// `createWallet` prediction: factory 0x..0f, owner = sender, salt "user1", bytecode 0x6080604052
pub const EXPECTED_WALLET_ADDR_EVM: &str = "0xb681854c949765f9bef3c9f7a5e2a2d00493fe82";

/// `create` prediction on Tron: factory 0x..0f, recipient 0x..aa, salt "user1", bytecode 0x6080604052
pub const EXPECTED_ACCOUNT_ADDR_TVM: &str = "0x86728dde9ca12d414e786a8c64d4c2563f621485";

/// TVM prediction for the sender as constructor argument (same inputs as the EVM wallet)
pub const EXPECTED_SENDER_ACCOUNT_ADDR_TVM: &str = "0x7dcc0bd7ce170419084ab5d4cab7e4885ff3f8bb";

/// Result of the unpadded recipient concatenation; must never be produced
pub const UNPADDED_ACCOUNT_ADDR_TVM: &str = "0x52ae32b91eca8b7eb08e0acca2b3a613e39d3c72";

// ------------------------------ SELECTORS -------------------------------

pub const SELECTOR_CREATE_WALLET: &str = "1d647605";
pub const SELECTOR_CREATE: &str = "a3def923";
pub const SELECTOR_WALLETS: &str = "89b08f11";
pub const SELECTOR_ACCOUNTS: &str = "5e5c06e2";

/// keccak256("CreateWallet(address)")
pub const TOPIC_CREATE_WALLET: &str =
    "0x8e4ea796fcc01724fbc5f1860219b107c90d35650f18d63eea7db33505080d85";

/// `OwnableUnauthorizedAccount(address)` revert with the sender as argument
pub const OWNABLE_REVERT_DATA: &str =
    "0x118cdaa70000000000000000000000009d8a62f656a8d1615c1294fd71e9cfb3e4855a4f";

/// `FailedDeployment()` revert
pub const FAILED_DEPLOYMENT_REVERT_DATA: &str = "0xb06ebf3d";

// -------------------------------- HASHES --------------------------------

/// Dummy transaction hash (64 hex characters)
pub const DUMMY_TX_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000123";

/// Dummy log filter id
pub const DUMMY_FILTER_ID: &str = "0x1";

/// ABI `true`
pub const ABI_TRUE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

/// ABI `false`
pub const ABI_FALSE: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

// ============================================================================
// HELPERS
// ============================================================================

/// Sleeper that returns immediately and counts calls.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    calls: AtomicU32,
    durations: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn durations(&self) -> Vec<Duration> {
        self.durations.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.durations.lock().unwrap().push(duration);
        Box::pin(async {})
    }
}

/// `OwnableUnauthorizedAccount(account)` revert data for any caller.
pub fn ownable_revert_data(account: &str) -> String {
    format!("0x118cdaa7{}", &address_topic(account)[2..])
}

/// Left-pads a `0x` address into a 32-byte topic.
pub fn address_topic(address: &str) -> String {
    format!(
        "0x000000000000000000000000{}",
        address.strip_prefix("0x").unwrap_or(address)
    )
}
