//! CREATE2 gateway library
//!
//! Predicts the deterministic addresses of sub-contracts created by a Gateway
//! factory on EVM and Tron networks, submits creation calls and confirms the
//! emitted creation event against the prediction.

pub mod abi;
pub mod address;
pub mod chains;
pub mod config;
pub mod correlator;
pub mod crypto;
pub mod error;
pub mod factory;
pub mod predictor;

// Re-export public types for convenience
pub use address::{EvmAddress, TronAddress};
pub use chains::{EvmClient, TronClient};
pub use config::{ChainConfig, EvmChainConfig, GatewayConfig, ServiceConfig, TvmChainConfig};
pub use correlator::{
    poll_until, Confirmation, CorrelationState, CreationEvent, CreationRequest, EvmCorrelator,
    PollPolicy, Sleeper, TokioSleeper, TvmCorrelator,
};
pub use crypto::TransactionSigner;
pub use error::GatewayError;
pub use factory::FactoryMethod;
pub use predictor::{AddressPredictor, InitCode, PredictedAddress, Salt};
