//! Transaction Correlator
//!
//! Submits a factory creation call and confirms the on-chain result against
//! the CREATE2 prediction:
//!
//! ```text
//! Idle -> Submitted -> AwaitingConfirmation -> Confirmed | TimedOut | Rejected
//! ```
//!
//! EVM chains watch a log filter installed before submission; Tron chains poll
//! the event server for the transaction's events. Both wait through
//! [`poll_until`], whose sleeping is injected via [`Sleeper`].

pub mod evm;
pub mod tvm;

pub use evm::EvmCorrelator;
pub use tvm::TvmCorrelator;

use futures::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::error::GatewayError;
use crate::predictor::{PredictedAddress, Salt};

// ============================================================================
// POLLING
// ============================================================================

/// Source of delays for polling loops.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

/// Wall-clock sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Fixed-interval, bounded polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    /// One second between polls, ten polls.
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_attempts: 10,
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Schedule for waiting on creation events.
    pub fn events(service: &ServiceConfig) -> Self {
        Self::new(service.polling_interval(), service.max_poll_attempts)
    }

    /// Schedule for waiting on transaction receipts.
    pub fn receipts(service: &ServiceConfig) -> Self {
        Self::new(service.polling_interval(), service.receipt_poll_attempts)
    }
}

/// Runs `check` up to `policy.max_attempts` times, sleeping `policy.interval`
/// before each attempt.
///
/// The check returns `Ok(Some(value))` when done, `Ok(None)` to keep waiting,
/// and `Err` to abort immediately (the error is returned unchanged).
///
/// # Returns
///
/// * `Ok(T)` - Value produced by the first successful check
/// * `Err(GatewayError::Timeout)` - Attempt budget exhausted
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    sleeper: &dyn Sleeper,
    what: &str,
    mut check: F,
) -> Result<T, GatewayError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, GatewayError>>,
{
    for attempt in 1..=policy.max_attempts {
        sleeper.sleep(policy.interval).await;
        if let Some(value) = check(attempt).await? {
            debug!("Observed {} on attempt {}/{}", what, attempt, policy.max_attempts);
            return Ok(value);
        }
        debug!(
            "Waiting for {} (attempt {}/{})",
            what, attempt, policy.max_attempts
        );
    }

    warn!("Gave up waiting for {} after {} attempts", what, policy.max_attempts);
    Err(GatewayError::Timeout {
        what: what.to_string(),
        attempts: policy.max_attempts,
    })
}

// ============================================================================
// CORRELATION STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationState {
    Idle,
    /// Creation transaction sent
    Submitted,
    /// Waiting for inclusion and for the creation event
    AwaitingConfirmation,
    /// Event observed, address matches, existence flipped to true
    Confirmed,
    /// Wait window exhausted without the event
    TimedOut,
    /// The chain refused the call (authorization, duplicate salt, revert)
    Rejected,
    /// Any other failure: mismatch, missing persistence, network
    Failed,
}

impl CorrelationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CorrelationState::Confirmed
                | CorrelationState::TimedOut
                | CorrelationState::Rejected
                | CorrelationState::Failed
        )
    }

    /// Terminal state reached through `err`.
    pub fn after_error(err: &GatewayError) -> Self {
        match err {
            GatewayError::Timeout { .. } => CorrelationState::TimedOut,
            err if err.is_rejection() => CorrelationState::Rejected,
            _ => CorrelationState::Failed,
        }
    }
}

// ============================================================================
// REQUEST / RESULT
// ============================================================================

/// One sub-contract creation.
#[derive(Debug, Clone)]
pub struct CreationRequest {
    pub salt: Salt,
    /// Constructor address for `create(address,bytes32)`; `createWallet`
    /// uses the sender instead
    pub recipient: Option<String>,
    /// Sub-contract creation bytecode, without constructor arguments
    pub bytecode: Vec<u8>,
}

impl CreationRequest {
    pub fn new(salt: Salt, bytecode: Vec<u8>) -> Self {
        Self {
            salt,
            recipient: None,
            bytecode,
        }
    }

    pub fn with_recipient(mut self, recipient: &str) -> Self {
        self.recipient = Some(recipient.to_string());
        self
    }

    /// The recipient, required by `create(address,bytes32)`.
    pub(crate) fn required_recipient(&self) -> Result<&str, GatewayError> {
        self.recipient
            .as_deref()
            .ok_or_else(|| GatewayError::InvalidAddressEncoding {
                value: String::new(),
                reason: "create(address,bytes32) needs a recipient address".to_string(),
            })
    }
}

/// Creation event emitted by the factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationEvent {
    pub transaction_id: String,
    /// Emitted address as lowercase `0x` hex of the 20-byte core
    pub address: String,
    pub block_number: Option<u64>,
}

/// Outcome of a confirmed creation.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub predicted: PredictedAddress,
    pub event: CreationEvent,
    /// Existence flag before submission (always false for a confirmed creation)
    pub existed_before: bool,
}

/// Fails with `PredictionMismatch` unless the event reports the predicted address.
pub fn verify_emitted(
    predicted: &PredictedAddress,
    event: &CreationEvent,
) -> Result<(), GatewayError> {
    let expected = predicted.to_string();
    if !expected.eq_ignore_ascii_case(&event.address) {
        return Err(GatewayError::PredictionMismatch {
            predicted: expected,
            emitted: event.address.clone(),
        });
    }
    Ok(())
}
