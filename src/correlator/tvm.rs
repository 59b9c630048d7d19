//! Tron creation correlator
//!
//! Tron has no push subscription here, so after broadcasting the creation
//! call the event server is polled for the transaction's events on a fixed
//! interval. Each attempt also checks the transaction info so a revert ends
//! the wait early.

use std::sync::Arc;
use tracing::{info, warn};

use super::{
    poll_until, verify_emitted, Confirmation, CorrelationState, CreationEvent, CreationRequest,
    PollPolicy, Sleeper, TokioSleeper,
};
use crate::abi::{decode_bool, encode_args, Token};
use crate::address::TronAddress;
use crate::chains::tvm::{TronClient, TronEvent};
use crate::config::{ServiceConfig, TvmChainConfig};
use crate::crypto::TransactionSigner;
use crate::error::GatewayError;
use crate::factory::FactoryMethod;
use crate::predictor::{AddressPredictor, PredictedAddress};

/// Drives one factory on one Tron network.
pub struct TvmCorrelator {
    client: TronClient,
    factory: TronAddress,
    method: FactoryMethod,
    policy: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
    state: CorrelationState,
}

impl TvmCorrelator {
    pub fn new(client: TronClient, factory: TronAddress, method: FactoryMethod) -> Self {
        Self {
            client,
            factory,
            method,
            policy: PollPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            state: CorrelationState::Idle,
        }
    }

    /// Builds a correlator for a configured chain.
    pub fn from_config(config: &TvmChainConfig, service: &ServiceConfig) -> anyhow::Result<Self> {
        let factory = config
            .factory_addr
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Chain '{}' has no factory_addr configured", config.name))?
            .parse::<TronAddress>()?;
        let client = TronClient::from_config(config)?;
        Ok(Self::new(client, factory, config.factory_method).with_policy(PollPolicy::events(service)))
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn state(&self) -> CorrelationState {
        self.state
    }

    pub fn client(&self) -> &TronClient {
        &self.client
    }

    pub fn factory(&self) -> &TronAddress {
        &self.factory
    }

    /// Predicts the sub-contract address a creation by `sender` yields.
    pub fn predict(
        &self,
        sender: &TronAddress,
        request: &CreationRequest,
    ) -> Result<PredictedAddress, GatewayError> {
        let constructor_address = self.constructor_address(sender, request)?;
        AddressPredictor::Tvm.predict_with_address_arg(
            &self.factory.to_base58(),
            &constructor_address.to_base58(),
            &request.salt,
            &request.bytecode,
        )
    }

    fn constructor_address(
        &self,
        sender: &TronAddress,
        request: &CreationRequest,
    ) -> Result<TronAddress, GatewayError> {
        match self.method {
            FactoryMethod::CreateWallet => Ok(*sender),
            FactoryMethod::Create => request.required_recipient()?.parse::<TronAddress>(),
        }
    }

    /// Queries the factory's existence map for `address`, calling as `caller`.
    pub async fn exists(&self, caller: &TronAddress, address: &[u8; 20]) -> Result<bool, GatewayError> {
        let result = self
            .client
            .trigger_constant_contract(
                caller,
                &self.factory,
                self.method.existence_signature(),
                &encode_args(&[Token::Address(*address)]),
                0,
            )
            .await
            .map_err(GatewayError::from_anyhow)?;
        decode_bool(result.first()?)
    }

    /// Creates a sub-contract and confirms it against the prediction.
    ///
    /// # Returns
    ///
    /// * `Ok(Confirmation)` - Event matched the prediction and the factory now reports the address
    /// * `Err(GatewayError)` - Rejected, timed out, mismatched or not persisted; see [`Self::state`]
    pub async fn create(
        &mut self,
        signer: &TransactionSigner,
        request: &CreationRequest,
    ) -> Result<Confirmation, GatewayError> {
        self.state = CorrelationState::Idle;
        let result = self.run(signer, request).await;
        match &result {
            Ok(confirmation) => {
                self.state = CorrelationState::Confirmed;
                info!(
                    "Confirmed {} at {} (tx {})",
                    self.method.event_signature(),
                    confirmation.predicted,
                    confirmation.event.transaction_id
                );
            }
            Err(err) => {
                self.state = CorrelationState::after_error(err);
                warn!("Creation on {} ended in {:?}: {}", self.factory, self.state, err);
            }
        }
        result
    }

    async fn run(
        &mut self,
        signer: &TransactionSigner,
        request: &CreationRequest,
    ) -> Result<Confirmation, GatewayError> {
        let sender = signer.tron_address();
        let predicted = self.predict(&sender, request)?;
        let existed_before = self.exists(&sender, &predicted.core()).await?;
        info!(
            "Predicted address {} for salt {} (registered: {})",
            predicted,
            request.salt.to_hex(),
            existed_before
        );

        let constructor_address = self.constructor_address(&sender, request)?;
        let args = self
            .method
            .create_args(&constructor_address.core(), &request.salt);

        self.state = CorrelationState::Submitted;
        let tx_id = self
            .client
            .send_contract_call(
                signer,
                &self.factory,
                self.method.create_signature(),
                &encode_args(&args),
                0,
            )
            .await
            .map_err(GatewayError::from_anyhow)?;

        self.state = CorrelationState::AwaitingConfirmation;
        let event = self.await_creation_event(&tx_id).await?;
        verify_emitted(&predicted, &event)?;

        if existed_before {
            return Err(GatewayError::DuplicateSalt {
                reason: format!("{} was registered before submission", predicted),
            });
        }
        if !self.exists(&sender, &predicted.core()).await? {
            return Err(GatewayError::NotPersisted {
                address: predicted.to_string(),
            });
        }

        Ok(Confirmation {
            predicted,
            event,
            existed_before,
        })
    }

    /// Polls the event server until the factory's creation event for `tx_id` appears.
    async fn await_creation_event(&self, tx_id: &str) -> Result<CreationEvent, GatewayError> {
        let client = &self.client;
        let name = event_name(self.method);
        poll_until(&self.policy, self.sleeper.as_ref(), name, |_| {
            next_creation_event(client, tx_id, name)
        })
        .await
    }
}

/// One poll attempt: fails early on a reverted transaction, otherwise looks
/// for the creation event among the transaction's events.
async fn next_creation_event(
    client: &TronClient,
    tx_id: &str,
    name: &str,
) -> Result<Option<CreationEvent>, GatewayError> {
    client.included_transaction_info(tx_id).await?;

    let events = client
        .get_events_by_transaction_id(tx_id)
        .await
        .map_err(GatewayError::from_anyhow)?;
    Ok(events
        .iter()
        .find_map(|event| decode_creation_event(event, name)))
}

/// Bare event name as reported by the event server (`Create`, `CreateWallet`).
fn event_name(method: FactoryMethod) -> &'static str {
    let signature = method.event_signature();
    signature.split('(').next().unwrap_or(signature)
}

/// Reads the created address from the first event argument.
pub fn decode_creation_event(event: &TronEvent, event_name: &str) -> Option<CreationEvent> {
    if event.event_name != event_name {
        return None;
    }
    let address = event.address_arg(0)?;
    Some(CreationEvent {
        transaction_id: event.transaction_id.clone(),
        address: address.to_evm_hex(),
        block_number: event.block_number,
    })
}
