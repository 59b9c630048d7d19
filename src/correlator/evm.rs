//! EVM creation correlator
//!
//! Installs a log filter for the factory's creation event, submits the
//! creation call, waits for the receipt and then for the matching log.
//! The filter is uninstalled on every exit path.

use std::sync::Arc;
use tracing::{info, warn};

use super::{
    poll_until, verify_emitted, Confirmation, CorrelationState, CreationEvent, CreationRequest,
    PollPolicy, Sleeper, TokioSleeper,
};
use crate::abi::decode_bool;
use crate::address::EvmAddress;
use crate::chains::evm::{EvmClient, EvmLog};
use crate::config::{EvmChainConfig, ServiceConfig};
use crate::crypto::{event_topic, TransactionSigner};
use crate::error::GatewayError;
use crate::factory::FactoryMethod;
use crate::predictor::{AddressPredictor, PredictedAddress};

/// Drives one factory on one EVM chain.
pub struct EvmCorrelator {
    client: EvmClient,
    factory: EvmAddress,
    method: FactoryMethod,
    event_policy: PollPolicy,
    receipt_policy: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
    state: CorrelationState,
}

impl EvmCorrelator {
    pub fn new(client: EvmClient, factory: EvmAddress, method: FactoryMethod) -> Self {
        Self {
            client,
            factory,
            method,
            event_policy: PollPolicy::default(),
            receipt_policy: PollPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            state: CorrelationState::Idle,
        }
    }

    /// Builds a correlator for a configured chain.
    ///
    /// # Returns
    ///
    /// * `Ok(EvmCorrelator)` - Client created and factory address parsed
    /// * `Err(anyhow::Error)` - No `factory_addr` configured or client creation failed
    pub fn from_config(config: &EvmChainConfig, service: &ServiceConfig) -> anyhow::Result<Self> {
        let factory = config
            .factory_addr
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Chain '{}' has no factory_addr configured", config.name))?
            .parse::<EvmAddress>()?;
        let client = EvmClient::from_config(config)?;
        Ok(Self::new(client, factory, config.factory_method)
            .with_policies(PollPolicy::events(service), PollPolicy::receipts(service)))
    }

    pub fn with_policies(mut self, events: PollPolicy, receipts: PollPolicy) -> Self {
        self.event_policy = events;
        self.receipt_policy = receipts;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn state(&self) -> CorrelationState {
        self.state
    }

    pub fn client(&self) -> &EvmClient {
        &self.client
    }

    pub fn factory(&self) -> &EvmAddress {
        &self.factory
    }

    /// Predicts the sub-contract address `sender` would create.
    ///
    /// `createWallet` passes the sender as constructor owner; `create` passes
    /// the request's recipient.
    pub fn predict(
        &self,
        sender: &EvmAddress,
        request: &CreationRequest,
    ) -> Result<PredictedAddress, GatewayError> {
        let constructor_address = match self.method {
            FactoryMethod::CreateWallet => sender.to_string(),
            FactoryMethod::Create => request.required_recipient()?.to_string(),
        };
        AddressPredictor::Evm.predict_with_address_arg(
            &self.factory.to_string(),
            &constructor_address,
            &request.salt,
            &request.bytecode,
        )
    }

    /// Queries the factory's existence map for `address`.
    pub async fn exists(&self, address: &[u8; 20]) -> Result<bool, GatewayError> {
        let result = self
            .client
            .call(None, &self.factory, &self.method.encode_exists(address))
            .await
            .map_err(GatewayError::from_anyhow)?;
        decode_bool(&result)
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
        let sender = signer.evm_address();
        let predicted = self.predict(&sender, request)?;
        let existed_before = self.exists(&predicted.core()).await?;
        info!(
            "Predicted address {} for salt {} (registered: {})",
            predicted,
            request.salt.to_hex(),
            existed_before
        );

        let topic = event_topic(self.method.event_signature());
        let filter_id = self
            .client
            .new_filter(&self.factory, &[Some(topic.clone())])
            .await
            .map_err(GatewayError::from_anyhow)?;

        let observed = self.submit_and_watch(signer, request, &filter_id, &topic).await;

        if let Err(e) = self.client.uninstall_filter(&filter_id).await {
            warn!("Failed to uninstall log filter {}: {:#}", filter_id, e);
        }

        let event = observed?;
        verify_emitted(&predicted, &event)?;

        if existed_before {
            return Err(GatewayError::DuplicateSalt {
                reason: format!("{} was registered before submission", predicted),
            });
        }
        if !self.exists(&predicted.core()).await? {
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

    async fn submit_and_watch(
        &mut self,
        signer: &TransactionSigner,
        request: &CreationRequest,
        filter_id: &str,
        topic: &str,
    ) -> Result<CreationEvent, GatewayError> {
        let recipient = match self.method {
            FactoryMethod::CreateWallet => *signer.evm_address().as_bytes(),
            FactoryMethod::Create => *request
                .required_recipient()?
                .parse::<EvmAddress>()?
                .as_bytes(),
        };
        let data = self.method.encode_create(&recipient, &request.salt);

        self.state = CorrelationState::Submitted;
        let tx_hash = self
            .client
            .send_transaction(signer, Some(&self.factory), 0, &data)
            .await
            .map_err(GatewayError::from_anyhow)?;

        self.state = CorrelationState::AwaitingConfirmation;
        let receipt = self
            .client
            .wait_for_receipt(&tx_hash, &self.receipt_policy, self.sleeper.as_ref())
            .await?;
        if !receipt.succeeded() {
            return Err(GatewayError::Reverted {
                reason: format!("transaction {} reverted", tx_hash),
            });
        }

        let client = &self.client;
        let factory = &self.factory;
        let tx_hash = tx_hash.as_str();
        poll_until(
            &self.event_policy,
            self.sleeper.as_ref(),
            self.method.event_signature(),
            |_| next_creation_log(client, filter_id, tx_hash, factory, topic),
        )
        .await
    }
}

/// One poll attempt: new filter logs, narrowed to `tx_hash`.
async fn next_creation_log(
    client: &EvmClient,
    filter_id: &str,
    tx_hash: &str,
    factory: &EvmAddress,
    topic: &str,
) -> Result<Option<CreationEvent>, GatewayError> {
    let logs = client
        .get_filter_changes(filter_id)
        .await
        .map_err(GatewayError::from_anyhow)?;
    Ok(logs
        .iter()
        .filter(|log| log.is_from_transaction(tx_hash))
        .find_map(|log| decode_creation_log(log, factory, topic)))
}

/// Decodes a creation log; the new address is the first indexed topic when
/// present, otherwise the first data word.
pub fn decode_creation_log(
    log: &EvmLog,
    factory: &EvmAddress,
    topic: &str,
) -> Option<CreationEvent> {
    let emitter = log.address.parse::<EvmAddress>().ok()?;
    if &emitter != factory || !log.topics.first()?.eq_ignore_ascii_case(topic) {
        return None;
    }

    let address = match log.topics.get(1) {
        Some(indexed) => EvmAddress::from_word_hex(indexed).ok()?,
        None => {
            let data = log.data.strip_prefix("0x").unwrap_or(&log.data);
            EvmAddress::from_word_hex(data.get(..64)?).ok()?
        }
    };

    Some(CreationEvent {
        transaction_id: log.transaction_hash.clone().unwrap_or_default(),
        address: address.to_string(),
        block_number: log.block_number(),
    })
}
