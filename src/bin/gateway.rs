//! Gateway Command-Line Tool
//!
//! Predicts CREATE2 addresses offline and drives a deployed Gateway factory
//! on the chains listed in the configuration file.
//!
//! ## Usage
//!
//! ```bash
//! # Offline prediction
//! cargo run --bin gateway -- predict-evm --factory 0x... --owner 0x... --label user1 --bytecode artifacts/Wallet.json
//! cargo run --bin gateway -- predict-tvm --factory T... --recipient T... --label user1 --bytecode artifacts/Account.json
//!
//! # Against a configured chain
//! GATEWAY_CONFIG_PATH=config/gateway.toml cargo run --bin gateway -- create --chain sepolia --label user1 --bytecode artifacts/Wallet.json
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use create2_gateway::{
    abi::{decode_address, encode_args, Token},
    chains::{EvmClient, TronClient},
    config::{read_private_key, ChainConfig, EvmChainConfig, GatewayConfig, TvmChainConfig},
    correlator::{CreationRequest, EvmCorrelator, PollPolicy, TokioSleeper, TvmCorrelator},
    crypto::TransactionSigner,
    factory::{self, OWNER, RENOUNCE_OWNERSHIP, TRANSFER, TRANSFER_OWNERSHIP, WITHDRAW},
    predictor::{evm as evm_predictor, tvm as tvm_predictor, Salt},
    EvmAddress, TronAddress,
};
use serde_json::Value;
use tracing::info;

/// Native currency decimals (ETH 18, TRX 6)
const ETH_DECIMALS: u32 = 18;
const TRX_DECIMALS: u32 = 6;

#[derive(Parser, Debug)]
#[command(name = "gateway")]
#[command(about = "CREATE2 address prediction and Gateway factory operations for EVM and Tron")]
struct Cli {
    /// Path to configuration file (default: config/gateway.toml or GATEWAY_CONFIG_PATH env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct SaltArgs {
    /// 32-byte salt as hex
    #[arg(long, conflicts_with = "label")]
    salt: Option<String>,
    /// Label hashed with SHA-256 into the salt (e.g. "user1")
    #[arg(long)]
    label: Option<String>,
}

impl SaltArgs {
    fn resolve(&self) -> Result<Salt> {
        match (&self.salt, &self.label) {
            (Some(salt), _) => Ok(Salt::from_hex(salt)?),
            (None, Some(label)) => Ok(Salt::from_label(label)),
            (None, None) => anyhow::bail!("Either --salt or --label is required"),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict an EVM CREATE2 address (no network access)
    PredictEvm {
        #[arg(long)]
        factory: String,
        /// Constructor `address` argument (the wallet owner)
        #[arg(long, conflicts_with = "args")]
        owner: Option<String>,
        /// Raw ABI-encoded constructor arguments as hex
        #[arg(long)]
        args: Option<String>,
        #[command(flatten)]
        salt: SaltArgs,
        /// Creation bytecode as hex, a hex file, or a Hardhat artifact JSON
        #[arg(long)]
        bytecode: String,
    },
    /// Predict a Tron CREATE2 address (no network access)
    PredictTvm {
        #[arg(long)]
        factory: String,
        #[arg(long)]
        recipient: String,
        #[command(flatten)]
        salt: SaltArgs,
        #[arg(long)]
        bytecode: String,
    },
    /// Create a sub-contract through the factory and confirm its address
    Create {
        #[arg(long)]
        chain: String,
        /// Recipient for `create(address,bytes32)` factories
        #[arg(long)]
        recipient: Option<String>,
        #[command(flatten)]
        salt: SaltArgs,
        #[arg(long)]
        bytecode: String,
    },
    /// Deploy the factory contract from a Hardhat artifact
    Deploy {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        artifact: String,
    },
    /// Show native and token balances of an address
    Balance {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        address: String,
    },
    /// Show whether an address holds code, its owner, and factory registration
    Inspect {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        address: String,
    },
    /// Transfer factory ownership (owner only)
    TransferOwnership {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        new_owner: String,
    },
    /// Renounce factory ownership (owner only)
    RenounceOwnership {
        #[arg(long)]
        chain: String,
    },
    /// Withdraw tokens held by a sub-contract (sub-contract owner only)
    Withdraw {
        #[arg(long)]
        chain: String,
        /// Sub-contract address
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        to: String,
        /// Decimal amount in token units (e.g. "1.5")
        #[arg(long)]
        amount: String,
        /// Token address (defaults to the chain's configured token)
        #[arg(long)]
        token: Option<String>,
    },
    /// Send ERC20 / TRC20 tokens to an address (e.g. to fund a sub-contract)
    TransferToken {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        to: String,
        /// Decimal amount in token units (e.g. "1.5")
        #[arg(long)]
        amount: String,
        /// Token address (defaults to the chain's configured token)
        #[arg(long)]
        token: Option<String>,
    },
    /// Send native currency (ETH / TRX) to an address
    Send {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        to: String,
        /// Decimal amount (e.g. "0.01")
        #[arg(long)]
        amount: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize structured logging
    tracing_subscriber::fmt::init();

    match cli.command {
        Command::PredictEvm {
            factory,
            owner,
            args,
            salt,
            bytecode,
        } => {
            let salt = salt.resolve()?;
            let bytecode = load_bytecode(&bytecode)?;
            let constructor_args = match (owner, args) {
                (Some(owner), _) => {
                    let owner: EvmAddress = owner.parse()?;
                    encode_args(&[Token::Address(*owner.as_bytes())])
                }
                (None, Some(args)) => create2_gateway::error::decode_hex("constructor args", &args)?,
                (None, None) => Vec::new(),
            };
            let factory: EvmAddress = factory.parse()?;
            let address = evm_predictor::predict(
                factory.as_bytes(),
                &constructor_args,
                &bytecode,
                salt.as_bytes(),
            )?;
            println!("{}", address.to_checksum());
        }
        Command::PredictTvm {
            factory,
            recipient,
            salt,
            bytecode,
        } => {
            let salt = salt.resolve()?;
            let bytecode = load_bytecode(&bytecode)?;
            let address = tvm_predictor::predict(&factory, &recipient, &salt.to_hex(), &bytecode)?;
            let tron: TronAddress = address.parse()?;
            println!("{} ({})", address, tron.to_base58());
        }
        command => {
            let config = GatewayConfig::load_from_path(cli.config.as_deref())?;
            info!("Configuration loaded with {} chain(s)", config.chain.len());
            run_chain_command(&config, command).await?;
        }
    }

    Ok(())
}

async fn run_chain_command(config: &GatewayConfig, command: Command) -> Result<()> {
    let chain_name = match &command {
        Command::Create { chain, .. }
        | Command::Deploy { chain, .. }
        | Command::Balance { chain, .. }
        | Command::Inspect { chain, .. }
        | Command::TransferOwnership { chain, .. }
        | Command::RenounceOwnership { chain }
        | Command::Withdraw { chain, .. }
        | Command::TransferToken { chain, .. }
        | Command::Send { chain, .. } => chain.clone(),
        Command::PredictEvm { .. } | Command::PredictTvm { .. } => {
            anyhow::bail!("Prediction commands do not use a chain")
        }
    };
    let chain = config
        .get_chain(&chain_name)
        .with_context(|| format!("Chain '{}' not found in configuration", chain_name))?;
    info!("Using {} chain '{}'", chain.chain_type(), chain.name());

    match chain {
        ChainConfig::Evm(cfg) => run_evm(config, cfg, command).await,
        ChainConfig::Tvm(cfg) => run_tvm(config, cfg, command).await,
    }
}

// ============================================================================
// EVM COMMANDS
// ============================================================================

fn evm_factory(cfg: &EvmChainConfig) -> Result<EvmAddress> {
    let factory = cfg
        .factory_addr
        .as_deref()
        .with_context(|| format!("Chain '{}' has no factory_addr configured", cfg.name))?;
    Ok(factory.parse()?)
}

/// Sends an owner call and waits for a successful receipt.
async fn evm_write(
    client: &EvmClient,
    signer: &TransactionSigner,
    policy: &PollPolicy,
    to: &EvmAddress,
    data: &[u8],
    value: u128,
) -> Result<String> {
    let tx_hash = client.send_transaction(signer, Some(to), value, data).await?;
    let receipt = client.wait_for_receipt(&tx_hash, policy, &TokioSleeper).await?;
    if !receipt.succeeded() {
        anyhow::bail!("Transaction {} reverted", tx_hash);
    }
    Ok(tx_hash)
}

async fn run_evm(config: &GatewayConfig, cfg: &EvmChainConfig, command: Command) -> Result<()> {
    let client = EvmClient::from_config(cfg)?;
    let receipts = PollPolicy::receipts(&config.service);
    let signer = || -> Result<TransactionSigner> {
        TransactionSigner::from_hex(&read_private_key(&cfg.private_key_env)?)
    };

    match command {
        Command::Create {
            recipient,
            salt,
            bytecode,
            ..
        } => {
            let signer = signer()?;
            let mut request = CreationRequest::new(salt.resolve()?, load_bytecode(&bytecode)?);
            if let Some(recipient) = recipient {
                request = request.with_recipient(&recipient);
            }
            let mut correlator = EvmCorrelator::from_config(cfg, &config.service)?;
            let confirmation = correlator.create(&signer, &request).await?;
            println!("address:     {}", confirmation.predicted);
            println!("transaction: {}", confirmation.event.transaction_id);
            if let Some(block) = confirmation.event.block_number {
                println!("block:       {}", block);
            }
        }
        Command::Deploy { artifact, .. } => {
            let signer = signer()?;
            let (_, bytecode) = load_artifact(&artifact)?;
            let address = client
                .deploy_contract(&signer, &bytecode, &receipts, &TokioSleeper)
                .await?;
            println!("{}", address.to_checksum());
        }
        Command::Balance { address, .. } => {
            let address: EvmAddress = address.parse()?;
            let balance = client.get_balance(&address).await?;
            println!("native: {}", factory::format_units(balance, ETH_DECIMALS));
            if let Some(token) = &cfg.token_addr {
                let token: EvmAddress = token.parse()?;
                let balance = client.erc20_balance_of(&token, &address).await?;
                println!("token:  {}", factory::format_units(balance, cfg.token_decimals));
            }
        }
        Command::Inspect { address, .. } => {
            let address: EvmAddress = address.parse()?;
            let is_contract = client.is_contract(&address).await?;
            println!("contract:   {}", is_contract);
            if is_contract {
                let owner = client
                    .call(None, &address, &factory::encode_owner())
                    .await
                    .ok()
                    .and_then(|result| decode_address(&result).ok());
                if let Some(owner) = owner {
                    println!("owner:      {}", EvmAddress::new(owner).to_checksum());
                }
            }
            if let Ok(factory_addr) = evm_factory(cfg) {
                let data = cfg.factory_method.encode_exists(address.as_bytes());
                let registered = client.call(None, &factory_addr, &data).await?;
                println!(
                    "registered: {}",
                    create2_gateway::abi::decode_bool(&registered)?
                );
            }
        }
        Command::TransferOwnership { new_owner, .. } => {
            let new_owner: EvmAddress = new_owner.parse()?;
            let data = factory::encode_transfer_ownership(new_owner.as_bytes());
            let tx = evm_write(&client, &signer()?, &receipts, &evm_factory(cfg)?, &data, 0).await?;
            info!("{} to {} in {}", TRANSFER_OWNERSHIP, new_owner, tx);
            println!("{}", tx);
        }
        Command::RenounceOwnership { .. } => {
            let data = factory::encode_renounce_ownership();
            let tx = evm_write(&client, &signer()?, &receipts, &evm_factory(cfg)?, &data, 0).await?;
            info!("{} in {}", RENOUNCE_OWNERSHIP, tx);
            println!("{}", tx);
        }
        Command::Withdraw {
            wallet,
            to,
            amount,
            token,
            ..
        } => {
            let wallet: EvmAddress = wallet.parse()?;
            let to: EvmAddress = to.parse()?;
            let token: EvmAddress = token
                .or_else(|| cfg.token_addr.clone())
                .context("No --token given and no token_addr configured")?
                .parse()?;
            let amount = factory::parse_units(&amount, cfg.token_decimals)?;
            let data = factory::encode_withdraw(to.as_bytes(), amount, token.as_bytes());
            let tx = evm_write(&client, &signer()?, &receipts, &wallet, &data, 0).await?;
            info!("{} from {} in {}", WITHDRAW, wallet, tx);
            println!("{}", tx);
        }
        Command::TransferToken {
            to, amount, token, ..
        } => {
            let to: EvmAddress = to.parse()?;
            let token: EvmAddress = token
                .or_else(|| cfg.token_addr.clone())
                .context("No --token given and no token_addr configured")?
                .parse()?;
            let amount = factory::parse_units(&amount, cfg.token_decimals)?;
            let tx = client.erc20_transfer(&signer()?, &token, &to, amount).await?;
            let receipt = client.wait_for_receipt(&tx, &receipts, &TokioSleeper).await?;
            if !receipt.succeeded() {
                anyhow::bail!("Transaction {} reverted", tx);
            }
            info!("{} of {} to {} in {}", TRANSFER, token, to, tx);
            println!("{}", tx);
        }
        Command::Send { to, amount, .. } => {
            let to: EvmAddress = to.parse()?;
            let value = factory::parse_units(&amount, ETH_DECIMALS)?;
            let tx = evm_write(&client, &signer()?, &receipts, &to, &[], value).await?;
            println!("{}", tx);
        }
        Command::PredictEvm { .. } | Command::PredictTvm { .. } => {}
    }
    Ok(())
}

// ============================================================================
// TRON COMMANDS
// ============================================================================

fn tvm_factory(cfg: &TvmChainConfig) -> Result<TronAddress> {
    let factory = cfg
        .factory_addr
        .as_deref()
        .with_context(|| format!("Chain '{}' has no factory_addr configured", cfg.name))?;
    Ok(factory.parse()?)
}

/// Sends an owner call and waits for successful execution.
async fn tvm_write(
    client: &TronClient,
    signer: &TransactionSigner,
    policy: &PollPolicy,
    contract: &TronAddress,
    function_selector: &str,
    parameter: &[u8],
) -> Result<String> {
    let tx_id = client
        .send_contract_call(signer, contract, function_selector, parameter, 0)
        .await?;
    client
        .wait_for_transaction_info(&tx_id, policy, &TokioSleeper)
        .await?;
    Ok(tx_id)
}

async fn run_tvm(config: &GatewayConfig, cfg: &TvmChainConfig, command: Command) -> Result<()> {
    let client = TronClient::from_config(cfg)?;
    let receipts = PollPolicy::receipts(&config.service);
    let signer = || -> Result<TransactionSigner> {
        TransactionSigner::from_hex(&read_private_key(&cfg.private_key_env)?)
    };

    match command {
        Command::Create {
            recipient,
            salt,
            bytecode,
            ..
        } => {
            let signer = signer()?;
            let mut request = CreationRequest::new(salt.resolve()?, load_bytecode(&bytecode)?);
            if let Some(recipient) = recipient {
                request = request.with_recipient(&recipient);
            }
            let mut correlator = TvmCorrelator::from_config(cfg, &config.service)?;
            let confirmation = correlator.create(&signer, &request).await?;
            let tron = TronAddress::from_core(confirmation.predicted.core());
            println!("address:     {} ({})", confirmation.predicted, tron.to_base58());
            println!("transaction: {}", confirmation.event.transaction_id);
        }
        Command::Deploy { artifact, .. } => {
            let signer = signer()?;
            let (abi, bytecode) = load_artifact(&artifact)?;
            let name = std::path::Path::new(&artifact)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Gateway")
                .to_string();
            let address = client
                .deploy(&signer, &name, &abi, &bytecode, &[], &receipts, &TokioSleeper)
                .await?;
            println!("{} ({})", address.to_base58(), address.to_hex());
        }
        Command::Balance { address, .. } => {
            let address: TronAddress = address.parse()?;
            let balance = client.get_account_balance(&address).await?;
            println!("native: {}", factory::format_units(balance as u128, TRX_DECIMALS));
            if let Some(token) = &cfg.token_addr {
                let token: TronAddress = token.parse()?;
                let balance = client.trc20_balance_of(&token, &address).await?;
                println!("token:  {}", factory::format_units(balance, cfg.token_decimals));
            }
        }
        Command::Inspect { address, .. } => {
            let address: TronAddress = address.parse()?;
            let contract = client.get_contract(&address).await?;
            println!("contract:   {}", contract.is_some());
            if contract.is_some() {
                let owner = client
                    .trigger_constant_contract(&address, &address, OWNER, &[], 0)
                    .await
                    .ok()
                    .and_then(|result| result.first().ok().and_then(|r| decode_address(r).ok()));
                if let Some(owner) = owner {
                    println!("owner:      {}", TronAddress::from_core(owner));
                }
            }
            if let Ok(factory_addr) = tvm_factory(cfg) {
                let parameter = encode_args(&[Token::Address(address.core())]);
                let result = client
                    .trigger_constant_contract(
                        &address,
                        &factory_addr,
                        cfg.factory_method.existence_signature(),
                        &parameter,
                        0,
                    )
                    .await?;
                println!(
                    "registered: {}",
                    create2_gateway::abi::decode_bool(result.first()?)?
                );
            }
        }
        Command::TransferOwnership { new_owner, .. } => {
            let new_owner: TronAddress = new_owner.parse()?;
            let parameter = encode_args(&[Token::Address(new_owner.core())]);
            let tx = tvm_write(
                &client,
                &signer()?,
                &receipts,
                &tvm_factory(cfg)?,
                TRANSFER_OWNERSHIP,
                &parameter,
            )
            .await?;
            println!("{}", tx);
        }
        Command::RenounceOwnership { .. } => {
            let tx = tvm_write(
                &client,
                &signer()?,
                &receipts,
                &tvm_factory(cfg)?,
                RENOUNCE_OWNERSHIP,
                &[],
            )
            .await?;
            println!("{}", tx);
        }
        Command::Withdraw {
            wallet,
            to,
            amount,
            token,
            ..
        } => {
            let wallet: TronAddress = wallet.parse()?;
            let to: TronAddress = to.parse()?;
            let token: TronAddress = token
                .or_else(|| cfg.token_addr.clone())
                .context("No --token given and no token_addr configured")?
                .parse()?;
            let amount = factory::parse_units(&amount, cfg.token_decimals)?;
            let parameter = encode_args(&factory::withdraw_args(&to.core(), amount, &token.core()));
            let tx =
                tvm_write(&client, &signer()?, &receipts, &wallet, WITHDRAW, &parameter).await?;
            println!("{}", tx);
        }
        Command::TransferToken {
            to, amount, token, ..
        } => {
            let to: TronAddress = to.parse()?;
            let token: TronAddress = token
                .or_else(|| cfg.token_addr.clone())
                .context("No --token given and no token_addr configured")?
                .parse()?;
            let amount = factory::parse_units(&amount, cfg.token_decimals)?;
            let tx = client.trc20_transfer(&signer()?, &token, &to, amount).await?;
            client
                .wait_for_transaction_info(&tx, &receipts, &TokioSleeper)
                .await?;
            info!("{} of {} to {} in {}", TRANSFER, token, to, tx);
            println!("{}", tx);
        }
        Command::Send { to, amount, .. } => {
            let to: TronAddress = to.parse()?;
            let sun = u64::try_from(factory::parse_units(&amount, TRX_DECIMALS)?)
                .context("Amount does not fit in sun")?;
            let tx = client.transfer_trx(&signer()?, &to, sun).await?;
            client
                .wait_for_transaction_info(&tx, &receipts, &TokioSleeper)
                .await?;
            println!("{}", tx);
        }
        Command::PredictEvm { .. } | Command::PredictTvm { .. } => {}
    }
    Ok(())
}

// ============================================================================
// ARTIFACT LOADING
// ============================================================================

/// Reads bytecode given inline as hex, as a file of hex, or as a Hardhat
/// artifact JSON with a `bytecode` field.
fn load_bytecode(value: &str) -> Result<Vec<u8>> {
    let path = std::path::Path::new(value);
    if !path.exists() {
        return Ok(create2_gateway::error::decode_hex("bytecode", value.trim())?);
    }
    if value.ends_with(".json") {
        return Ok(load_artifact(value)?.1);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bytecode file {}", value))?;
    Ok(create2_gateway::error::decode_hex("bytecode", content.trim())?)
}

/// Reads `(abi, bytecode)` from a Hardhat artifact.
fn load_artifact(path: &str) -> Result<(Value, Vec<u8>)> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read artifact {}", path))?;
    let artifact: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse artifact {}", path))?;
    let bytecode = artifact
        .get("bytecode")
        .and_then(|b| b.as_str())
        .with_context(|| format!("Artifact {} has no bytecode", path))?;
    let abi = artifact.get("abi").cloned().unwrap_or(Value::Array(vec![]));
    Ok((abi, create2_gateway::error::decode_hex("bytecode", bytecode)?))
}
