//! Ethereum Sandbox Wallet CLI
//!
//! Command-line interface for balances, transfers and keystore re-encryption.

use alloy::primitives::TxHash;
use clap::{Parser, Subcommand};
use eth_sandbox::config::DEFAULT_NETWORK;
use eth_sandbox::erc20::{TokenClient, DEFAULT_ERC20_ABI};
use eth_sandbox::network::{HttpBalanceTransport, RetryingBalanceLookup};
use eth_sandbox::transaction::parse_address;
use eth_sandbox::units;
use eth_sandbox::wallet::{
    encrypt_credential, load_credential, read_new_password, resolve_password,
    PromptPasswordProvider,
};
use eth_sandbox::{
    Config, Credential, Error, NativeAccount, NetworkClient, NetworkConfig, Result, RpcSettings,
    SigningClient, TokenAccount,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Address checked by `balance` when none is given
const DEFAULT_BALANCE_ADDRESS: &str = "0xb929ac45b74e182b287d9ce1142e5bda76d1a3d0";

/// Symbol read from the balance API when the network does not name one
const DEFAULT_BALANCE_API_SYMBOL: &str = "ETH";

#[derive(Parser)]
#[command(name = "eth-sandbox")]
#[command(about = "Check balances, send ETH and ERC-20 transfers, re-encrypt keystores")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Payment network to use
    #[arg(short, long, global = true, default_value = DEFAULT_NETWORK)]
    network: String,

    /// Override the network's node address
    #[arg(long, global = true)]
    node_address: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the native balance of an address
    Balance {
        /// Address to check
        #[arg(default_value = DEFAULT_BALANCE_ADDRESS)]
        address: String,

        /// Also show the balance of the network's token contract
        #[arg(long)]
        token: bool,
    },

    /// Send native currency
    Transfer {
        #[command(flatten)]
        key: KeyArgs,

        /// Recipient address
        to: String,

        /// Amount in ether (decimal)
        value: String,

        /// Gas price in gwei (defaults to ETH_SANDBOX_GAS_PRICE_GWEI or 50)
        #[arg(long)]
        gas_price_gwei: Option<String>,

        /// Wait for the transaction to be mined
        #[arg(long)]
        wait: bool,
    },

    /// Send ERC-20 tokens through the network's token contract
    TokenTransfer {
        #[command(flatten)]
        key: KeyArgs,

        /// Recipient address
        to: String,

        /// Amount in the token's smallest unit
        amount: String,

        /// Gas price in gwei (defaults to the node's suggestion)
        #[arg(long)]
        gas_price_gwei: Option<String>,

        /// Wait for the transaction to be mined
        #[arg(long)]
        wait: bool,
    },

    /// Estimate the ETH needed to pay for one token transfer
    TransferCost {
        /// Gas price in gwei (defaults to the node's suggestion)
        #[arg(long)]
        gas_price_gwei: Option<String>,
    },

    /// Look up a balance through the network's balance API
    ApiBalance {
        /// Address to check
        address: String,
    },

    /// Re-encrypt a keystore under a new password
    Encrypt {
        #[command(flatten)]
        key: KeyArgs,

        /// Write the new keystore here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List configured networks
    Networks,
}

#[derive(clap::Args)]
struct KeyArgs {
    /// Keystore file
    #[arg(short, long)]
    keyfile: PathBuf,

    /// Keystore password (prompted for when absent)
    #[arg(long)]
    key_password: Option<String>,
}

impl KeyArgs {
    fn unlock(self) -> Result<Credential> {
        let password =
            resolve_password(self.key_password, &PromptPasswordProvider, "key password:")?;
        let credential = load_credential(&self.keyfile, &password)?;
        tracing::info!(address = %credential.address_string(), "Keystore unlocked");
        Ok(credential)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let settings = RpcSettings::from_env();

    match cli.command {
        Commands::Networks => {
            for name in config.network_names() {
                println!("{}", name);
            }
            Ok(())
        }
        Commands::Encrypt { key, output } => {
            let credential = key.unlock()?;
            run_encrypt(&credential, output.as_deref())
        }
        Commands::Balance { address, token } => {
            let network = select_network(&config, &cli.network, cli.node_address)?;
            let client = NetworkClient::connect(&network, settings)?;
            run_balance(&client, &network, &address, token).await
        }
        Commands::Transfer {
            key,
            to,
            value,
            gas_price_gwei,
            wait,
        } => {
            let credential = key.unlock()?;
            let network = select_network(&config, &cli.network, cli.node_address)?;
            let client = NetworkClient::connect(&network, settings)?;
            let tx_hash =
                run_transfer(&client, &network, credential, &to, &value, gas_price_gwei).await?;
            report(&client, tx_hash, wait).await
        }
        Commands::TokenTransfer {
            key,
            to,
            amount,
            gas_price_gwei,
            wait,
        } => {
            let credential = key.unlock()?;
            let network = select_network(&config, &cli.network, cli.node_address)?;
            let client = NetworkClient::connect(&network, settings)?;
            let token = token_client(&client, &network, gas_price_gwei.as_deref())?;
            let amount = units::parse_units(&amount, 0)?;

            let account = TokenAccount::new(credential, token);
            let tx_hash = account.transfer(&to, amount).await?;
            report(&client, tx_hash, wait).await
        }
        Commands::TransferCost { gas_price_gwei } => {
            let network = select_network(&config, &cli.network, cli.node_address)?;
            let client = NetworkClient::connect(&network, settings)?;
            let token = token_client(&client, &network, gas_price_gwei.as_deref())?;
            println!("{} ETH", token.eth_required_for_transfer().await?);
            Ok(())
        }
        Commands::ApiBalance { address } => {
            let network = select_network(&config, &cli.network, cli.node_address)?;
            run_api_balance(&network, &settings, &address).await
        }
    }
}

/// Named network, with `--node-address` replacing its endpoint
///
/// An unknown name is only an error when no endpoint override is given.
fn select_network(
    config: &Config,
    name: &str,
    node_address: Option<String>,
) -> Result<NetworkConfig> {
    match (config.for_network(name), node_address) {
        (Ok(mut network), Some(node_address)) => {
            network.node_address = node_address;
            Ok(network)
        }
        (Ok(network), None) => Ok(network),
        (Err(_), Some(node_address)) => Ok(NetworkConfig::for_endpoint(node_address)),
        (Err(e), None) => Err(e),
    }
}

fn token_client<'a>(
    client: &'a NetworkClient,
    network: &NetworkConfig,
    gas_price_gwei: Option<&str>,
) -> Result<TokenClient<'a>> {
    let contract = network.require_token_contract()?;
    let mut token = TokenClient::load(client, contract, DEFAULT_ERC20_ABI)?;
    if let Some(gwei) = gas_price_gwei {
        token = token.with_gas_price(units::gwei_to_wei(gwei)?);
    }
    if let Some(chain_id) = network.chain_id {
        token = token.with_chain_id(chain_id);
    }
    Ok(token)
}

async fn run_balance(
    client: &NetworkClient,
    network: &NetworkConfig,
    address: &str,
    with_token: bool,
) -> Result<()> {
    let account = parse_address(address)?;
    tracing::info!(
        network = %network.network_name,
        address = %account.to_checksum(None),
        "Checking balance"
    );

    let balance = client.get_balance(account).await?;
    println!("{} ETH", units::wei_to_ether(balance));

    if with_token {
        let token = token_client(client, network, None)?;
        println!("{} (token {})", token.balance_of(account).await?, token.contract());
    }
    Ok(())
}

async fn run_transfer(
    client: &NetworkClient,
    network: &NetworkConfig,
    credential: Credential,
    to: &str,
    value: &str,
    gas_price_gwei: Option<String>,
) -> Result<TxHash> {
    let amount = units::ether_to_wei(value)?;

    let mut account = NativeAccount::new(credential, client, network.chain_id_or_default());
    if let Some(gwei) = gas_price_gwei {
        account = account.with_gas_price(units::gwei_to_wei(&gwei)?);
    }

    tracing::info!(
        from = %account.address().to_checksum(None),
        to = %to,
        value = %value,
        "Sending native transfer"
    );
    account.transfer(to, amount).await
}

/// Print the hash, and the receipt too when `wait` is set
async fn report(client: &NetworkClient, tx_hash: TxHash, wait: bool) -> Result<()> {
    println!("{}", tx_hash);
    if !wait {
        return Ok(());
    }

    let receipt = client
        .wait_for_receipt(tx_hash, client.settings().receipt_timeout)
        .await?;
    println!(
        "block: {}",
        receipt
            .block_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "pending".to_string())
    );
    println!("status: {}", if receipt.status() { "success" } else { "failed" });
    println!("gas used: {}", receipt.gas_used);
    Ok(())
}

async fn run_api_balance(
    network: &NetworkConfig,
    settings: &RpcSettings,
    address: &str,
) -> Result<()> {
    let api_url = network.balance_api_url.as_deref().ok_or_else(|| {
        Error::Config(format!(
            "`balance_api_url` not set for network `{}`",
            network.network_name
        ))
    })?;
    let symbol = network
        .balance_api_symbol
        .as_deref()
        .unwrap_or(DEFAULT_BALANCE_API_SYMBOL);

    let transport = HttpBalanceTransport::new(api_url, settings.request_timeout)?;
    let lookup = RetryingBalanceLookup::new(transport, symbol, settings.balance_retries);

    match lookup.balance_wei(address).await {
        Some(balance) => println!(
            "{} {}",
            units::format_units(balance, units::TOKEN_DECIMALS),
            symbol
        ),
        None => println!("unknown"),
    }
    Ok(())
}

fn run_encrypt(credential: &Credential, output: Option<&Path>) -> Result<()> {
    let password = read_new_password(&PromptPasswordProvider)?;
    let keystore = encrypt_credential(credential, &password)?;
    let json = keystore.to_json_pretty()?;

    match output {
        Some(path) => {
            std::fs::write(path, json).map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!(path = %path.display(), "Keystore written");
        }
        None => println!("{}", json),
    }
    Ok(())
}
