//! evm-txkit status probe
//!
//! Loads the configuration, opens the account named by the environment and
//! reports its address, network, balance and current fee suggestions.

use anyhow::{bail, Context, Result};
use std::env;
use tracing::{info, warn};

use evm_txkit::account::Account;
use evm_txkit::config::Settings;
use evm_txkit::logging::init_logging;
use evm_txkit::units::{format_ether, format_gwei};

/// Hex private key of the account to probe
const PRIVATE_KEY_ENV: &str = "EVM_TXKIT_PRIVATE_KEY";
/// Mnemonic of the account to probe, used when no private key is set
const MNEMONIC_ENV: &str = "EVM_TXKIT_MNEMONIC";
/// Derivation index used with the mnemonic
const ACCOUNT_INDEX_ENV: &str = "EVM_TXKIT_ACCOUNT_INDEX";

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting evm-txkit v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;
    info!("Loaded configuration with {} RPC endpoint(s)", settings.rpc.urls.len());

    let account = open_account(&settings).await?;

    if !account.is_connected().await {
        warn!("RPC endpoint is not answering");
    }

    let network = account.network_info().await?;
    let balance = account.eth_balance().await?;
    let gas = account.gas_suggestions().await?;

    println!("address:    {}", account.address_hex());
    println!("network:    {} ({})", network.network_name, network.chain_id);
    println!("block:      {}", account.latest_block_number().await?);
    println!("balance:    {} ETH", format_ether(balance));
    println!("gas price:  {} gwei", format_gwei(gas.gas_price));
    println!("tip cap:    {} gwei", format_gwei(gas.gas_tip_cap));
    println!("fee cap:    {} gwei", format_gwei(gas.gas_fee_cap));

    account.close();
    Ok(())
}

async fn open_account(settings: &Settings) -> Result<Account> {
    if let Ok(key) = env::var(PRIVATE_KEY_ENV) {
        let account = Account::connect_private_key(&key, &settings.rpc)
            .await
            .context("Failed to open account from private key")?;
        return Ok(account.with_settings(settings));
    }

    if let Ok(mnemonic) = env::var(MNEMONIC_ENV) {
        let index = match env::var(ACCOUNT_INDEX_ENV) {
            Ok(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("{} must be a non-negative integer", ACCOUNT_INDEX_ENV))?,
            Err(_) => 0,
        };
        let account = Account::connect_mnemonic(&mnemonic, index, &settings.rpc)
            .await
            .context("Failed to open account from mnemonic")?;
        return Ok(account.with_settings(settings));
    }

    bail!("Set {} or {} to choose an account", PRIVATE_KEY_ENV, MNEMONIC_ENV)
}
