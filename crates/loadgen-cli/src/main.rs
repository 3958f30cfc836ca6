//! Command-line entry point for the IBC load generator.

mod commands;

use clap::{Parser, Subcommand};
use eyre::Result;
use tracing_subscriber::EnvFilter;

use ibc_loadgen::config::Config;

#[derive(Parser)]
#[command(name = "ibc-loadgen", version)]
#[command(about = "Load generation and packet relaying for IBC deployments")]
struct Cli {
    /// Configuration file path
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Extra gwei added on top of the suggested gas price on Ethereum chains
    #[arg(long, global = true, default_value_t = 5)]
    extra_gwei: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load-testing script in both directions using a load config file
    LoadScript {
        /// Path to the load script TOML file
        load_config: String,
    },

    /// Relay the packet emitted by a single transaction
    Relay {
        src_chain: String,
        dst_chain: String,
        tx_hash: String,
        relayer_wallet_id: String,
    },

    /// Print the packets a transaction emitted
    Trace {
        chain: String,
        tx_hash: String,
    },

    /// Query the balance of an address or a configured wallet
    Balance {
        chain: String,
        denom: String,
        address: Option<String>,

        /// Wallet to query when no address is given
        #[arg(long)]
        wallet_id: Option<String>,
    },

    /// Send one transfer and actively relay its packet
    Transfer {
        src_chain: String,
        dst_chain: String,
        src_client_id: String,
        wallet_id: String,
        amount: String,
        denom: String,
        to: String,
        relayer_wallet_id: String,
    },

    /// Send native funds from one wallet to every other wallet on a chain
    Distribute {
        chain: String,
        from_wallet_id: String,
        amount: String,
        denom: String,
    },

    /// Generate a wallet, persist it to the config, and optionally fund it
    GenerateWallet {
        chain: String,
        wallet_id: String,

        #[arg(long)]
        fund_from_wallet: Option<String>,

        #[arg(long)]
        fund_amount: Option<String>,

        /// Denomination used for funding; defaults per chain kind
        #[arg(long)]
        denom: Option<String>,
    },

    /// Ask the relayer service for a client-creation transaction
    CreateClient {
        src_chain: String,
        dst_chain: String,

        /// key=value parameters forwarded to the relayer service
        #[arg(value_parser = parse_key_val)]
        parameters: Vec<(String, String)>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level)?)
        .init();

    let mut config = Config::load(&cli.config)?;

    match cli.command {
        Commands::LoadScript { load_config } => {
            commands::load_script::run(&config, &load_config, cli.extra_gwei).await
        }
        Commands::Relay {
            src_chain,
            dst_chain,
            tx_hash,
            relayer_wallet_id,
        } => {
            commands::relay::run(
                &config,
                cli.extra_gwei,
                &src_chain,
                &dst_chain,
                &tx_hash,
                &relayer_wallet_id,
            )
            .await
        }
        Commands::Trace { chain, tx_hash } => {
            commands::trace::run(&config, cli.extra_gwei, &chain, &tx_hash).await
        }
        Commands::Balance {
            chain,
            denom,
            address,
            wallet_id,
        } => {
            commands::balance::run(
                &config,
                cli.extra_gwei,
                &chain,
                &denom,
                address.as_deref(),
                wallet_id.as_deref(),
            )
            .await
        }
        Commands::Transfer {
            src_chain,
            dst_chain,
            src_client_id,
            wallet_id,
            amount,
            denom,
            to,
            relayer_wallet_id,
        } => {
            commands::transfer::run(
                &config,
                cli.extra_gwei,
                &src_chain,
                &dst_chain,
                &src_client_id,
                &wallet_id,
                &amount,
                &denom,
                &to,
                &relayer_wallet_id,
            )
            .await
        }
        Commands::Distribute {
            chain,
            from_wallet_id,
            amount,
            denom,
        } => {
            commands::distribute::run(
                &config,
                cli.extra_gwei,
                &chain,
                &from_wallet_id,
                &amount,
                &denom,
            )
            .await
        }
        Commands::GenerateWallet {
            chain,
            wallet_id,
            fund_from_wallet,
            fund_amount,
            denom,
        } => {
            commands::generate_wallet::run(
                &mut config,
                &cli.config,
                cli.extra_gwei,
                &chain,
                &wallet_id,
                fund_from_wallet.as_deref(),
                fund_amount.as_deref(),
                denom.as_deref(),
            )
            .await
        }
        Commands::CreateClient {
            src_chain,
            dst_chain,
            parameters,
        } => commands::create_client::run(&config, &src_chain, &dst_chain, parameters).await,
    }
}
