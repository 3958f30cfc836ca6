use std::fs;

use ethers::types::U256;
use eyre::{ensure, eyre, Result};
use serde_derive::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ibc_loadgen::config::Config;
use ibc_loadgen::loadscript::{transfer_and_relay, LoadOptions, ProgressUpdate};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoadScriptConfig {
    pub chain_a_id: String,
    pub chain_a_client_id: String,
    pub chain_a_denom: String,
    pub chain_a_transfer_amount: u64,
    pub chain_a_relayer_wallet_id: String,

    pub chain_b_id: String,
    pub chain_b_client_id: String,
    pub chain_b_denom: String,
    pub chain_b_transfer_amount: u64,
    pub chain_b_relayer_wallet_id: String,

    pub num_packets_per_wallet: usize,
    pub max_wallets: usize,
    pub self_relay: bool,
}

pub async fn run(config: &Config, load_config_path: &str, extra_gwei: u64) -> Result<()> {
    let text = fs::read_to_string(load_config_path)?;
    let load: LoadScriptConfig = toml::from_str(&text)?;

    let network = config.build_network(extra_gwei)?;

    let chain_a = network.get_chain(&load.chain_a_id)?;
    let chain_b = network.get_chain(&load.chain_b_id)?;

    let chain_a_relayer = chain_a.get_wallet(&load.chain_a_relayer_wallet_id)?;
    let chain_b_relayer = chain_b.get_wallet(&load.chain_b_relayer_wallet_id)?;

    let mut chain_a_wallets = chain_a.wallets();
    let mut chain_b_wallets = chain_b.wallets();
    chain_a_wallets.truncate(load.max_wallets);
    chain_b_wallets.truncate(load.max_wallets);

    ensure!(
        chain_a_wallets.len() == chain_b_wallets.len(),
        "wallet count mismatch between {} and {}: {} != {}",
        load.chain_a_id,
        load.chain_b_id,
        chain_a_wallets.len(),
        chain_b_wallets.len(),
    );

    info!(
        wallet_count = chain_a_wallets.len(),
        packets_per_wallet = load.num_packets_per_wallet,
        self_relay = load.self_relay,
        "starting load script"
    );

    let cancellation = CancellationToken::new();
    {
        let token = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, aborting load run");
                token.cancel();
            }
        });
    }

    let a_to_b = transfer_and_relay(LoadOptions {
        from_chain: chain_a.clone(),
        from_client_id: load.chain_a_client_id.clone(),
        denom: load.chain_a_denom.clone(),
        from_wallets: chain_a_wallets.clone(),
        to_chain: chain_b.clone(),
        to_wallets: chain_b_wallets.clone(),
        to_relayer_wallet: chain_b_relayer,
        amount: U256::from(load.chain_a_transfer_amount),
        packets_per_wallet: load.num_packets_per_wallet,
        self_relay: load.self_relay,
        relayer_addr: network.relayer_addr().to_string(),
        cancellation: cancellation.clone(),
    })?;

    let b_to_a = transfer_and_relay(LoadOptions {
        from_chain: chain_b,
        from_client_id: load.chain_b_client_id.clone(),
        denom: load.chain_b_denom.clone(),
        from_wallets: chain_b_wallets,
        to_chain: chain_a,
        to_wallets: chain_a_wallets,
        to_relayer_wallet: chain_a_relayer,
        amount: U256::from(load.chain_b_transfer_amount),
        packets_per_wallet: load.num_packets_per_wallet,
        self_relay: load.self_relay,
        relayer_addr: network.relayer_addr().to_string(),
        cancellation,
    })?;

    let (a_ok, b_ok) = tokio::join!(consume(a_to_b), consume(b_to_a));

    if a_ok && b_ok {
        info!("all transfers and relays completed");
        Ok(())
    } else {
        Err(eyre!("at least one direction failed"))
    }
}

/// Render one direction's progress stream as log lines. Returns whether the
/// direction finished without a failure; aborted runs do not count as
/// failures.
async fn consume(mut stream: mpsc::Receiver<ProgressUpdate>) -> bool {
    let mut ok = true;

    while let Some(update) = stream.recv().await {
        match update {
            ProgressUpdate::Transfer(report) => info!(
                from_chain = %report.from_chain,
                to_chain = %report.to_chain,
                "transferring {}/{} (relayed: {}, queued: {})",
                report.current_transfers,
                report.total_transfers,
                report.completed_relaying,
                report.in_queue,
            ),
            ProgressUpdate::Relaying(report) => info!(
                from_chain = %report.from_chain,
                to_chain = %report.to_chain,
                "relaying {}/{} (queued: {})",
                report.completed_relaying,
                report.total_transfers,
                report.in_queue,
            ),
            ProgressUpdate::Done(report) => info!(
                from_chain = %report.from_chain,
                to_chain = %report.to_chain,
                "direction complete: {} transfers relayed",
                report.total_transfers,
            ),
            ProgressUpdate::Error(e) if e.aborted => warn!(
                from_chain = %e.from_chain,
                to_chain = %e.to_chain,
                "direction aborted: {}",
                e.message,
            ),
            ProgressUpdate::Error(e) => {
                error!(
                    from_chain = %e.from_chain,
                    to_chain = %e.to_chain,
                    "direction failed: {}",
                    e.message,
                );
                ok = false;
            }
        }
    }

    ok
}
