use ethers::types::U256;
use eyre::{eyre, Result};
use tracing::info;

use ibc_loadgen::config::Config;

pub async fn run(
    config: &Config,
    extra_gwei: u64,
    chain_id: &str,
    from_wallet_id: &str,
    amount: &str,
    denom: &str,
) -> Result<()> {
    let amount = U256::from_dec_str(amount).map_err(|_| eyre!("invalid amount {amount}"))?;

    let network = config.build_network(extra_gwei)?;
    let chain = network.get_chain(chain_id)?;
    let funder = chain.get_wallet(from_wallet_id)?;

    let mut funded = 0usize;

    for wallet in chain.wallets() {
        if wallet.id() == from_wallet_id {
            continue;
        }

        let tx_hash = chain
            .send_native(&funder, amount, denom, wallet.address())
            .await?;

        info!(
            chain = %chain_id,
            tx_hash = %tx_hash,
            to = %wallet.address(),
            wallet_id = %wallet.id(),
            amount = %amount,
            denom = %denom,
            "funded wallet"
        );

        funded += 1;
    }

    info!(chain = %chain_id, funded, "distribution complete");

    Ok(())
}
