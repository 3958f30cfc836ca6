use ethers::types::U256;
use eyre::{eyre, Result};
use tracing::info;

use ibc_loadgen::config::Config;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &Config,
    extra_gwei: u64,
    src_chain_id: &str,
    dst_chain_id: &str,
    src_client_id: &str,
    wallet_id: &str,
    amount: &str,
    denom: &str,
    to: &str,
    relayer_wallet_id: &str,
) -> Result<()> {
    let amount = U256::from_dec_str(amount).map_err(|_| eyre!("invalid amount {amount}"))?;

    let network = config.build_network(extra_gwei)?;

    let src_chain = network.get_chain(src_chain_id)?;
    let dst_chain = network.get_chain(dst_chain_id)?;

    let sender = src_chain.get_wallet(wallet_id)?;
    let relayer_wallet = dst_chain.get_wallet(relayer_wallet_id)?;

    let packet = network
        .transfer_with_relay(
            &src_chain,
            &dst_chain,
            src_client_id,
            &sender,
            &relayer_wallet,
            amount,
            denom,
            to,
        )
        .await?;

    info!(
        src_chain = %src_chain_id,
        dst_chain = %dst_chain_id,
        tx_hash = %packet.tx_hash,
        sequence = packet.sequence,
        "transfer relayed"
    );

    Ok(())
}
