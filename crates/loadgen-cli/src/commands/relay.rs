use std::sync::Arc;

use eyre::{ensure, Result};
use tracing::info;

use ibc_loadgen::config::Config;
use ibc_loadgen::relayer::RelayerQueue;

pub async fn run(
    config: &Config,
    extra_gwei: u64,
    src_chain_id: &str,
    dst_chain_id: &str,
    tx_hash: &str,
    relayer_wallet_id: &str,
) -> Result<()> {
    let network = config.build_network(extra_gwei)?;

    let src_chain = network.get_chain(src_chain_id)?;
    let dst_chain = network.get_chain(dst_chain_id)?;
    let relayer_wallet = dst_chain.get_wallet(relayer_wallet_id)?;

    let mut packets = src_chain.get_packets(tx_hash).await?;
    ensure!(
        packets.len() == 1,
        "expected 1 packet in {tx_hash}, got {}",
        packets.len(),
    );
    let packet = packets.remove(0);

    let queue = Arc::new(RelayerQueue::new(
        src_chain,
        dst_chain,
        relayer_wallet,
        1,
        true,
        network.relayer_addr(),
    ));

    queue.add(packet);
    queue.flush().await?;

    info!(
        src_chain = %src_chain_id,
        dst_chain = %dst_chain_id,
        tx_hash = %tx_hash,
        "relay successful"
    );

    Ok(())
}
