use eyre::Result;

use ibc_loadgen::config::Config;

pub async fn run(config: &Config, extra_gwei: u64, chain_id: &str, tx_hash: &str) -> Result<()> {
    let network = config.build_network(extra_gwei)?;
    let chain = network.get_chain(chain_id)?;

    let packets = chain.get_packets(tx_hash).await?;

    for packet in packets {
        println!("{packet:#?}");
    }

    Ok(())
}
