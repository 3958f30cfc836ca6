use eyre::{eyre, Result};
use tracing::info;

use ibc_loadgen::config::Config;

pub async fn run(
    config: &Config,
    extra_gwei: u64,
    chain_id: &str,
    denom: &str,
    address: Option<&str>,
    wallet_id: Option<&str>,
) -> Result<()> {
    let network = config.build_network(extra_gwei)?;
    let chain = network.get_chain(chain_id)?;

    let address = match (address, wallet_id) {
        (Some(address), _) => address.to_string(),
        (None, Some(wallet_id)) => chain.get_wallet(wallet_id)?.address().to_string(),
        (None, None) => {
            return Err(eyre!(
                "either an address argument or --wallet-id must be provided"
            ))
        }
    };

    let balance = chain.get_balance(&address, denom).await?;

    info!(
        chain = %chain_id,
        address = %address,
        denom = %denom,
        balance = %balance,
        "balance retrieved"
    );

    // plain value on stdout for script consumption
    println!("{balance}");

    Ok(())
}
