use ethers::types::U256;
use eyre::{ensure, eyre, Result};
use tracing::info;

use ibc_loadgen::chain::ChainKind;
use ibc_loadgen::config::{Config, WalletConfig};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &mut Config,
    config_path: &str,
    extra_gwei: u64,
    chain_id: &str,
    wallet_id: &str,
    fund_from_wallet: Option<&str>,
    fund_amount: Option<&str>,
    denom: Option<&str>,
) -> Result<()> {
    ensure!(
        fund_from_wallet.is_some() == fund_amount.is_some(),
        "either both --fund-from-wallet and --fund-amount must be set or neither",
    );

    let network = config.build_network(extra_gwei)?;
    let chain = network.get_chain(chain_id)?;

    ensure!(
        chain.get_wallet(wallet_id).is_err(),
        "wallet already exists: {wallet_id}",
    );

    let wallet = chain.generate_wallet(wallet_id)?;

    info!(
        chain = %chain_id,
        wallet_id = %wallet_id,
        address = %wallet.address(),
        "generated new wallet"
    );
    println!("{}", wallet.address());

    config.wallets.push(WalletConfig {
        wallet_id: wallet_id.to_string(),
        private_key: wallet.private_key_hex(),
    });

    for chain_config in config.chains.iter_mut() {
        if chain_config.chain_id == chain_id {
            chain_config.wallet_ids.push(wallet_id.to_string());
        }
    }

    config.save(config_path)?;

    if let (Some(from), Some(amount)) = (fund_from_wallet, fund_amount) {
        let amount = U256::from_dec_str(amount).map_err(|_| eyre!("invalid amount {amount}"))?;

        let denom = match denom {
            Some(denom) => denom.to_string(),
            None => match chain.kind() {
                ChainKind::Ethereum => "eth".to_string(),
                ChainKind::Cosmos => "uatom".to_string(),
            },
        };

        let funder = chain.get_wallet(from)?;

        let tx_hash = chain
            .send_native(&funder, amount, &denom, wallet.address())
            .await?;

        info!(
            chain = %chain_id,
            tx_hash = %tx_hash,
            wallet_id = %wallet_id,
            amount = %amount,
            denom = %denom,
            "funded new wallet"
        );
    }

    Ok(())
}
