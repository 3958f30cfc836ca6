use eyre::Result;
use tracing::info;

use ibc_loadgen::config::Config;
use ibc_loadgen::relayer::client::RelayerClient;

pub async fn run(
    config: &Config,
    src_chain_id: &str,
    dst_chain_id: &str,
    parameters: Vec<(String, String)>,
) -> Result<()> {
    let client = RelayerClient::new(config.relayer_grpc_addr.clone());

    let tx = client
        .create_client(src_chain_id, dst_chain_id, parameters.into_iter().collect())
        .await?;

    info!(
        src_chain = %src_chain_id,
        dst_chain = %dst_chain_id,
        tx_bytes = tx.len(),
        "received client creation transaction"
    );

    println!("{}", hex::encode(tx));

    Ok(())
}
