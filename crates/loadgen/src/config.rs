//! TOML configuration and network construction.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_derive::{Deserialize, Serialize};

use crate::chain::cosmos::CosmosChain;
use crate::chain::ethereum::EthereumChain;
use crate::chain::{ChainEndpoint, ClientCounterparty};
use crate::error::Error;
use crate::network::Network;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub wallets: Vec<WalletConfig>,
    #[serde(default)]
    pub relayer_grpc_addr: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    Cosmos,
    Ethereum,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainConfig {
    pub chain_type: ChainType,
    pub chain_id: String,

    #[serde(default)]
    pub rpc_addr: String,
    #[serde(default)]
    pub grpc_addr: String,

    #[serde(default)]
    pub clients: Vec<ClientConfig>,
    #[serde(default)]
    pub wallet_ids: Vec<String>,

    // Cosmos specific fields
    #[serde(default)]
    pub bech32_prefix: String,
    #[serde(default)]
    pub gas_denom: String,

    // Ethereum specific fields
    #[serde(default)]
    pub ics26_address: String,
    #[serde(default)]
    pub relayer_helper_address: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientConfig {
    pub client_id: String,
    pub counterparty_chain_id: String,
    pub counterparty_client_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct WalletConfig {
    pub wallet_id: String,
    pub private_key: String,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();

        let text = fs::read_to_string(path)
            .map_err(|e| Error::config_io(path.display().to_string(), e))?;

        toml::from_str(&text).map_err(Error::config_decode)
    }

    /// Write the configuration back out, e.g. after `generate-wallet`
    /// registered a new key.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();

        let text = toml::to_string_pretty(self).map_err(Error::config_encode)?;

        fs::write(path, text).map_err(|e| Error::config_io(path.display().to_string(), e))
    }

    /// Instantiate every configured chain, wire up clients and wallets, and
    /// index the result. Construction is offline; unknown wallet ids are
    /// fatal here, at startup.
    pub fn build_network(&self, extra_gwei: u64) -> Result<Network, Error> {
        let wallet_configs: BTreeMap<&str, &WalletConfig> = self
            .wallets
            .iter()
            .map(|wallet| (wallet.wallet_id.as_str(), wallet))
            .collect();

        let mut chains: Vec<Arc<dyn ChainEndpoint>> = Vec::new();

        for chain_config in &self.chains {
            let chain: Arc<dyn ChainEndpoint> = match chain_config.chain_type {
                ChainType::Cosmos => Arc::new(CosmosChain::new(
                    chain_config.chain_id.clone(),
                    chain_config.grpc_addr.clone(),
                    chain_config.bech32_prefix.clone(),
                    chain_config.gas_denom.clone(),
                )),
                ChainType::Ethereum => Arc::new(EthereumChain::new(
                    chain_config.chain_id.clone(),
                    &chain_config.rpc_addr,
                    &chain_config.ics26_address,
                    &chain_config.relayer_helper_address,
                    extra_gwei,
                )?),
            };

            for client in &chain_config.clients {
                chain.add_client(
                    &client.client_id,
                    ClientCounterparty {
                        chain_id: client.counterparty_chain_id.clone(),
                        client_id: client.counterparty_client_id.clone(),
                    },
                );
            }

            for wallet_id in &chain_config.wallet_ids {
                let wallet_config = wallet_configs.get(wallet_id.as_str()).ok_or_else(|| {
                    Error::wallet_not_found(chain_config.chain_id.clone(), wallet_id.clone())
                })?;

                chain.add_wallet(wallet_id, &wallet_config.private_key)?;
            }

            chains.push(chain);
        }

        Network::new(chains, self.relayer_grpc_addr.clone())
    }
}
