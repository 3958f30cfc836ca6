//! In-memory directory of chains and their client mappings.

use std::collections::BTreeMap;
use std::sync::Arc;

use ethers::types::U256;
use tracing::info;

use crate::chain::{ChainEndpoint, ClientCounterparty};
use crate::error::Error;
use crate::keyring::Wallet;
use crate::packet::Packet;
use crate::relayer::RelayerQueue;

/// All chains a run talks to, keyed by chain identifier, plus the flattened
/// client-counterparty mapping collected from every chain at build time.
pub struct Network {
    chains: BTreeMap<String, Arc<dyn ChainEndpoint>>,
    connections: BTreeMap<String, ClientCounterparty>,
    relayer_addr: String,
}

impl Network {
    pub fn new(
        chains: Vec<Arc<dyn ChainEndpoint>>,
        relayer_addr: impl Into<String>,
    ) -> Result<Self, Error> {
        let mut chain_map: BTreeMap<String, Arc<dyn ChainEndpoint>> = BTreeMap::new();
        let mut connections = BTreeMap::new();

        for chain in chains {
            let chain_id = chain.chain_id().to_string();

            connections.extend(chain.clients());

            if chain_map.insert(chain_id.clone(), chain).is_some() {
                return Err(Error::duplicate_chain(chain_id));
            }
        }

        Ok(Self {
            chains: chain_map,
            connections,
            relayer_addr: relayer_addr.into(),
        })
    }

    pub fn get_chain(&self, chain_id: &str) -> Result<Arc<dyn ChainEndpoint>, Error> {
        self.chains
            .get(chain_id)
            .cloned()
            .ok_or_else(|| Error::chain_not_found(chain_id.to_string()))
    }

    /// Network-wide `client id → counterparty` view, for validation and
    /// observability.
    pub fn connections(&self) -> &BTreeMap<String, ClientCounterparty> {
        &self.connections
    }

    pub fn relayer_addr(&self) -> &str {
        &self.relayer_addr
    }

    /// One transfer followed by an active relay of its packet: the
    /// single-shot counterpart of a full load run.
    #[allow(clippy::too_many_arguments)]
    pub async fn transfer_with_relay(
        &self,
        src_chain: &Arc<dyn ChainEndpoint>,
        dst_chain: &Arc<dyn ChainEndpoint>,
        src_client_id: &str,
        sender: &Wallet,
        dst_relayer_wallet: &Wallet,
        amount: U256,
        denom: &str,
        to: &str,
    ) -> Result<Packet, Error> {
        let packet = src_chain
            .send_transfer(src_client_id, sender, amount, denom, to, "")
            .await?;

        let queue = Arc::new(RelayerQueue::new(
            src_chain.clone(),
            dst_chain.clone(),
            dst_relayer_wallet.clone(),
            1,
            true,
            self.relayer_addr.clone(),
        ));

        queue.add(packet.clone());
        queue.flush().await?;

        info!(
            src_chain = %src_chain.chain_id(),
            dst_chain = %dst_chain.chain_id(),
            tx_hash = %packet.tx_hash,
            "transfer relayed"
        );

        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use crate::chain::mock::MockChain;

    use super::*;

    #[test]
    fn chains_are_indexed_and_clients_flattened() {
        let chain_a = Arc::new(MockChain::new("chain-a"));
        chain_a.add_client(
            "client-0",
            ClientCounterparty {
                chain_id: "chain-b".to_string(),
                client_id: "client-1".to_string(),
            },
        );

        let chain_b = Arc::new(MockChain::new("chain-b"));
        chain_b.add_client(
            "client-1",
            ClientCounterparty {
                chain_id: "chain-a".to_string(),
                client_id: "client-0".to_string(),
            },
        );

        let network = Network::new(
            vec![chain_a as Arc<dyn ChainEndpoint>, chain_b],
            "localhost:3000",
        )
        .unwrap();

        assert_eq!(network.get_chain("chain-a").unwrap().chain_id(), "chain-a");
        assert!(network.get_chain("chain-c").is_err());

        assert_eq!(network.connections().len(), 2);
        assert_eq!(
            network.connections()["client-0"].chain_id,
            "chain-b".to_string()
        );
    }

    #[test]
    fn duplicate_chain_ids_are_rejected() {
        let first = Arc::new(MockChain::new("chain-a"));
        let second = Arc::new(MockChain::new("chain-a"));

        let result = Network::new(
            vec![first as Arc<dyn ChainEndpoint>, second],
            "localhost:3000",
        );

        assert!(result.is_err());
    }
}
