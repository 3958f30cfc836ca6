//! The uniform contract over the two heterogeneous ledger kinds.

pub mod cosmos;
pub mod ethereum;

#[cfg(test)]
pub(crate) mod mock;

use core::fmt;
use std::collections::BTreeMap;

use async_trait::async_trait;
use ethers::types::U256;

use crate::error::Error;
use crate::keyring::Wallet;
use crate::packet::Packet;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChainKind {
    Cosmos,
    Ethereum,
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosmos => write!(f, "cosmos"),
            Self::Ethereum => write!(f, "ethereum"),
        }
    }
}

/// The chain and client a local light client points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCounterparty {
    pub chain_id: String,
    pub client_id: String,
}

/// Uniform surface over one ledger, consumed by the load driver and the
/// relay queue so both stay ledger-agnostic.
///
/// Wallet and client maps are written during startup and read-only
/// afterwards; every method is safe to call concurrently and none holds an
/// exclusive lock across a network call.
#[async_trait]
pub trait ChainEndpoint: Send + Sync {
    fn chain_id(&self) -> &str;

    fn kind(&self) -> ChainKind;

    /// Import a wallet from a hex private key.
    fn add_wallet(&self, wallet_id: &str, private_key_hex: &str) -> Result<Wallet, Error>;

    fn get_wallet(&self, wallet_id: &str) -> Result<Wallet, Error>;

    /// Create a wallet with a fresh random key and register it.
    fn generate_wallet(&self, wallet_id: &str) -> Result<Wallet, Error>;

    /// All registered wallets, in an order that is stable within a run.
    fn wallets(&self) -> Vec<Wallet>;

    fn add_client(&self, client_id: &str, counterparty: ClientCounterparty);

    fn clients(&self) -> BTreeMap<String, ClientCounterparty>;

    fn counterparty(&self, client_id: &str) -> Result<ClientCounterparty, Error>;

    async fn get_balance(&self, address: &str, denom: &str) -> Result<U256, Error>;

    /// Move native (non-IBC) funds between two accounts on this chain.
    async fn send_native(
        &self,
        wallet: &Wallet,
        amount: U256,
        denom: &str,
        to: &str,
    ) -> Result<String, Error>;

    /// Broadcast an IBC transfer, wait for inclusion, and return the single
    /// packet the transaction emitted. Zero or multiple observed packets is
    /// an error.
    async fn send_transfer(
        &self,
        client_id: &str,
        wallet: &Wallet,
        amount: U256,
        denom: &str,
        to: &str,
        memo: &str,
    ) -> Result<Packet, Error>;

    /// Inject an externally-constructed relay payload, signed by `wallet`.
    async fn submit_relay_tx(&self, tx_bytes: &[u8], wallet: &Wallet) -> Result<String, Error>;

    /// Extract every packet the given transaction emitted.
    async fn get_packets(&self, tx_hash: &str) -> Result<Vec<Packet>, Error>;

    /// Whether the destination side has written a receipt for the packet.
    async fn is_packet_received(&self, packet: &Packet) -> Result<bool, Error>;
}

/// Wallet map shared by the two adapters: written during startup, read-only
/// and lock-cheap afterwards.
pub(crate) struct WalletStore {
    chain_id: String,
    address_type: crate::keyring::AddressType,
    wallets: std::sync::RwLock<BTreeMap<String, Wallet>>,
}

impl WalletStore {
    pub fn new(chain_id: String, address_type: crate::keyring::AddressType) -> Self {
        Self {
            chain_id,
            address_type,
            wallets: std::sync::RwLock::new(BTreeMap::new()),
        }
    }

    pub fn add(&self, wallet_id: &str, private_key_hex: &str) -> Result<Wallet, Error> {
        let wallet = Wallet::from_private_key_hex(wallet_id, private_key_hex, &self.address_type)
            .map_err(Error::keyring)?;

        self.wallets
            .write()
            .expect("poisoned lock")
            .insert(wallet_id.to_string(), wallet.clone());

        Ok(wallet)
    }

    pub fn get(&self, wallet_id: &str) -> Result<Wallet, Error> {
        self.wallets
            .read()
            .expect("poisoned lock")
            .get(wallet_id)
            .cloned()
            .ok_or_else(|| {
                Error::wallet_not_found(self.chain_id.clone(), wallet_id.to_string())
            })
    }

    pub fn generate(&self, wallet_id: &str) -> Result<Wallet, Error> {
        let mut wallets = self.wallets.write().expect("poisoned lock");

        if wallets.contains_key(wallet_id) {
            return Err(Error::wallet_exists(
                self.chain_id.clone(),
                wallet_id.to_string(),
            ));
        }

        let wallet = Wallet::generate(wallet_id, &self.address_type).map_err(Error::keyring)?;
        wallets.insert(wallet_id.to_string(), wallet.clone());

        Ok(wallet)
    }

    pub fn list(&self) -> Vec<Wallet> {
        self.wallets
            .read()
            .expect("poisoned lock")
            .values()
            .cloned()
            .collect()
    }
}

/// Client-counterparty map shared by the two adapters.
pub(crate) struct ClientStore {
    chain_id: String,
    clients: std::sync::RwLock<BTreeMap<String, ClientCounterparty>>,
}

impl ClientStore {
    pub fn new(chain_id: String) -> Self {
        Self {
            chain_id,
            clients: std::sync::RwLock::new(BTreeMap::new()),
        }
    }

    pub fn add(&self, client_id: &str, counterparty: ClientCounterparty) {
        self.clients
            .write()
            .expect("poisoned lock")
            .insert(client_id.to_string(), counterparty);
    }

    pub fn map(&self) -> BTreeMap<String, ClientCounterparty> {
        self.clients.read().expect("poisoned lock").clone()
    }

    pub fn counterparty(&self, client_id: &str) -> Result<ClientCounterparty, Error> {
        self.clients
            .read()
            .expect("poisoned lock")
            .get(client_id)
            .cloned()
            .ok_or_else(|| {
                Error::client_not_found(self.chain_id.clone(), client_id.to_string())
            })
    }
}

/// Reduce a parsed packet list to the single packet a transfer must emit.
pub(crate) fn single_packet(
    chain_id: &str,
    tx_hash: &str,
    mut packets: Vec<Packet>,
) -> Result<Packet, Error> {
    match packets.len() {
        1 => Ok(packets.remove(0)),
        0 => Err(Error::no_packets(chain_id.to_string(), tx_hash.to_string())),
        n => Err(Error::unexpected_packet_count(
            chain_id.to_string(),
            tx_hash.to_string(),
            n,
        )),
    }
}
