//! In-memory chain double backing the queue and driver tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::types::U256;

use crate::chain::{ChainEndpoint, ChainKind, ClientCounterparty, ClientStore, WalletStore};
use crate::error::Error;
use crate::keyring::{AddressType, Wallet};
use crate::packet::Packet;

pub struct MockChain {
    chain_id: String,
    wallets: WalletStore,
    clients: ClientStore,

    sequence: AtomicU64,
    fail_transfers: AtomicBool,
    receipts_available: AtomicBool,

    /// Number of send_transfer calls, including failed ones.
    pub transfer_attempts: AtomicU64,
    /// Every `(tx_hash, sequence)` the passive backend asked about.
    pub receipt_queries: Mutex<Vec<(String, u64)>>,
    /// Payloads handed to submit_relay_tx.
    pub submitted_relay_txs: Mutex<Vec<Vec<u8>>>,
}

impl MockChain {
    pub fn new(chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            wallets: WalletStore::new(
                chain_id.to_string(),
                AddressType::Cosmos {
                    account_prefix: "mock".to_string(),
                },
            ),
            clients: ClientStore::new(chain_id.to_string()),
            sequence: AtomicU64::new(0),
            fail_transfers: AtomicBool::new(false),
            receipts_available: AtomicBool::new(true),
            transfer_attempts: AtomicU64::new(0),
            receipt_queries: Mutex::new(Vec::new()),
            submitted_relay_txs: Mutex::new(Vec::new()),
        }
    }

    pub fn set_fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    pub fn set_receipts_available(&self, available: bool) {
        self.receipts_available.store(available, Ordering::SeqCst);
    }

    pub fn generate_test_wallet(&self, wallet_id: &str) -> Wallet {
        self.wallets
            .generate(wallet_id)
            .expect("fresh wallet id in test")
    }
}

#[async_trait]
impl ChainEndpoint for MockChain {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    fn kind(&self) -> ChainKind {
        ChainKind::Cosmos
    }

    fn add_wallet(&self, wallet_id: &str, private_key_hex: &str) -> Result<Wallet, Error> {
        self.wallets.add(wallet_id, private_key_hex)
    }

    fn get_wallet(&self, wallet_id: &str) -> Result<Wallet, Error> {
        self.wallets.get(wallet_id)
    }

    fn generate_wallet(&self, wallet_id: &str) -> Result<Wallet, Error> {
        self.wallets.generate(wallet_id)
    }

    fn wallets(&self) -> Vec<Wallet> {
        self.wallets.list()
    }

    fn add_client(&self, client_id: &str, counterparty: ClientCounterparty) {
        self.clients.add(client_id, counterparty);
    }

    fn clients(&self) -> BTreeMap<String, ClientCounterparty> {
        self.clients.map()
    }

    fn counterparty(&self, client_id: &str) -> Result<ClientCounterparty, Error> {
        self.clients.counterparty(client_id)
    }

    async fn get_balance(&self, _address: &str, _denom: &str) -> Result<U256, Error> {
        Ok(U256::zero())
    }

    async fn send_native(
        &self,
        _wallet: &Wallet,
        _amount: U256,
        _denom: &str,
        _to: &str,
    ) -> Result<String, Error> {
        Ok("00".repeat(32))
    }

    async fn send_transfer(
        &self,
        client_id: &str,
        wallet: &Wallet,
        _amount: U256,
        _denom: &str,
        _to: &str,
        _memo: &str,
    ) -> Result<Packet, Error> {
        self.transfer_attempts.fetch_add(1, Ordering::SeqCst);

        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(Error::tx_failed(
                self.chain_id.clone(),
                "ff".repeat(32),
                5,
                format!("insufficient funds for {}", wallet.address()),
            ));
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        Ok(Packet {
            tx_hash: format!("{}{sequence:060x}", &self.chain_id_hex()),
            ibc_version: 2,
            sequence,
            source_client: client_id.to_string(),
            destination_client: format!("{client_id}-counterparty"),
            timeout_timestamp: 1_700_000_000,
            raw: Vec::new(),
        })
    }

    async fn submit_relay_tx(&self, tx_bytes: &[u8], _wallet: &Wallet) -> Result<String, Error> {
        self.submitted_relay_txs
            .lock()
            .expect("poisoned lock")
            .push(tx_bytes.to_vec());

        Ok("aa".repeat(32))
    }

    async fn get_packets(&self, tx_hash: &str) -> Result<Vec<Packet>, Error> {
        Err(Error::no_packets(
            self.chain_id.clone(),
            tx_hash.to_string(),
        ))
    }

    async fn is_packet_received(&self, packet: &Packet) -> Result<bool, Error> {
        self.receipt_queries
            .lock()
            .expect("poisoned lock")
            .push((packet.tx_hash.clone(), packet.sequence));

        Ok(self.receipts_available.load(Ordering::SeqCst))
    }
}

impl MockChain {
    /// A stable 4-hex-char prefix so tx hashes from different mock chains
    /// never collide.
    fn chain_id_hex(&self) -> String {
        let digest: u16 = self
            .chain_id
            .bytes()
            .fold(0u16, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u16));

        format!("{digest:04x}")
    }
}
