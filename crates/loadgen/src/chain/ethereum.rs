//! Ethereum chain adapter: JSON-RPC transactions against the ICS-26 router
//! and its ICS-20 transfer app.

pub mod contracts;

use core::time::Duration;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use ethers::abi::RawLog;
use ethers::contract::EthLogDecode;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, BlockNumber, TransactionReceipt, TransactionRequest, H256, U256};
use ibc_proto::ibc::core::channel::v2;
use tokio::sync::OnceCell;
use tokio::time::sleep;
use tracing::{debug, info};
use url::Url;

use crate::chain::{
    single_packet, ChainEndpoint, ChainKind, ClientCounterparty, ClientStore, WalletStore,
};
use crate::error::Error;
use crate::keyring::{AddressType, Wallet};
use crate::packet::Packet;

use self::contracts::{Erc20, Ics20Transfer, Ics26Router, RelayerHelper, SendPacketFilter};

const TRANSFER_PORT: &str = "transfer";

const ETH_TRANSFER_GAS: u64 = 21_000;
const ERC20_TRANSFER_GAS: u64 = 100_000;
const RELAY_GAS: u64 = 15_000_000;

const GWEI: u64 = 1_000_000_000;

const QUERY_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const RECEIPT_POLL_ATTEMPTS: u32 = 120;
const APPROVAL_SETTLE_DELAY: Duration = Duration::from_secs(5);

type EthSigner = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct EthereumChain {
    chain_id: String,
    provider: Provider<Http>,
    ics26_address: Address,
    relayer_helper_address: Address,
    extra_gwei: u64,
    numeric_chain_id: OnceCell<u64>,
    ics20_address: OnceCell<Address>,
    wallets: WalletStore,
    clients: ClientStore,
}

impl EthereumChain {
    /// Construction is offline: the numeric chain id and the ICS-20 app
    /// address are fetched lazily on first use and cached.
    pub fn new(
        chain_id: impl Into<String>,
        rpc_addr: &str,
        ics26_address: &str,
        relayer_helper_address: &str,
        extra_gwei: u64,
    ) -> Result<Self, Error> {
        let chain_id = chain_id.into();

        let url = rpc_addr.parse::<Url>().map_err(|e| {
            Error::eth_provider(chain_id.clone(), "parse rpc url".to_string(), e.to_string())
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(QUERY_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::eth_provider(chain_id.clone(), "build http client".to_string(), e.to_string())
            })?;

        let provider = Provider::new(Http::new_with_client(url, http_client));

        Ok(Self {
            provider,
            ics26_address: parse_address(ics26_address)?,
            relayer_helper_address: parse_address(relayer_helper_address)?,
            extra_gwei,
            numeric_chain_id: OnceCell::new(),
            ics20_address: OnceCell::new(),
            wallets: WalletStore::new(chain_id.clone(), AddressType::Ethereum),
            clients: ClientStore::new(chain_id.clone()),
            chain_id,
        })
    }

    async fn numeric_chain_id(&self) -> Result<u64, Error> {
        self.numeric_chain_id
            .get_or_try_init(|| async {
                let id = self.provider.get_chainid().await.map_err(|e| {
                    Error::eth_provider(
                        self.chain_id.clone(),
                        "chain id query".to_string(),
                        e.to_string(),
                    )
                })?;

                Ok(id.as_u64())
            })
            .await
            .copied()
    }

    /// The ICS-20 transfer app, as registered with the router.
    async fn ics20_address(&self) -> Result<Address, Error> {
        self.ics20_address
            .get_or_try_init(|| async {
                let router = Ics26Router::new(self.ics26_address, Arc::new(self.provider.clone()));

                router
                    .get_ibc_app(TRANSFER_PORT.to_string())
                    .call()
                    .await
                    .map_err(|e| {
                        Error::eth_contract(
                            self.chain_id.clone(),
                            "getIBCApp".to_string(),
                            e.to_string(),
                        )
                    })
            })
            .await
            .copied()
    }

    async fn signer(&self, wallet: &Wallet) -> Result<Arc<EthSigner>, Error> {
        let chain_id = self.numeric_chain_id().await?;

        let signer = LocalWallet::from_bytes(&wallet.secret_bytes())
            .map_err(|e| {
                Error::eth_provider(
                    self.chain_id.clone(),
                    "load signing key".to_string(),
                    e.to_string(),
                )
            })?
            .with_chain_id(chain_id);

        Ok(Arc::new(SignerMiddleware::new(
            self.provider.clone(),
            signer,
        )))
    }

    /// Suggested gas price plus the configured bias.
    async fn gas_price(&self) -> Result<U256, Error> {
        let suggested = self.provider.get_gas_price().await.map_err(|e| {
            Error::eth_provider(
                self.chain_id.clone(),
                "gas price query".to_string(),
                e.to_string(),
            )
        })?;

        Ok(suggested + U256::from(self.extra_gwei) * U256::from(GWEI))
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TransactionReceipt, Error> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if receipt.status != Some(1u64.into()) {
                        return Err(Error::receipt_status(
                            self.chain_id.clone(),
                            hash_string(tx_hash),
                        ));
                    }

                    return Ok(receipt);
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(
                        chain = %self.chain_id,
                        tx_hash = %hash_string(tx_hash),
                        error = %e,
                        "receipt not yet available"
                    );
                }
            }

            sleep(RECEIPT_POLL_INTERVAL).await;
        }

        Err(Error::receipt_timeout(
            self.chain_id.clone(),
            hash_string(tx_hash),
        ))
    }
}

fn parse_address(address: &str) -> Result<Address, Error> {
    address
        .parse::<Address>()
        .map_err(|_| Error::invalid_eth_address(address.to_string()))
}

fn parse_hash(tx_hash: &str) -> Result<H256, Error> {
    let bytes = hex::decode(tx_hash.trim_start_matches("0x"))
        .map_err(|e| Error::hex_decode("tx_hash".to_string(), e))?;

    if bytes.len() != 32 {
        return Err(Error::invalid_tx_id(tx_hash.to_string(), bytes.len()));
    }

    Ok(H256::from_slice(&bytes))
}

fn hash_string(tx_hash: H256) -> String {
    format!("0x{}", hex::encode(tx_hash.as_bytes()))
}

fn transfer_timeout_timestamp() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    (now + TRANSFER_TIMEOUT).as_secs()
}

#[async_trait]
impl ChainEndpoint for EthereumChain {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    fn kind(&self) -> ChainKind {
        ChainKind::Ethereum
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

    async fn get_balance(&self, address: &str, denom: &str) -> Result<U256, Error> {
        let account = parse_address(address)?;

        if denom.eq_ignore_ascii_case("eth") {
            return self
                .provider
                .get_balance(account, None)
                .await
                .map_err(|e| {
                    Error::eth_provider(
                        self.chain_id.clone(),
                        "balance query".to_string(),
                        e.to_string(),
                    )
                });
        }

        let erc20 = Erc20::new(parse_address(denom)?, Arc::new(self.provider.clone()));

        erc20.balance_of(account).call().await.map_err(|e| {
            Error::eth_contract(self.chain_id.clone(), "balanceOf".to_string(), e.to_string())
        })
    }

    async fn send_native(
        &self,
        wallet: &Wallet,
        amount: U256,
        denom: &str,
        to: &str,
    ) -> Result<String, Error> {
        let client = self.signer(wallet).await?;
        let gas_price = self.gas_price().await?;
        let to_address = parse_address(to)?;

        let tx_hash = if denom.eq_ignore_ascii_case("eth") {
            let tx = TransactionRequest::new()
                .to(to_address)
                .value(amount)
                .gas(ETH_TRANSFER_GAS)
                .gas_price(gas_price);

            let pending = client.send_transaction(tx, None).await.map_err(|e| {
                Error::eth_provider(
                    self.chain_id.clone(),
                    "send transaction".to_string(),
                    e.to_string(),
                )
            })?;

            *pending
        } else {
            let erc20 = Erc20::new(parse_address(denom)?, client);

            let call = erc20
                .transfer(to_address, amount)
                .legacy()
                .gas(ERC20_TRANSFER_GAS)
                .gas_price(gas_price);

            let pending = call.send().await.map_err(|e| {
                Error::eth_contract(
                    self.chain_id.clone(),
                    "transfer".to_string(),
                    e.to_string(),
                )
            })?;

            *pending
        };

        self.wait_for_receipt(tx_hash).await?;

        info!(
            chain = %self.chain_id,
            tx_hash = %hash_string(tx_hash),
            from = %wallet.address(),
            to = %to,
            amount = %amount,
            denom = %denom,
            "sent native funds"
        );

        Ok(hash_string(tx_hash))
    }

    async fn send_transfer(
        &self,
        client_id: &str,
        wallet: &Wallet,
        amount: U256,
        denom: &str,
        to: &str,
        memo: &str,
    ) -> Result<Packet, Error> {
        let denom_address = parse_address(denom)?;
        let ics20_address = self.ics20_address().await?;
        let client = self.signer(wallet).await?;

        let erc20 = Erc20::new(denom_address, client.clone());

        let allowance = erc20
            .allowance(Address::from(wallet.address_bytes()), ics20_address)
            .call()
            .await
            .map_err(|e| {
                Error::eth_contract(self.chain_id.clone(), "allowance".to_string(), e.to_string())
            })?;

        if allowance < amount {
            let gas_price = self.gas_price().await?;

            let call = erc20
                .approve(ics20_address, amount)
                .legacy()
                .gas_price(gas_price);

            let pending = call.send().await.map_err(|e| {
                Error::eth_contract(
                    self.chain_id.clone(),
                    "approve".to_string(),
                    e.to_string(),
                )
            })?;

            let approve_hash = *pending;
            drop(pending);

            self.wait_for_receipt(approve_hash).await?;

            info!(
                chain = %self.chain_id,
                amount = %amount,
                denom = %denom,
                "approved transfer allowance"
            );

            // give the approval time to settle before spending it
            sleep(APPROVAL_SETTLE_DELAY).await;
        }

        let message = contracts::SendTransferMsg {
            denom: denom_address,
            amount,
            receiver: to.to_string(),
            source_client: client_id.to_string(),
            dest_port: TRANSFER_PORT.to_string(),
            timeout_timestamp: transfer_timeout_timestamp(),
            memo: memo.to_string(),
        };

        let ics20 = Ics20Transfer::new(ics20_address, client);
        let gas_price = self.gas_price().await?;

        let call = ics20
            .send_transfer(message)
            .legacy()
            .gas_price(gas_price);

        let pending = call.send().await.map_err(|e| {
            Error::eth_contract(
                self.chain_id.clone(),
                "sendTransfer".to_string(),
                e.to_string(),
            )
        })?;

        let tx_hash = *pending;
        drop(pending);

        self.wait_for_receipt(tx_hash).await?;

        let tx_hash = hash_string(tx_hash);
        let packets = self.get_packets(&tx_hash).await?;
        let packet = single_packet(&self.chain_id, &tx_hash, packets)?;

        info!(
            chain = %self.chain_id,
            tx_hash = %tx_hash,
            from = %wallet.address(),
            to = %to,
            amount = %amount,
            denom = %denom,
            "sent transfer"
        );

        Ok(packet)
    }

    async fn submit_relay_tx(&self, tx_bytes: &[u8], wallet: &Wallet) -> Result<String, Error> {
        let client = self.signer(wallet).await?;
        let gas_price = self.gas_price().await?;

        let from = Address::from(wallet.address_bytes());

        let nonce = client
            .get_transaction_count(from, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| {
                Error::eth_provider(
                    self.chain_id.clone(),
                    "pending nonce query".to_string(),
                    e.to_string(),
                )
            })?;

        let tx = TransactionRequest::new()
            .to(self.ics26_address)
            .value(0u64)
            .gas(RELAY_GAS)
            .gas_price(gas_price)
            .nonce(nonce)
            .data(tx_bytes.to_vec());

        let pending = client.send_transaction(tx, None).await.map_err(|e| {
            Error::eth_provider(
                self.chain_id.clone(),
                "send relay transaction".to_string(),
                e.to_string(),
            )
        })?;

        let tx_hash = *pending;
        drop(pending);

        self.wait_for_receipt(tx_hash).await?;

        info!(
            chain = %self.chain_id,
            tx_hash = %hash_string(tx_hash),
            "submitted relay transaction"
        );

        Ok(hash_string(tx_hash))
    }

    async fn get_packets(&self, tx_hash: &str) -> Result<Vec<Packet>, Error> {
        let hash = parse_hash(tx_hash)?;

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| {
                Error::eth_provider(
                    self.chain_id.clone(),
                    "receipt query".to_string(),
                    e.to_string(),
                )
            })?
            .ok_or_else(|| {
                Error::eth_provider(
                    self.chain_id.clone(),
                    "receipt query".to_string(),
                    "transaction receipt not found".to_string(),
                )
            })?;

        let mut packets = Vec::new();

        for log in receipt.logs {
            if log.address != self.ics26_address {
                continue;
            }

            let raw_log = RawLog {
                topics: log.topics,
                data: log.data.to_vec(),
            };

            let Ok(event) = SendPacketFilter::decode_log(&raw_log) else {
                continue;
            };

            let raw = v2::Packet {
                sequence: event.packet.sequence,
                source_client: event.packet.source_client.clone(),
                destination_client: event.packet.dest_client.clone(),
                timeout_timestamp: event.packet.timeout_timestamp,
                payloads: event
                    .packet
                    .payloads
                    .into_iter()
                    .map(|payload| v2::Payload {
                        source_port: payload.source_port,
                        destination_port: payload.dest_port,
                        version: payload.version,
                        encoding: payload.encoding,
                        value: payload.value.to_vec(),
                    })
                    .collect(),
            };

            packets.push(Packet::from_v2(tx_hash, raw));
        }

        if packets.is_empty() {
            return Err(Error::no_packets(
                self.chain_id.clone(),
                tx_hash.to_string(),
            ));
        }

        Ok(packets)
    }

    async fn is_packet_received(&self, packet: &Packet) -> Result<bool, Error> {
        let helper = RelayerHelper::new(
            self.relayer_helper_address,
            Arc::new(self.provider.clone()),
        );

        let receipt = helper
            .query_packet_receipt(packet.destination_client.clone(), packet.sequence)
            .call()
            .await
            .map_err(|e| {
                Error::eth_contract(
                    self.chain_id.clone(),
                    "queryPacketReceipt".to_string(),
                    e.to_string(),
                )
            })?;

        debug!(
            chain = %self.chain_id,
            client_id = %packet.destination_client,
            sequence = packet.sequence,
            "queried packet receipt"
        );

        Ok(receipt != [0u8; 32])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_hash_strings_round_trip() {
        let hash = H256::from_slice(&[0xab; 32]);
        let rendered = hash_string(hash);

        assert!(rendered.starts_with("0x"));
        assert_eq!(rendered.len(), 66);
        assert_eq!(parse_hash(&rendered).unwrap(), hash);
    }

    #[test]
    fn short_hashes_are_rejected() {
        assert!(parse_hash("0xabcd").is_err());
        assert!(parse_hash("zz").is_err());
    }

    #[test]
    fn addresses_parse_with_and_without_checksum() {
        assert!(parse_address("0xfFf9976782d46CC05630D1f6eBAb18b2324d6B14").is_ok());
        assert!(parse_address("0xfff9976782d46cc05630d1f6ebab18b2324d6b14").is_ok());
        assert!(parse_address("not-an-address").is_err());
    }
}
