//! Cosmos chain adapter: gRPC queries, protobuf transactions, and
//! channel-v2 transfers.

pub mod events;
mod tx;

use core::time::Duration;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::U256;
use ibc_proto::cosmos::auth::v1beta1::{
    query_client::QueryClient as AuthQueryClient, BaseAccount, QueryAccountRequest,
};
use ibc_proto::cosmos::bank::v1beta1::{
    query_client::QueryClient as BankQueryClient, MsgSend, QueryBalanceRequest,
};
use ibc_proto::cosmos::base::v1beta1::Coin;
use ibc_proto::cosmos::tx::v1beta1::{
    service_client::ServiceClient, BroadcastMode, BroadcastTxRequest, GetTxRequest, TxBody,
};
use ibc_proto::google::protobuf::Any;
use ibc_proto::ibc::core::channel::v2::{
    query_client::QueryClient as ChannelQueryClient, MsgSendPacket, Payload,
    QueryPacketReceiptRequest,
};
use prost::Message;
use tokio::time::{sleep, Instant};
use tonic::transport::Channel;
use tracing::{debug, info};

use crate::chain::{
    single_packet, ChainEndpoint, ChainKind, ClientCounterparty, ClientStore, WalletStore,
};
use crate::error::Error;
use crate::keyring::{AddressType, Wallet};
use crate::packet::Packet;
use crate::util::grpc;

use self::events::TxEvent;
use self::tx::AccountInfo;

const MSG_SEND_PACKET_TYPE_URL: &str = "/ibc.core.channel.v2.MsgSendPacket";
const MSG_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";

const TRANSFER_PORT: &str = "transfer";
const ICS20_VERSION: &str = "ics20-1";
const ABI_ENCODING: &str = "application/x-solidity-abi";

// Gas allowances matching what the flows need in practice.
const TRANSFER_GAS: u64 = 500_000;
const SEND_GAS: u64 = 200_000;
const RELAY_GAS: u64 = 10_000_000;

const TRANSFER_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);
const INCLUSION_TIMEOUT: Duration = Duration::from_secs(120);
const INCLUSION_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct CosmosChain {
    chain_id: String,
    grpc_addr: String,
    gas_denom: String,
    wallets: WalletStore,
    clients: ClientStore,
}

impl CosmosChain {
    pub fn new(
        chain_id: impl Into<String>,
        grpc_addr: impl Into<String>,
        account_prefix: impl Into<String>,
        gas_denom: impl Into<String>,
    ) -> Self {
        let chain_id = chain_id.into();

        Self {
            grpc_addr: grpc_addr.into(),
            gas_denom: gas_denom.into(),
            wallets: WalletStore::new(
                chain_id.clone(),
                AddressType::Cosmos {
                    account_prefix: account_prefix.into(),
                },
            ),
            clients: ClientStore::new(chain_id.clone()),
            chain_id,
        }
    }

    async fn tx_service(&self) -> Result<ServiceClient<Channel>, Error> {
        Ok(ServiceClient::new(grpc::connect(&self.grpc_addr).await?))
    }

    async fn account_info(&self, address: &str) -> Result<AccountInfo, Error> {
        let mut client = AuthQueryClient::new(grpc::connect(&self.grpc_addr).await?);

        let response = client
            .account(QueryAccountRequest {
                address: address.to_string(),
            })
            .await
            .map_err(|e| Error::grpc_status(self.grpc_addr.clone(), e))?
            .into_inner();

        let any = response
            .account
            .ok_or_else(|| Error::account_not_found(address.to_string()))?;

        let account = BaseAccount::decode(any.value.as_slice())
            .map_err(|e| Error::protobuf_decode("BaseAccount".to_string(), e))?;

        Ok(AccountInfo {
            number: account.account_number,
            sequence: account.sequence,
        })
    }

    /// Sign and broadcast `messages`, then wait until the transaction is
    /// included with code 0. Returns the tx hash and the inclusion events.
    async fn submit_msgs(
        &self,
        wallet: &Wallet,
        gas: u64,
        messages: Vec<Any>,
    ) -> Result<(String, Vec<TxEvent>), Error> {
        let account = self.account_info(wallet.address()).await?;

        let tx_bytes = tx::sign_and_encode_tx(
            &self.chain_id,
            &self.gas_denom,
            wallet,
            account,
            gas,
            messages,
            "",
        );

        let mut client = self.tx_service().await?;

        let response = client
            .broadcast_tx(BroadcastTxRequest {
                tx_bytes,
                mode: BroadcastMode::Sync as i32,
            })
            .await
            .map_err(|e| Error::grpc_status(self.grpc_addr.clone(), e))?
            .into_inner();

        let tx_response = response
            .tx_response
            .ok_or_else(|| Error::empty_response("BroadcastTx".to_string()))?;

        if tx_response.code != 0 {
            return Err(Error::tx_failed(
                self.chain_id.clone(),
                tx_response.txhash,
                tx_response.code,
                tx_response.raw_log,
            ));
        }

        let tx_hash = tx_response.txhash;
        debug!(chain = %self.chain_id, tx_hash = %tx_hash, "broadcast transaction");

        let events = self.wait_for_inclusion(&mut client, &tx_hash).await?;
        info!(chain = %self.chain_id, tx_hash = %tx_hash, "transaction included");

        Ok((tx_hash, events))
    }

    async fn wait_for_inclusion(
        &self,
        client: &mut ServiceClient<Channel>,
        tx_hash: &str,
    ) -> Result<Vec<TxEvent>, Error> {
        let deadline = Instant::now() + INCLUSION_TIMEOUT;

        loop {
            match client
                .get_tx(GetTxRequest {
                    hash: tx_hash.to_string(),
                })
                .await
            {
                Ok(response) => {
                    if let Some(tx_response) = response.into_inner().tx_response {
                        if tx_response.code != 0 {
                            return Err(Error::tx_failed(
                                self.chain_id.clone(),
                                tx_response.txhash,
                                tx_response.code,
                                tx_response.raw_log,
                            ));
                        }

                        return Ok(events::from_abci_events(&tx_response.events));
                    }
                }
                Err(status) => {
                    debug!(
                        chain = %self.chain_id,
                        tx_hash = %tx_hash,
                        %status,
                        "transaction not yet indexed"
                    );
                }
            }

            if Instant::now() >= deadline {
                return Err(Error::tx_inclusion_timeout(
                    self.chain_id.clone(),
                    tx_hash.to_string(),
                ));
            }

            sleep(INCLUSION_POLL_INTERVAL).await;
        }
    }
}

fn transfer_timeout_timestamp() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    (now + TRANSFER_TIMEOUT).as_secs()
}

#[async_trait]
impl ChainEndpoint for CosmosChain {
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

    async fn get_balance(&self, address: &str, denom: &str) -> Result<U256, Error> {
        let mut client = BankQueryClient::new(grpc::connect(&self.grpc_addr).await?);

        let response = client
            .balance(QueryBalanceRequest {
                address: address.to_string(),
                denom: denom.to_string(),
            })
            .await
            .map_err(|e| Error::grpc_status(self.grpc_addr.clone(), e))?
            .into_inner();

        let coin = response
            .balance
            .ok_or_else(|| Error::empty_response("Balance".to_string()))?;

        U256::from_dec_str(&coin.amount).map_err(|_| Error::invalid_amount(coin.amount))
    }

    async fn send_native(
        &self,
        wallet: &Wallet,
        amount: U256,
        denom: &str,
        to: &str,
    ) -> Result<String, Error> {
        let msg = MsgSend {
            from_address: wallet.address().to_string(),
            to_address: to.to_string(),
            amount: vec![Coin {
                denom: denom.to_string(),
                amount: amount.to_string(),
            }],
        };

        let any = Any {
            type_url: MSG_SEND_TYPE_URL.to_string(),
            value: msg.encode_to_vec(),
        };

        let (tx_hash, _) = self.submit_msgs(wallet, SEND_GAS, vec![any]).await?;

        info!(
            chain = %self.chain_id,
            tx_hash = %tx_hash,
            from = %wallet.address(),
            to = %to,
            amount = %amount,
            denom = %denom,
            "sent native funds"
        );

        Ok(tx_hash)
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
        let value = ethers::abi::encode(&[
            Token::String(denom.to_string()),
            Token::Uint(amount),
            Token::String(wallet.address().to_string()),
            Token::String(to.to_string()),
            Token::String(memo.to_string()),
        ]);

        let msg = MsgSendPacket {
            source_client: client_id.to_string(),
            timeout_timestamp: transfer_timeout_timestamp(),
            payloads: vec![Payload {
                source_port: TRANSFER_PORT.to_string(),
                destination_port: TRANSFER_PORT.to_string(),
                version: ICS20_VERSION.to_string(),
                encoding: ABI_ENCODING.to_string(),
                value,
            }],
            signer: wallet.address().to_string(),
        };

        let any = Any {
            type_url: MSG_SEND_PACKET_TYPE_URL.to_string(),
            value: msg.encode_to_vec(),
        };

        let (tx_hash, events) = self.submit_msgs(wallet, TRANSFER_GAS, vec![any]).await?;

        let packets = events::parse_packets(&self.chain_id, &tx_hash, &events)?;
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
        let body = TxBody::decode(tx_bytes)
            .map_err(|e| Error::protobuf_decode("TxBody".to_string(), e))?;

        if body.messages.is_empty() {
            return Err(Error::empty_tx_messages(self.chain_id.clone()));
        }

        let (tx_hash, _) = self.submit_msgs(wallet, RELAY_GAS, body.messages).await?;

        info!(chain = %self.chain_id, tx_hash = %tx_hash, "submitted relay transaction");

        Ok(tx_hash)
    }

    async fn get_packets(&self, tx_hash: &str) -> Result<Vec<Packet>, Error> {
        let mut client = self.tx_service().await?;

        let response = client
            .get_tx(GetTxRequest {
                hash: tx_hash.to_string(),
            })
            .await
            .map_err(|e| Error::grpc_status(self.grpc_addr.clone(), e))?
            .into_inner();

        let tx_response = response
            .tx_response
            .ok_or_else(|| Error::empty_response("GetTx".to_string()))?;

        let events = events::from_abci_events(&tx_response.events);

        events::parse_packets(&self.chain_id, tx_hash, &events)
    }

    async fn is_packet_received(&self, packet: &Packet) -> Result<bool, Error> {
        let mut client = ChannelQueryClient::new(grpc::connect(&self.grpc_addr).await?);

        let response = client
            .packet_receipt(QueryPacketReceiptRequest {
                client_id: packet.destination_client.clone(),
                sequence: packet.sequence,
            })
            .await
            .map_err(|e| Error::grpc_status(self.grpc_addr.clone(), e))?
            .into_inner();

        debug!(
            chain = %self.chain_id,
            client_id = %packet.destination_client,
            sequence = packet.sequence,
            received = response.received,
            "queried packet receipt"
        );

        Ok(response.received)
    }
}
