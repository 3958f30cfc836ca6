//! This module defines the various errors raised by the load generator.

use flex_error::{define_error, DisplayOnly};
use prost::DecodeError;
use tonic::{transport::Error as TransportError, Status as GrpcStatus};

use crate::keyring;

define_error! {
    Error {
        ConfigIo
            { path: String }
            [ DisplayOnly<std::io::Error> ]
            |e| { format!("config I/O error for {}", e.path) },

        ConfigDecode
            [ DisplayOnly<toml::de::Error> ]
            |_| { "invalid configuration" },

        ConfigEncode
            [ DisplayOnly<toml::ser::Error> ]
            |_| { "failed to serialize configuration" },

        UnsupportedChainType
            { chain_type: String }
            |e| { format!("unsupported chain type {}", e.chain_type) },

        ChainNotFound
            { chain_id: String }
            |e| { format!("chain {} not found", e.chain_id) },

        DuplicateChain
            { chain_id: String }
            |e| { format!("duplicate chain identifier {}", e.chain_id) },

        ClientNotFound
            { chain_id: String, client_id: String }
            |e| { format!("client {} not found on chain {}", e.client_id, e.chain_id) },

        WalletNotFound
            { chain_id: String, wallet_id: String }
            |e| { format!("wallet {} not found on chain {}", e.wallet_id, e.chain_id) },

        WalletExists
            { chain_id: String, wallet_id: String }
            |e| { format!("wallet {} already exists on chain {}", e.wallet_id, e.chain_id) },

        Keyring
            [ keyring::errors::Error ]
            |_| { "keyring error" },

        GrpcTransport
            { address: String }
            [ DisplayOnly<TransportError> ]
            |e| { format!("error in underlying transport when dialing gRPC endpoint {}", e.address) },

        GrpcStatus
            { endpoint: String }
            [ DisplayOnly<GrpcStatus> ]
            |e| { format!("gRPC call to {} returned error status", e.endpoint) },

        EmptyResponse
            { query: String }
            |e| { format!("gRPC response for {} carries no value", e.query) },

        ProtobufDecode
            { payload_type: String }
            [ DisplayOnly<DecodeError> ]
            |e| { format!("error decoding protocol buffer for {}", e.payload_type) },

        HexDecode
            { field: String }
            [ DisplayOnly<hex::FromHexError> ]
            |e| { format!("error decoding hex value of {}", e.field) },

        InvalidTxId
            { tx_id: String, length: usize }
            |e| { format!("transaction id {} decodes to {} bytes, expected 32", e.tx_id, e.length) },

        EventAttribute
            { event: String, attribute: String, reason: String }
            |e| {
                format!("malformed attribute {} in event {}: {}",
                    e.attribute, e.event, e.reason)
            },

        UnknownIbcVersion
            { tx_hash: String }
            |e| { format!("could not determine IBC version from events of transaction {}", e.tx_hash) },

        NoPackets
            { chain_id: String, tx_hash: String }
            |e| { format!("no packets found in transaction {} on chain {}", e.tx_hash, e.chain_id) },

        UnexpectedPacketCount
            { chain_id: String, tx_hash: String, count: usize }
            |e| {
                format!("expected exactly 1 packet in transaction {} on chain {}, got {}",
                    e.tx_hash, e.chain_id, e.count)
            },

        AccountNotFound
            { address: String }
            |e| { format!("account {} not found on chain", e.address) },

        InvalidAmount
            { amount: String }
            |e| { format!("cannot parse {} as an integer amount", e.amount) },

        InvalidEthAddress
            { address: String }
            |e| { format!("cannot parse {} as an ethereum address", e.address) },

        TxFailed
            { chain_id: String, tx_hash: String, code: u32, log: String }
            |e| {
                format!("transaction {} on chain {} failed with code {}: {}",
                    e.tx_hash, e.chain_id, e.code, e.log)
            },

        TxInclusionTimeout
            { chain_id: String, tx_hash: String }
            |e| {
                format!("transaction {} on chain {} was not included within the inclusion timeout",
                    e.tx_hash, e.chain_id)
            },

        EmptyTxMessages
            { chain_id: String }
            |e| { format!("relay payload for chain {} contains no messages", e.chain_id) },

        EthProvider
            { chain_id: String, operation: String, reason: String }
            |e| {
                format!("ethereum provider error on chain {} during {}: {}",
                    e.chain_id, e.operation, e.reason)
            },

        EthContract
            { chain_id: String, operation: String, reason: String }
            |e| {
                format!("ethereum contract error on chain {} during {}: {}",
                    e.chain_id, e.operation, e.reason)
            },

        ReceiptTimeout
            { chain_id: String, tx_hash: String }
            |e| {
                format!("no receipt for transaction {} on chain {} within the receipt timeout",
                    e.tx_hash, e.chain_id)
            },

        ReceiptStatus
            { chain_id: String, tx_hash: String }
            |e| { format!("transaction {} on chain {} reverted", e.tx_hash, e.chain_id) },

        RelayBatch
            { tx_ids: Vec<String> }
            [ DisplayOnly<Box<Error>> ]
            |e| { format!("failed to relay batch with tx ids {:?}", e.tx_ids) },

        RelayTimeout
            { source_chain: String, destination_chain: String, unconfirmed: Vec<String> }
            |e| {
                format!("packets from {} were not received on {} within the wait timeout: {:?}",
                    e.source_chain, e.destination_chain, e.unconfirmed)
            },

        TaskJoin
            [ DisplayOnly<tokio::task::JoinError> ]
            |_| { "failed to join concurrent task" },

        WalletCountMismatch
            { senders: usize, recipients: usize }
            |e| {
                format!("sender and recipient wallet counts differ: {} != {}",
                    e.senders, e.recipients)
            },

        InvalidPacketsPerWallet
            { value: usize }
            |e| { format!("packets-per-wallet must be at least 1, got {}", e.value) },

        Transfer
            { from_chain: String, to_chain: String }
            [ DisplayOnly<Box<Error>> ]
            |e| { format!("failed to transfer from {} to {}", e.from_chain, e.to_chain) },

        Aborted
            |_| { "operation aborted" },
    }
}
