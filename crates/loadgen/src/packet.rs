//! Normalized representation of an in-flight IBC packet.

use ibc_proto::ibc::core::channel::{v1, v2};
use prost::Message;

/// A packet captured from a send transaction, carrying enough identity to
/// relay it and to look up its receipt on the destination chain.
///
/// Packets are plain values: cloned freely and never mutated after
/// construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Hex id of the transaction that emitted the packet: `0x`-prefixed for
    /// Ethereum-originated packets, bare hex for Cosmos-originated ones.
    pub tx_hash: String,

    /// 1 for channel packets, 2 for client-routed packets.
    pub ibc_version: u8,

    /// Monotonic per-client counter assigned by the source chain.
    pub sequence: u64,

    /// Opaque endpoint identifiers: channel ids for v1, client ids for v2.
    pub source_client: String,
    pub destination_client: String,

    pub timeout_timestamp: u64,

    /// Proto encoding of the original packet, kept for downstream decoders.
    pub raw: Vec<u8>,
}

impl Packet {
    pub fn from_v1(tx_hash: impl Into<String>, packet: v1::Packet) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            ibc_version: 1,
            sequence: packet.sequence,
            source_client: packet.source_channel.clone(),
            destination_client: packet.destination_channel.clone(),
            timeout_timestamp: packet.timeout_timestamp,
            raw: packet.encode_to_vec(),
        }
    }

    pub fn from_v2(tx_hash: impl Into<String>, packet: v2::Packet) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            ibc_version: 2,
            sequence: packet.sequence,
            source_client: packet.source_client.clone(),
            destination_client: packet.destination_client.clone(),
            timeout_timestamp: packet.timeout_timestamp,
            raw: packet.encode_to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_raw_bytes_decode_back_to_the_source_packet() {
        let source = v2::Packet {
            sequence: 7,
            source_client: "client-0".to_string(),
            destination_client: "client-1".to_string(),
            timeout_timestamp: 1_700_000_000,
            payloads: vec![v2::Payload {
                source_port: "transfer".to_string(),
                destination_port: "transfer".to_string(),
                version: "ics20-1".to_string(),
                encoding: "application/x-solidity-abi".to_string(),
                value: vec![1, 2, 3],
            }],
        };

        let packet = Packet::from_v2("aa".repeat(32), source.clone());

        assert_eq!(packet.ibc_version, 2);
        assert_eq!(packet.sequence, 7);
        assert_eq!(packet.source_client, "client-0");
        assert_eq!(packet.destination_client, "client-1");
        assert_eq!(v2::Packet::decode(packet.raw.as_slice()).unwrap(), source);
    }

    #[test]
    fn v1_endpoints_are_the_channel_ids() {
        let source = v1::Packet {
            sequence: 3,
            source_port: "transfer".to_string(),
            source_channel: "channel-2".to_string(),
            destination_port: "transfer".to_string(),
            destination_channel: "channel-5".to_string(),
            data: vec![9, 9],
            timeout_height: None,
            timeout_timestamp: 42,
        };

        let packet = Packet::from_v1("bb".repeat(32), source);

        assert_eq!(packet.ibc_version, 1);
        assert_eq!(packet.source_client, "channel-2");
        assert_eq!(packet.destination_client, "channel-5");
    }
}
