//! Extraction of IBC packets from Cosmos transaction events.

use ibc_proto::ibc::core::channel::{v1, v2};
use ibc_proto::ibc::core::client::v1::Height;
use prost::Message;
use tendermint_proto::abci::Event as AbciEvent;

use crate::error::Error;
use crate::packet::Packet;

const EVENT_TYPE_MESSAGE: &str = "message";
const EVENT_TYPE_SEND_PACKET: &str = "send_packet";

const ATTR_MODULE: &str = "module";
const MODULE_CHANNEL_V1: &str = "ibc_channel";
const MODULE_CHANNEL_V2: &str = "ibc_channelv2";

// ibc-go send_packet attribute keys, channel v1
const ATTR_DATA_HEX: &str = "packet_data_hex";
const ATTR_SEQUENCE: &str = "packet_sequence";
const ATTR_SRC_PORT: &str = "packet_src_port";
const ATTR_SRC_CHANNEL: &str = "packet_src_channel";
const ATTR_DST_PORT: &str = "packet_dst_port";
const ATTR_DST_CHANNEL: &str = "packet_dst_channel";
const ATTR_TIMEOUT_HEIGHT: &str = "packet_timeout_height";
const ATTR_TIMEOUT_TIMESTAMP: &str = "packet_timeout_timestamp";

// ibc-go send_packet attribute key, channel v2
const ATTR_ENCODED_PACKET_HEX: &str = "encoded_packet_hex";

/// A transaction event in neutral form, decoupled from the proto types the
/// query layer happens to return.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxEvent {
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

impl TxEvent {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn required(&self, key: &str) -> Result<&str, Error> {
        self.attribute(key).ok_or_else(|| {
            Error::event_attribute(self.kind.clone(), key.to_string(), "missing".to_string())
        })
    }
}

pub fn from_abci_events(events: &[AbciEvent]) -> Vec<TxEvent> {
    events
        .iter()
        .map(|event| TxEvent {
            kind: event.r#type.clone(),
            attributes: event
                .attributes
                .iter()
                .map(|attr| (attr.key.clone(), attr.value.clone()))
                .collect(),
        })
        .collect()
}

/// Parse every packet a transaction emitted.
///
/// The IBC version is determined from the `message` event's `module`
/// attribute; mixing both channel versions in one transaction does not occur
/// on any supported chain.
pub fn parse_packets(
    chain_id: &str,
    tx_hash: &str,
    events: &[TxEvent],
) -> Result<Vec<Packet>, Error> {
    match determine_ibc_version(events) {
        Some(1) => parse_v1_packets(chain_id, tx_hash, events),
        Some(2) => parse_v2_packets(chain_id, tx_hash, events),
        _ => Err(Error::unknown_ibc_version(tx_hash.to_string())),
    }
}

fn determine_ibc_version(events: &[TxEvent]) -> Option<u8> {
    for event in events {
        if event.kind != EVENT_TYPE_MESSAGE {
            continue;
        }

        match event.attribute(ATTR_MODULE) {
            Some(MODULE_CHANNEL_V1) => return Some(1),
            Some(MODULE_CHANNEL_V2) => return Some(2),
            _ => continue,
        }
    }

    None
}

fn parse_v1_packets(
    chain_id: &str,
    tx_hash: &str,
    events: &[TxEvent],
) -> Result<Vec<Packet>, Error> {
    let mut packets = Vec::new();

    for event in events {
        if event.kind != EVENT_TYPE_SEND_PACKET {
            continue;
        }

        let data = hex::decode(event.required(ATTR_DATA_HEX)?)
            .map_err(|e| Error::hex_decode(ATTR_DATA_HEX.to_string(), e))?;

        let raw = v1::Packet {
            sequence: parse_u64(event, ATTR_SEQUENCE)?,
            source_port: event.required(ATTR_SRC_PORT)?.to_string(),
            source_channel: event.required(ATTR_SRC_CHANNEL)?.to_string(),
            destination_port: event.required(ATTR_DST_PORT)?.to_string(),
            destination_channel: event.required(ATTR_DST_CHANNEL)?.to_string(),
            data,
            timeout_height: Some(parse_height(event, ATTR_TIMEOUT_HEIGHT)?),
            timeout_timestamp: parse_u64(event, ATTR_TIMEOUT_TIMESTAMP)?,
        };

        packets.push(Packet::from_v1(tx_hash, raw));
    }

    if packets.is_empty() {
        return Err(Error::no_packets(chain_id.to_string(), tx_hash.to_string()));
    }

    Ok(packets)
}

fn parse_v2_packets(
    chain_id: &str,
    tx_hash: &str,
    events: &[TxEvent],
) -> Result<Vec<Packet>, Error> {
    let mut packets = Vec::new();

    for event in events {
        if event.kind != EVENT_TYPE_SEND_PACKET {
            continue;
        }

        let Some(encoded) = event.attribute(ATTR_ENCODED_PACKET_HEX) else {
            continue;
        };

        let bytes = hex::decode(encoded)
            .map_err(|e| Error::hex_decode(ATTR_ENCODED_PACKET_HEX.to_string(), e))?;

        let raw = v2::Packet::decode(bytes.as_slice())
            .map_err(|e| Error::protobuf_decode("Packet".to_string(), e))?;

        packets.push(Packet::from_v2(tx_hash, raw));
    }

    if packets.is_empty() {
        return Err(Error::no_packets(chain_id.to_string(), tx_hash.to_string()));
    }

    Ok(packets)
}

fn parse_u64(event: &TxEvent, key: &str) -> Result<u64, Error> {
    event.required(key)?.parse::<u64>().map_err(|e| {
        Error::event_attribute(event.kind.clone(), key.to_string(), e.to_string())
    })
}

/// Parse a `{revision}-{height}` string into a client height.
fn parse_height(event: &TxEvent, key: &str) -> Result<Height, Error> {
    let value = event.required(key)?;

    let (revision, height) = value.split_once('-').ok_or_else(|| {
        Error::event_attribute(
            event.kind.clone(),
            key.to_string(),
            format!("expected revision-height, got {value}"),
        )
    })?;

    let parse = |part: &str| {
        part.parse::<u64>().map_err(|e| {
            Error::event_attribute(event.kind.clone(), key.to_string(), e.to_string())
        })
    };

    Ok(Height {
        revision_number: parse(revision)?,
        revision_height: parse(height)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_event(module: &str) -> TxEvent {
        TxEvent {
            kind: EVENT_TYPE_MESSAGE.to_string(),
            attributes: vec![(ATTR_MODULE.to_string(), module.to_string())],
        }
    }

    fn v1_send_packet_event() -> TxEvent {
        TxEvent {
            kind: EVENT_TYPE_SEND_PACKET.to_string(),
            attributes: vec![
                (ATTR_DATA_HEX.to_string(), hex::encode([1u8, 2, 3])),
                (ATTR_SEQUENCE.to_string(), "12".to_string()),
                (ATTR_SRC_PORT.to_string(), "transfer".to_string()),
                (ATTR_SRC_CHANNEL.to_string(), "channel-0".to_string()),
                (ATTR_DST_PORT.to_string(), "transfer".to_string()),
                (ATTR_DST_CHANNEL.to_string(), "channel-7".to_string()),
                (ATTR_TIMEOUT_HEIGHT.to_string(), "1-500".to_string()),
                (ATTR_TIMEOUT_TIMESTAMP.to_string(), "1700000099".to_string()),
            ],
        }
    }

    fn v2_send_packet_event(packet: &v2::Packet) -> TxEvent {
        TxEvent {
            kind: EVENT_TYPE_SEND_PACKET.to_string(),
            attributes: vec![(
                ATTR_ENCODED_PACKET_HEX.to_string(),
                hex::encode(packet.encode_to_vec()),
            )],
        }
    }

    fn sample_v2_packet() -> v2::Packet {
        v2::Packet {
            sequence: 42,
            source_client: "client-3".to_string(),
            destination_client: "client-9".to_string(),
            timeout_timestamp: 1_700_000_000,
            payloads: vec![v2::Payload {
                source_port: "transfer".to_string(),
                destination_port: "transfer".to_string(),
                version: "ics20-1".to_string(),
                encoding: "application/x-solidity-abi".to_string(),
                value: vec![0xde, 0xad],
            }],
        }
    }

    #[test]
    fn parses_a_v1_send_packet() {
        let events = vec![message_event(MODULE_CHANNEL_V1), v1_send_packet_event()];

        let packets = parse_packets("chain-a", "ab".repeat(32).as_str(), &events).unwrap();

        assert_eq!(packets.len(), 1);
        let packet = &packets[0];
        assert_eq!(packet.ibc_version, 1);
        assert_eq!(packet.sequence, 12);
        assert_eq!(packet.source_client, "channel-0");
        assert_eq!(packet.destination_client, "channel-7");
        assert_eq!(packet.timeout_timestamp, 1_700_000_099);
    }

    #[test]
    fn parses_a_v2_send_packet() {
        let raw = sample_v2_packet();
        let events = vec![message_event(MODULE_CHANNEL_V2), v2_send_packet_event(&raw)];

        let packets = parse_packets("chain-a", "cd".repeat(32).as_str(), &events).unwrap();

        assert_eq!(packets.len(), 1);
        let packet = &packets[0];
        assert_eq!(packet.ibc_version, 2);
        assert_eq!(packet.sequence, 42);
        assert_eq!(packet.source_client, "client-3");
        assert_eq!(packet.destination_client, "client-9");
        assert_eq!(v2::Packet::decode(packet.raw.as_slice()).unwrap(), raw);
    }

    #[test]
    fn multiple_send_packet_events_yield_multiple_packets() {
        let raw = sample_v2_packet();
        let events = vec![
            message_event(MODULE_CHANNEL_V2),
            v2_send_packet_event(&raw),
            v2_send_packet_event(&raw),
        ];

        let packets = parse_packets("chain-a", "cd".repeat(32).as_str(), &events).unwrap();

        assert_eq!(packets.len(), 2);
    }

    #[test]
    fn version_cannot_be_determined_without_a_module_attribute() {
        let events = vec![v1_send_packet_event()];

        let err = parse_packets("chain-a", "ee".repeat(32).as_str(), &events).unwrap_err();

        assert!(err.to_string().contains("IBC version"));
    }

    #[test]
    fn missing_send_packet_event_is_an_error() {
        let events = vec![message_event(MODULE_CHANNEL_V2)];

        assert!(parse_packets("chain-a", "ff".repeat(32).as_str(), &events).is_err());
    }

    #[test]
    fn malformed_timeout_height_is_rejected() {
        let mut event = v1_send_packet_event();
        for attr in event.attributes.iter_mut() {
            if attr.0 == ATTR_TIMEOUT_HEIGHT {
                attr.1 = "not-a-height".to_string();
            }
        }

        let events = vec![message_event(MODULE_CHANNEL_V1), event];

        assert!(parse_packets("chain-a", "aa".repeat(32).as_str(), &events).is_err());
    }
}
