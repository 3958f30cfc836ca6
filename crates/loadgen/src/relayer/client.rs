//! Thin client over the remote relayer service.

use core::time::Duration;
use std::collections::HashMap;

use tokio::time::sleep;
use tracing::debug;

use crate::error::Error;
use crate::util::grpc;

use super::proto::relayer_service_client::RelayerServiceClient;
use super::proto::{CreateClientRequest, RelayByTxRequest};

const RELAY_ATTEMPTS: u32 = 4;
const RELAY_RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Stateless handle on the relayer service: every call dials the endpoint
/// and retries any non-OK status with a short fixed backoff.
#[derive(Clone, Debug)]
pub struct RelayerClient {
    grpc_addr: String,
}

impl RelayerClient {
    pub fn new(grpc_addr: impl Into<String>) -> Self {
        Self {
            grpc_addr: grpc_addr.into(),
        }
    }

    /// Ask the relayer service for a destination-chain transaction covering
    /// the packets emitted by the given source transactions. The returned
    /// bytes are opaque; the destination chain interprets them.
    pub async fn relay_by_tx(
        &self,
        src_chain_id: &str,
        dst_chain_id: &str,
        src_client_id: &str,
        dst_client_id: &str,
        tx_ids: &[String],
    ) -> Result<Vec<u8>, Error> {
        let source_tx_ids = tx_ids
            .iter()
            .map(|tx_id| decode_tx_id(tx_id))
            .collect::<Result<Vec<_>, _>>()?;

        let request = RelayByTxRequest {
            src_chain: src_chain_id.to_string(),
            dst_chain: dst_chain_id.to_string(),
            source_tx_ids,
            timeout_tx_ids: Vec::new(),
            src_client_id: src_client_id.to_string(),
            dst_client_id: dst_client_id.to_string(),
        };

        debug!(
            src_chain = %src_chain_id,
            dst_chain = %dst_chain_id,
            src_client = %src_client_id,
            dst_client = %dst_client_id,
            ?tx_ids,
            "sending RelayByTx request"
        );

        let mut result = self.relay_by_tx_once(&request).await;

        for _ in 1..RELAY_ATTEMPTS {
            if result.is_ok() {
                break;
            }

            sleep(RELAY_RETRY_BACKOFF).await;
            result = self.relay_by_tx_once(&request).await;
        }

        result
    }

    async fn relay_by_tx_once(&self, request: &RelayByTxRequest) -> Result<Vec<u8>, Error> {
        let channel = grpc::connect(&self.grpc_addr).await?;
        let mut client = RelayerServiceClient::new(channel);

        let response = client
            .relay_by_tx(request.clone())
            .await
            .map_err(|e| Error::grpc_status(self.grpc_addr.clone(), e))?
            .into_inner();

        Ok(response.tx)
    }

    /// Ask the relayer service for a transaction creating a light client of
    /// `src_chain_id` on `dst_chain_id`.
    pub async fn create_client(
        &self,
        src_chain_id: &str,
        dst_chain_id: &str,
        parameters: HashMap<String, String>,
    ) -> Result<Vec<u8>, Error> {
        let request = CreateClientRequest {
            src_chain: src_chain_id.to_string(),
            dst_chain: dst_chain_id.to_string(),
            parameters,
        };

        let mut result = self.create_client_once(&request).await;

        for _ in 1..RELAY_ATTEMPTS {
            if result.is_ok() {
                break;
            }

            sleep(RELAY_RETRY_BACKOFF).await;
            result = self.create_client_once(&request).await;
        }

        result
    }

    async fn create_client_once(&self, request: &CreateClientRequest) -> Result<Vec<u8>, Error> {
        let channel = grpc::connect(&self.grpc_addr).await?;
        let mut client = RelayerServiceClient::new(channel);

        let response = client
            .create_client(request.clone())
            .await
            .map_err(|e| Error::grpc_status(self.grpc_addr.clone(), e))?
            .into_inner();

        Ok(response.tx)
    }
}

/// Decode a transaction id into raw hash bytes by prefix inspection:
/// `0x…` ids are Ethereum hashes, bare hex ids are Cosmos hashes. Both must
/// decode to 32 bytes.
pub fn decode_tx_id(tx_id: &str) -> Result<Vec<u8>, Error> {
    let bare = tx_id.strip_prefix("0x").unwrap_or(tx_id);

    let bytes =
        hex::decode(bare).map_err(|e| Error::hex_decode(format!("tx id {tx_id}"), e))?;

    if bytes.len() != 32 {
        return Err(Error::invalid_tx_id(tx_id.to_string(), bytes.len()));
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ethereum_ids_decode_by_prefix() {
        let tx_id = format!("0x{}", "ab".repeat(32));
        let bytes = decode_tx_id(&tx_id).unwrap();

        assert_eq!(bytes, vec![0xab; 32]);
        // round-trip up to prefix normalization
        assert_eq!(format!("0x{}", hex::encode(&bytes)), tx_id);
    }

    #[test]
    fn cosmos_ids_decode_bare_in_either_case() {
        let upper = "AB".repeat(32);
        let lower = "ab".repeat(32);

        assert_eq!(decode_tx_id(&upper).unwrap(), decode_tx_id(&lower).unwrap());
        // round-trip up to case normalization
        assert_eq!(hex::encode(decode_tx_id(&upper).unwrap()), lower);
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        assert!(decode_tx_id("abcd").is_err());
        assert!(decode_tx_id(&format!("0x{}", "ab".repeat(33))).is_err());
    }

    #[test]
    fn non_hex_ids_are_rejected() {
        assert!(decode_tx_id("0xzz").is_err());
        assert!(decode_tx_id("hello world").is_err());
    }
}
