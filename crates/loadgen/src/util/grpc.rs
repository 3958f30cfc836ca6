//! gRPC channel construction shared by the Cosmos adapter and the relay
//! transport.

use core::time::Duration;

use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

use crate::error::Error;

const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Dial a gRPC endpoint.
///
/// Endpoints that look like they terminate on a 443 port are dialed with
/// TLS, everything else speaks plaintext. A missing scheme is filled in
/// accordingly, so bare `host:port` addresses from the configuration work.
pub async fn connect(addr: &str) -> Result<Channel, Error> {
    let tls = addr.contains("443");

    let uri = if addr.contains("://") {
        addr.to_string()
    } else if tls {
        format!("https://{addr}")
    } else {
        format!("http://{addr}")
    };

    let endpoint = Endpoint::from_shared(uri.clone())
        .map_err(|e| Error::grpc_transport(uri.clone(), e))?
        .timeout(RPC_TIMEOUT);

    let endpoint = if tls {
        endpoint
            .tls_config(ClientTlsConfig::new().with_native_roots())
            .map_err(|e| Error::grpc_transport(uri.clone(), e))?
    } else {
        endpoint
    };

    endpoint
        .connect()
        .await
        .map_err(|e| Error::grpc_transport(uri, e))
}
