//! Wire types and client for the remote relayer service, kept in the shape
//! `prost-build`/`tonic-build` emit for `relayer.RelayerService`.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RelayByTxRequest {
    #[prost(string, tag = "1")]
    pub src_chain: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub dst_chain: ::prost::alloc::string::String,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub source_tx_ids: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "4")]
    pub timeout_tx_ids: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    #[prost(string, tag = "5")]
    pub src_client_id: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub dst_client_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RelayByTxResponse {
    /// The multicall transaction to be submitted by caller
    #[prost(bytes = "vec", tag = "1")]
    pub tx: ::prost::alloc::vec::Vec<u8>,
    /// The contract address to submit the transaction, if applicable
    #[prost(string, tag = "2")]
    pub address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateClientRequest {
    #[prost(string, tag = "1")]
    pub src_chain: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub dst_chain: ::prost::alloc::string::String,
    #[prost(map = "string, string", tag = "3")]
    pub parameters: ::std::collections::HashMap<
        ::prost::alloc::string::String,
        ::prost::alloc::string::String,
    >,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateClientResponse {
    /// The transaction to be submitted by caller
    #[prost(bytes = "vec", tag = "1")]
    pub tx: ::prost::alloc::vec::Vec<u8>,
    /// The contract address to submit the transaction, if applicable
    #[prost(string, tag = "2")]
    pub address: ::prost::alloc::string::String,
}

/// Generated client implementations.
pub mod relayer_service_client {
    #![allow(unused_variables, dead_code, missing_docs, clippy::wildcard_imports)]

    use tonic::codegen::http::Uri;
    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct RelayerServiceClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl RelayerServiceClient<tonic::transport::Channel> {
        /// Attempt to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> RelayerServiceClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }

        pub async fn relay_by_tx(
            &mut self,
            request: impl tonic::IntoRequest<super::RelayByTxRequest>,
        ) -> std::result::Result<tonic::Response<super::RelayByTxResponse>, tonic::Status>
        {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/relayer.RelayerService/RelayByTx");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("relayer.RelayerService", "RelayByTx"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn create_client(
            &mut self,
            request: impl tonic::IntoRequest<super::CreateClientRequest>,
        ) -> std::result::Result<tonic::Response<super::CreateClientResponse>, tonic::Status>
        {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/relayer.RelayerService/CreateClient");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("relayer.RelayerService", "CreateClient"));
            self.inner.unary(req, path, codec).await
        }
    }
}
