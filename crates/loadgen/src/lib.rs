//! Cross-ledger IBC packet-relay orchestrator and load generator.
//!
//! The crate drives fungible-token transfers across a Cosmos SDK chain and
//! an Ethereum chain in parallel, captures the packets those transfers emit,
//! and relays them to the counterparty chain either through a remote relayer
//! service ([`relayer::client::RelayerClient`]) or by waiting for an
//! external relayer to deliver them. Progress is reported over a bounded
//! stream of [`loadscript::ProgressUpdate`]s.
//!
//! The main pieces:
//!
//! - [`chain`]: the [`chain::ChainEndpoint`] contract and its Cosmos and
//!   Ethereum adapters.
//! - [`relayer`]: the batching relay queue and the relayer-service client.
//! - [`loadscript`]: the bidirectional per-wallet load driver.
//! - [`network`]: the chain registry built from the configuration.

#![forbid(unsafe_code)]

pub mod chain;
pub mod config;
pub mod error;
pub mod keyring;
pub mod loadscript;
pub mod network;
pub mod packet;
pub mod relayer;
pub mod util;
