//! Batching relay queue: coalesces captured packets into batches for one
//! direction and drives them across, either through the remote relayer
//! service or by waiting for an external relayer to deliver them.

pub mod client;
pub mod proto;

use core::time::Duration;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::chain::ChainEndpoint;
use crate::error::Error;
use crate::keyring::Wallet;
use crate::packet::Packet;

use self::client::RelayerClient;

const WAIT_LOG_EVERY: u32 = 10;

#[derive(Copy, Clone, Debug, Default)]
struct Counters {
    in_flight: usize,
    completed: usize,
}

/// Polling parameters of the passive backend, shrunk by tests.
#[derive(Copy, Clone, Debug)]
pub(crate) struct WaitParams {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for WaitParams {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(120 * 60),
        }
    }
}

/// Bounded batching queue for one relay direction.
///
/// Packets accumulate in `pending`; reaching the batch threshold snapshots
/// the buffer into a batch and schedules it on a separate task. Batch
/// execution is serialized by `relay_lock`: the relayer wallet has a single
/// nonce on the destination chain.
pub struct RelayerQueue {
    source_chain: Arc<dyn ChainEndpoint>,
    destination_chain: Arc<dyn ChainEndpoint>,
    relayer_wallet: Wallet,
    batch_threshold: usize,
    self_relay: bool,
    relayer: RelayerClient,

    pending: RwLock<Vec<Packet>>,
    counters: RwLock<Counters>,
    relay_lock: AsyncMutex<()>,
    batches: Mutex<Vec<JoinHandle<Result<(), Error>>>>,

    pub(crate) wait_params: WaitParams,
}

impl RelayerQueue {
    pub fn new(
        source_chain: Arc<dyn ChainEndpoint>,
        destination_chain: Arc<dyn ChainEndpoint>,
        relayer_wallet: Wallet,
        batch_threshold: usize,
        self_relay: bool,
        relayer_addr: impl Into<String>,
    ) -> Self {
        Self {
            source_chain,
            destination_chain,
            relayer_wallet,
            batch_threshold,
            self_relay,
            relayer: RelayerClient::new(relayer_addr),
            pending: RwLock::new(Vec::new()),
            counters: RwLock::new(Counters::default()),
            relay_lock: AsyncMutex::new(()),
            batches: Mutex::new(Vec::new()),
            wait_params: WaitParams::default(),
        }
    }

    /// Append a packet. A full buffer is snapshotted into a batch and
    /// scheduled before the call returns; the pending lock is released
    /// before the batch starts executing.
    pub fn add(self: &Arc<Self>, packet: Packet) {
        let batch = {
            let mut pending = self.pending.write().expect("poisoned lock");
            pending.push(packet);

            if pending.len() >= self.batch_threshold {
                Some(std::mem::take(&mut *pending))
            } else {
                None
            }
        };

        if let Some(batch) = batch {
            self.spawn_batch(batch);
        }
    }

    fn spawn_batch(self: &Arc<Self>, batch: Vec<Packet>) {
        let queue = self.clone();
        let handle = tokio::spawn(async move { queue.relay(batch).await });

        self.batches.lock().expect("poisoned lock").push(handle);
    }

    /// `(pending, in_flight, completed)` snapshot. Reader-locked, so it does
    /// not serialize against batch execution.
    pub fn status(&self) -> (usize, usize, usize) {
        let pending = self.pending.read().expect("poisoned lock").len();
        let counters = *self.counters.read().expect("poisoned lock");

        (pending, counters.in_flight, counters.completed)
    }

    /// Dispatch any remaining packets as a final batch, then wait for every
    /// scheduled batch, surfacing the first error. Flushing an already
    /// flushed queue is a no-op.
    pub async fn flush(self: &Arc<Self>) -> Result<(), Error> {
        let remainder = {
            let mut pending = self.pending.write().expect("poisoned lock");
            std::mem::take(&mut *pending)
        };

        if !remainder.is_empty() {
            self.spawn_batch(remainder);
        }

        let mut first_error: Option<Error> = None;

        loop {
            let handle = self.batches.lock().expect("poisoned lock").pop();

            let Some(handle) = handle else {
                break;
            };

            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(Error::task_join(e));
                }
            }
        }

        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Execute one batch under the relay mutex.
    ///
    /// `in_flight` covers the whole execution; `completed` only moves on
    /// success.
    async fn relay(&self, batch: Vec<Packet>) -> Result<(), Error> {
        let _serialized = self.relay_lock.lock().await;

        {
            let mut counters = self.counters.write().expect("poisoned lock");
            counters.in_flight += batch.len();
        }

        let result = if self.self_relay {
            self.relay_by_rpc(&batch).await
        } else {
            self.relay_by_waiting(&batch).await
        };

        {
            let mut counters = self.counters.write().expect("poisoned lock");
            counters.in_flight -= batch.len();

            if result.is_ok() {
                counters.completed += batch.len();
            }
        }

        result.map_err(|e| Error::relay_batch(tx_ids(&batch), Box::new(e)))
    }

    /// Active backend: obtain a destination transaction from the relayer
    /// service and inject it with the relayer wallet.
    ///
    /// All packets in a batch share their source and destination client.
    async fn relay_by_rpc(&self, batch: &[Packet]) -> Result<(), Error> {
        let Some(head) = batch.first() else {
            return Ok(());
        };

        let ids = tx_ids(batch);

        info!(
            source_chain = %self.source_chain.chain_id(),
            destination_chain = %self.destination_chain.chain_id(),
            destination_client = %head.destination_client,
            relayer = %self.relayer_wallet.address(),
            tx_ids = ?ids,
            "relaying packets through the relayer service"
        );

        let tx_bytes = self
            .relayer
            .relay_by_tx(
                self.source_chain.chain_id(),
                self.destination_chain.chain_id(),
                &head.source_client,
                &head.destination_client,
                &ids,
            )
            .await?;

        let relay_tx_hash = self
            .destination_chain
            .submit_relay_tx(&tx_bytes, &self.relayer_wallet)
            .await?;

        info!(
            source_chain = %self.source_chain.chain_id(),
            destination_chain = %self.destination_chain.chain_id(),
            relay_tx_hash = %relay_tx_hash,
            tx_ids = ?ids,
            "finished relaying packets"
        );

        Ok(())
    }

    /// Passive backend: wait for an external relayer to deliver the batch,
    /// dropping packets from the wait set as their receipts appear on the
    /// destination chain.
    async fn relay_by_waiting(&self, batch: &[Packet]) -> Result<(), Error> {
        let mut waiting: Vec<Packet> = batch.to_vec();
        let started = Instant::now();
        let mut polls: u32 = 0;

        info!(
            source_chain = %self.source_chain.chain_id(),
            destination_chain = %self.destination_chain.chain_id(),
            num_packets = waiting.len(),
            tx_ids = ?tx_ids(&waiting),
            "waiting for packet receipts"
        );

        while !waiting.is_empty() {
            if started.elapsed() >= self.wait_params.max_wait {
                return Err(Error::relay_timeout(
                    self.source_chain.chain_id().to_string(),
                    self.destination_chain.chain_id().to_string(),
                    tx_ids(&waiting),
                ));
            }

            if polls > 0 && polls % WAIT_LOG_EVERY == 0 {
                info!(
                    source_chain = %self.source_chain.chain_id(),
                    destination_chain = %self.destination_chain.chain_id(),
                    remaining = waiting.len(),
                    elapsed = ?started.elapsed(),
                    "still waiting for packet receipts"
                );
            }

            let mut remaining = Vec::with_capacity(waiting.len());

            for packet in &waiting {
                let received = match self.destination_chain.is_packet_received(packet).await {
                    Ok(received) => received,
                    Err(e) => {
                        debug!(
                            tx_hash = %packet.tx_hash,
                            error = %e,
                            "failed to check packet receipt"
                        );

                        false
                    }
                };

                if !received {
                    remaining.push(packet.clone());
                }
            }

            waiting = remaining;

            if waiting.is_empty() {
                break;
            }

            sleep(self.wait_params.poll_interval).await;
            polls += 1;
        }

        info!(
            source_chain = %self.source_chain.chain_id(),
            destination_chain = %self.destination_chain.chain_id(),
            num_packets = batch.len(),
            elapsed = ?started.elapsed(),
            "all packet receipts observed"
        );

        Ok(())
    }
}

fn tx_ids(packets: &[Packet]) -> Vec<String> {
    packets.iter().map(|p| p.tx_hash.clone()).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::chain::mock::MockChain;

    use super::*;

    fn test_packet(sequence: u64) -> Packet {
        Packet {
            tx_hash: format!("{sequence:064x}"),
            ibc_version: 2,
            sequence,
            source_client: "client-0".to_string(),
            destination_client: "client-1".to_string(),
            timeout_timestamp: 1_700_000_000,
            raw: Vec::new(),
        }
    }

    fn test_queue(destination: Arc<MockChain>, threshold: usize) -> Arc<RelayerQueue> {
        let source = Arc::new(MockChain::new("src"));
        let relayer_wallet = destination.generate_test_wallet("relayer");

        let mut queue = RelayerQueue::new(
            source,
            destination,
            relayer_wallet,
            threshold,
            false,
            "localhost:3000",
        );
        queue.wait_params = WaitParams {
            poll_interval: Duration::from_millis(10),
            max_wait: Duration::from_millis(100),
        };

        Arc::new(queue)
    }

    #[tokio::test]
    async fn reaching_the_threshold_dispatches_exactly_one_batch() {
        let destination = Arc::new(MockChain::new("dst"));
        let queue = test_queue(destination.clone(), 10);

        for sequence in 0..10 {
            queue.add(test_packet(sequence));
        }

        // the snapshot-and-reset happens inside add
        let (pending, _, _) = queue.status();
        assert_eq!(pending, 0);

        queue.flush().await.unwrap();

        let (pending, in_flight, completed) = queue.status();
        assert_eq!((pending, in_flight, completed), (0, 0, 10));

        // one receipt query per packet: batches are disjoint and complete
        let queries = destination.receipt_queries.lock().unwrap().clone();
        assert_eq!(queries.len(), 10);
        assert_eq!(queries.iter().collect::<BTreeSet<_>>().len(), 10);
    }

    #[tokio::test]
    async fn flush_drains_a_partial_buffer() {
        let destination = Arc::new(MockChain::new("dst"));
        let queue = test_queue(destination.clone(), 10);

        for sequence in 0..3 {
            queue.add(test_packet(sequence));
        }

        assert_eq!(queue.status(), (3, 0, 0));

        queue.flush().await.unwrap();

        assert_eq!(queue.status(), (0, 0, 3));
    }

    #[tokio::test]
    async fn every_packet_lands_in_exactly_one_batch() {
        let destination = Arc::new(MockChain::new("dst"));
        let queue = test_queue(destination.clone(), 2);

        for sequence in 0..5 {
            queue.add(test_packet(sequence));
        }

        queue.flush().await.unwrap();

        assert_eq!(queue.status(), (0, 0, 5));

        let queries = destination.receipt_queries.lock().unwrap().clone();
        assert_eq!(queries.len(), 5);
        assert_eq!(queries.iter().collect::<BTreeSet<_>>().len(), 5);
    }

    #[tokio::test]
    async fn flush_is_idempotent() {
        let destination = Arc::new(MockChain::new("dst"));
        let queue = test_queue(destination, 10);

        queue.add(test_packet(1));

        queue.flush().await.unwrap();
        queue.flush().await.unwrap();

        assert_eq!(queue.status(), (0, 0, 1));
    }

    #[tokio::test]
    async fn flushing_an_empty_queue_is_a_no_op() {
        let destination = Arc::new(MockChain::new("dst"));
        let queue = test_queue(destination, 10);

        queue.flush().await.unwrap();

        assert_eq!(queue.status(), (0, 0, 0));
    }

    #[tokio::test]
    async fn timed_out_waits_fail_without_touching_completed() {
        let destination = Arc::new(MockChain::new("dst"));
        destination.set_receipts_available(false);
        let queue = test_queue(destination, 10);

        queue.add(test_packet(1));
        queue.add(test_packet(2));

        let err = queue.flush().await.unwrap_err();

        // the failure carries the unconfirmed tx ids
        assert!(err.to_string().contains(&test_packet(1).tx_hash));

        let (pending, in_flight, completed) = queue.status();
        assert_eq!((pending, in_flight, completed), (0, 0, 0));
    }
}
