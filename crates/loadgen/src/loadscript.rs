//! Bidirectional per-wallet load driver and its progress stream.

use std::sync::Arc;

use ethers::types::U256;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::chain::ChainEndpoint;
use crate::error::{Error, ErrorDetail};
use crate::keyring::Wallet;
use crate::relayer::RelayerQueue;
use crate::util::retry::with_retry;

const BATCH_THRESHOLD: usize = 10;
const PROGRESS_CAPACITY: usize = 100;
const TRANSFER_ATTEMPTS: u32 = 3;

/// One lifecycle event of a load run, for consumption by a UI sink.
///
/// Updates from a single direction are totally ordered; the channel is
/// bounded, so a consumer that stops draining backpressures the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressUpdate {
    Transfer(ProgressReport),
    Relaying(ProgressReport),
    Done(ProgressReport),
    Error(ProgressError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressReport {
    pub from_chain: String,
    pub to_chain: String,
    pub current_transfers: usize,
    pub total_transfers: usize,
    pub completed_relaying: usize,
    pub in_queue: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressError {
    pub from_chain: String,
    pub to_chain: String,
    pub total_transfers: usize,
    pub message: String,
    /// Set when the run was cancelled rather than failing; aborted runs are
    /// not counted as failures in aggregate reporting.
    pub aborted: bool,
}

/// Inputs for one direction of a load run. The opposite direction is a
/// second, fully independent invocation.
pub struct LoadOptions {
    pub from_chain: Arc<dyn ChainEndpoint>,
    pub from_client_id: String,
    pub denom: String,
    pub from_wallets: Vec<Wallet>,
    pub to_chain: Arc<dyn ChainEndpoint>,
    pub to_wallets: Vec<Wallet>,
    pub to_relayer_wallet: Wallet,
    pub amount: U256,
    pub packets_per_wallet: usize,
    pub self_relay: bool,
    pub relayer_addr: String,
    pub cancellation: CancellationToken,
}

/// Start one direction of the load run.
///
/// Returns the bounded progress stream immediately; transfers and the relay
/// pipeline proceed on background tasks, one lane per wallet pair. The
/// stream ends with either a `Done` or an `Error` update.
pub fn transfer_and_relay(opts: LoadOptions) -> Result<mpsc::Receiver<ProgressUpdate>, Error> {
    if opts.from_wallets.len() != opts.to_wallets.len() {
        return Err(Error::wallet_count_mismatch(
            opts.from_wallets.len(),
            opts.to_wallets.len(),
        ));
    }

    if opts.packets_per_wallet == 0 {
        return Err(Error::invalid_packets_per_wallet(0));
    }

    let (progress, stream) = mpsc::channel(PROGRESS_CAPACITY);

    tokio::spawn(run(opts, progress));

    Ok(stream)
}

async fn run(opts: LoadOptions, progress: mpsc::Sender<ProgressUpdate>) {
    let from_chain_id = opts.from_chain.chain_id().to_string();
    let to_chain_id = opts.to_chain.chain_id().to_string();
    let total = opts.from_wallets.len() * opts.packets_per_wallet;

    let queue = Arc::new(RelayerQueue::new(
        opts.from_chain.clone(),
        opts.to_chain.clone(),
        opts.to_relayer_wallet.clone(),
        BATCH_THRESHOLD,
        opts.self_relay,
        opts.relayer_addr.clone(),
    ));

    let initial = ProgressUpdate::Transfer(report(&from_chain_id, &to_chain_id, 0, total, &queue));
    if progress.send(initial).await.is_err() {
        return;
    }

    let completed_transfers = Arc::new(AsyncMutex::new(0usize));

    let mut lanes: JoinSet<Result<(), Error>> = JoinSet::new();

    for (sender, recipient) in opts
        .from_wallets
        .iter()
        .cloned()
        .zip(opts.to_wallets.iter().cloned())
    {
        lanes.spawn(lane(LaneContext {
            from_chain: opts.from_chain.clone(),
            from_chain_id: from_chain_id.clone(),
            to_chain_id: to_chain_id.clone(),
            client_id: opts.from_client_id.clone(),
            denom: opts.denom.clone(),
            amount: opts.amount,
            sender,
            recipient,
            packets_per_wallet: opts.packets_per_wallet,
            total,
            queue: queue.clone(),
            completed_transfers: completed_transfers.clone(),
            progress: progress.clone(),
            cancellation: opts.cancellation.clone(),
        }));
    }

    let mut failure: Option<Error> = None;

    while let Some(joined) = lanes.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failure.get_or_insert(e);
            }
            Err(e) => {
                failure.get_or_insert(Error::task_join(e));
            }
        }
    }

    if let Some(e) = failure {
        emit_error(&progress, &from_chain_id, &to_chain_id, total, &e).await;
        return;
    }

    info!(
        from_chain = %from_chain_id,
        to_chain = %to_chain_id,
        total_transfers = total,
        "transfers completed, flushing relay queue"
    );

    let relaying =
        ProgressUpdate::Relaying(report(&from_chain_id, &to_chain_id, total, total, &queue));
    if progress.send(relaying).await.is_err() {
        return;
    }

    let flushed = tokio::select! {
        result = queue.flush() => result,
        _ = opts.cancellation.cancelled() => Err(Error::aborted()),
    };

    if let Err(e) = flushed {
        emit_error(&progress, &from_chain_id, &to_chain_id, total, &e).await;
        return;
    }

    info!(
        from_chain = %from_chain_id,
        to_chain = %to_chain_id,
        completed_packets = total,
        "relay queue flushed"
    );

    let done = ProgressUpdate::Done(ProgressReport {
        from_chain: from_chain_id,
        to_chain: to_chain_id,
        current_transfers: total,
        total_transfers: total,
        completed_relaying: total,
        in_queue: 0,
    });

    let _ = progress.send(done).await;
}

struct LaneContext {
    from_chain: Arc<dyn ChainEndpoint>,
    from_chain_id: String,
    to_chain_id: String,
    client_id: String,
    denom: String,
    amount: U256,
    sender: Wallet,
    recipient: Wallet,
    packets_per_wallet: usize,
    total: usize,
    queue: Arc<RelayerQueue>,
    completed_transfers: Arc<AsyncMutex<usize>>,
    progress: mpsc::Sender<ProgressUpdate>,
    cancellation: CancellationToken,
}

/// One worker lane: sequential transfers from a single sender wallet,
/// each retried a bounded number of times and fed into the relay queue.
async fn lane(ctx: LaneContext) -> Result<(), Error> {
    for _ in 0..ctx.packets_per_wallet {
        if ctx.cancellation.is_cancelled() {
            return Err(Error::aborted());
        }

        let packet = with_retry(TRANSFER_ATTEMPTS, || {
            ctx.from_chain.send_transfer(
                &ctx.client_id,
                &ctx.sender,
                ctx.amount,
                &ctx.denom,
                ctx.recipient.address(),
                "",
            )
        })
        .await
        .map_err(|e| {
            Error::transfer(
                ctx.from_chain_id.clone(),
                ctx.to_chain_id.clone(),
                Box::new(e),
            )
        })?;

        ctx.queue.add(packet);

        {
            let mut completed = ctx.completed_transfers.lock().await;
            *completed += 1;

            let update = ProgressUpdate::Transfer(report(
                &ctx.from_chain_id,
                &ctx.to_chain_id,
                *completed,
                ctx.total,
                &ctx.queue,
            ));

            if ctx.progress.send(update).await.is_err() {
                // consumer went away; stop producing
                return Err(Error::aborted());
            }
        }

        info!(
            from_chain = %ctx.from_chain_id,
            to_chain = %ctx.to_chain_id,
            from = %ctx.sender.address(),
            to = %ctx.recipient.address(),
            amount = %ctx.amount,
            denom = %ctx.denom,
            "transfer completed"
        );
    }

    Ok(())
}

fn report(
    from_chain: &str,
    to_chain: &str,
    current: usize,
    total: usize,
    queue: &RelayerQueue,
) -> ProgressReport {
    let (in_queue, _, completed_relaying) = queue.status();

    ProgressReport {
        from_chain: from_chain.to_string(),
        to_chain: to_chain.to_string(),
        current_transfers: current,
        total_transfers: total,
        completed_relaying,
        in_queue,
    }
}

async fn emit_error(
    progress: &mpsc::Sender<ProgressUpdate>,
    from_chain: &str,
    to_chain: &str,
    total: usize,
    err: &Error,
) {
    let aborted = matches!(err.detail(), ErrorDetail::Aborted(_));

    error!(
        from_chain = %from_chain,
        to_chain = %to_chain,
        error = %err,
        "load run failed"
    );

    let _ = progress
        .send(ProgressUpdate::Error(ProgressError {
            from_chain: from_chain.to_string(),
            to_chain: to_chain.to_string(),
            total_transfers: total,
            message: err.to_string(),
            aborted,
        }))
        .await;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use crate::chain::mock::MockChain;

    use super::*;

    fn options(
        from: &Arc<MockChain>,
        to: &Arc<MockChain>,
        wallets: usize,
        packets_per_wallet: usize,
    ) -> LoadOptions {
        let from_wallets = (0..wallets)
            .map(|i| from.generate_test_wallet(&format!("sender-{i}")))
            .collect();
        let to_wallets = (0..wallets)
            .map(|i| to.generate_test_wallet(&format!("recipient-{i}")))
            .collect();

        LoadOptions {
            from_chain: from.clone() as Arc<dyn ChainEndpoint>,
            from_client_id: "client-0".to_string(),
            denom: "uatom".to_string(),
            from_wallets,
            to_chain: to.clone() as Arc<dyn ChainEndpoint>,
            to_wallets,
            to_relayer_wallet: to.generate_test_wallet("relayer"),
            amount: U256::from(100u64),
            packets_per_wallet,
            self_relay: false,
            relayer_addr: "localhost:3000".to_string(),
            cancellation: CancellationToken::new(),
        }
    }

    async fn drain(mut stream: mpsc::Receiver<ProgressUpdate>) -> Vec<ProgressUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = stream.recv().await {
            updates.push(update);
        }
        updates
    }

    #[tokio::test]
    async fn both_directions_complete_independently() {
        let chain_a = Arc::new(MockChain::new("chain-a"));
        let chain_b = Arc::new(MockChain::new("chain-b"));

        let a_to_b = transfer_and_relay(options(&chain_a, &chain_b, 5, 5)).unwrap();
        let b_to_a = transfer_and_relay(options(&chain_b, &chain_a, 5, 5)).unwrap();

        let (a_updates, b_updates) = tokio::join!(drain(a_to_b), drain(b_to_a));

        for updates in [&a_updates, &b_updates] {
            let ProgressUpdate::Done(done) = updates.last().unwrap() else {
                panic!("expected the stream to end with Done, got {updates:?}");
            };

            assert_eq!(done.current_transfers, 25);
            assert_eq!(done.completed_relaying, 25);
            assert_eq!(done.in_queue, 0);

            // per-direction transfer counters are monotonic
            let mut last = 0;
            for update in updates.iter() {
                if let ProgressUpdate::Transfer(report) = update {
                    assert!(report.current_transfers >= last);
                    last = report.current_transfers;
                }
            }
            assert_eq!(last, 25);
        }
    }

    #[tokio::test]
    async fn transfer_failure_surfaces_one_error_after_three_attempts() {
        let chain_a = Arc::new(MockChain::new("chain-a"));
        let chain_b = Arc::new(MockChain::new("chain-b"));
        chain_a.set_fail_transfers(true);

        let updates = drain(
            transfer_and_relay(options(&chain_a, &chain_b, 1, 1)).unwrap(),
        )
        .await;

        assert_eq!(chain_a.transfer_attempts.load(Ordering::SeqCst), 3);

        let errors: Vec<_> = updates
            .iter()
            .filter_map(|u| match u {
                ProgressUpdate::Error(e) => Some(e),
                _ => None,
            })
            .collect();

        assert_eq!(errors.len(), 1);
        assert!(!errors[0].aborted);
        assert_eq!(errors[0].from_chain, "chain-a");
        assert_eq!(errors[0].to_chain, "chain-b");
        assert!(errors[0].message.contains("insufficient funds"));
    }

    #[tokio::test]
    async fn failing_direction_leaves_the_other_unaffected() {
        let chain_a = Arc::new(MockChain::new("chain-a"));
        let chain_b = Arc::new(MockChain::new("chain-b"));
        chain_a.set_fail_transfers(true);

        let a_to_b = transfer_and_relay(options(&chain_a, &chain_b, 2, 2)).unwrap();
        let b_to_a = transfer_and_relay(options(&chain_b, &chain_a, 2, 2)).unwrap();

        let (a_updates, b_updates) = tokio::join!(drain(a_to_b), drain(b_to_a));

        assert!(matches!(a_updates.last(), Some(ProgressUpdate::Error(_))));
        assert!(matches!(b_updates.last(), Some(ProgressUpdate::Done(_))));
    }

    #[tokio::test]
    async fn cancellation_ends_the_stream_with_a_distinguished_error() {
        let chain_a = Arc::new(MockChain::new("chain-a"));
        let chain_b = Arc::new(MockChain::new("chain-b"));

        let opts = options(&chain_a, &chain_b, 1, 3);
        let token = opts.cancellation.clone();
        token.cancel();

        let updates = drain(transfer_and_relay(opts).unwrap()).await;

        let ProgressUpdate::Error(err) = updates.last().unwrap() else {
            panic!("expected the stream to end with Error, got {updates:?}");
        };

        assert!(err.aborted);
    }

    #[tokio::test]
    async fn mismatched_wallet_counts_are_rejected_up_front() {
        let chain_a = Arc::new(MockChain::new("chain-a"));
        let chain_b = Arc::new(MockChain::new("chain-b"));

        let mut opts = options(&chain_a, &chain_b, 2, 1);
        opts.to_wallets.pop();

        assert!(transfer_and_relay(opts).is_err());
    }

    #[tokio::test]
    async fn zero_packets_per_wallet_is_rejected() {
        let chain_a = Arc::new(MockChain::new("chain-a"));
        let chain_b = Arc::new(MockChain::new("chain-b"));

        let opts = options(&chain_a, &chain_b, 1, 0);

        assert!(transfer_and_relay(opts).is_err());
    }
}
