//! Observability of the settlement service. Every function represents an
//! event that is meaningful to the system. They log the event and update the
//! metrics, if the event is worth measuring.

use {
    crate::{
        domain::{
            auction,
            eth::{self, Address, GasPrice, TokenAddress, TxHash, U256},
            lifecycle,
            season::{self, Season, rewards},
            settlement::{self, AuctionSettlement, stage},
            swap,
        },
        infra::{aggregator, blockchain, queue},
    },
    std::{net::SocketAddr, time::Duration},
};

pub mod metrics;

/// Setup the observability. The log argument configures the tokio tracing
/// framework.
pub fn init(log: &str, use_json: bool) {
    ::observe::tracing::initialize(&::observe::Config::new(log, None, use_json));
    metrics::init();
}

/// Observe the configuration the service starts with.
pub fn starting(args: &impl std::fmt::Display) {
    tracing::info!("running settlement service with validated arguments:\n{args}");
}

/// Observe that the API server is listening.
pub fn listening(addr: SocketAddr) {
    tracing::info!(%addr, "serving settlement API");
}

/// Observe that the service is shutting down.
pub fn shutting_down() {
    tracing::info!("shutting down");
}

/// Observe a request rejected because of missing or invalid credentials.
pub fn unauthorized(path: &str) {
    tracing::warn!(%path, "rejected unauthorized request");
}

/// Observe a transaction submitted to the node.
pub fn transaction_sent(
    kind: eth::OperationKind,
    operator: Address,
    hash: TxHash,
    gas_price: GasPrice,
    gas_limit: eth::Gas,
) {
    tracing::debug!(
        %kind,
        %operator,
        ?hash,
        gas_price = gas_price.0,
        gas_limit = gas_limit.0,
        "sent transaction"
    );
}

/// Observe the outcome of a transaction.
pub fn transaction(
    kind: eth::OperationKind,
    operator: Address,
    result: &Result<eth::Receipt, blockchain::Error>,
) {
    match result {
        Ok(receipt) => tracing::info!(
            %kind,
            %operator,
            hash = ?receipt.hash,
            gas_used = receipt.gas_used.0,
            "transaction confirmed"
        ),
        Err(err) => tracing::warn!(%kind, %operator, ?err, "transaction failed"),
    }
    metrics::get()
        .transactions
        .with_label_values(&[kind.to_string().as_str(), metrics::result(result)])
        .inc();
}

/// Observe that a firm quote got too old to be executed and is fetched again.
pub fn stale_quote(order: &swap::Order, age: Duration) {
    tracing::debug!(?order, ?age, "refetching stale quote");
}

/// Observe an executed swap.
pub fn swapped(order: &swap::Order, buy_amount: U256, receipt: &eth::Receipt) {
    tracing::info!(
        sell = %order.sell,
        buy = %order.buy,
        sell_amount = %order.amount,
        %buy_amount,
        hash = ?receipt.hash,
        "swapped"
    );
}

/// Observe that the aggregator could not provide a quote after all retries.
pub fn quote_unavailable(
    endpoint: &'static str,
    order: &swap::Order,
    attempts: u32,
    err: &aggregator::Error,
) {
    tracing::error!(endpoint, ?order, attempts, ?err, "quote unavailable");
    metrics::get()
        .quote_failures
        .with_label_values(&[endpoint])
        .inc();
}

/// Observe that a settlement run starts.
pub fn settling(record: &AuctionSettlement) {
    tracing::info!(
        auction = %record.auction,
        proceeds_token = %record.proceeds_token,
        status = ?record.status,
        "settling auction proceeds"
    );
}

/// Observe the outcome of a settlement run.
pub fn settled(
    record: &AuctionSettlement,
    err: Option<&settlement::Error>,
    elapsed: Duration,
) {
    match err {
        None => tracing::info!(
            auction = %record.auction,
            total_proceeds = %record.total_proceeds,
            burn_amount = %record.burn_amount,
            status = ?record.status,
            ?elapsed,
            "settlement finished"
        ),
        Some(err) => tracing::warn!(
            auction = %record.auction,
            kind = err.kind(),
            ?err,
            ?elapsed,
            "settlement failed"
        ),
    }
    let result = match err {
        None => "success",
        Some(err) => err.kind(),
    };
    metrics::get()
        .settlements
        .with_label_values(&[result])
        .inc();
}

/// Observe a stage that had nothing left to do.
pub fn stage_skipped(auction: auction::Id, stage: &str) {
    tracing::debug!(%auction, stage, "stage already complete");
    metrics::get()
        .stages
        .with_label_values(&[stage, "skipped"])
        .inc();
}

pub fn stage_started(auction: auction::Id, stage: &str) {
    tracing::debug!(%auction, stage, "stage started");
}

pub fn stage_completed(auction: auction::Id, stage: &str, elapsed: Duration) {
    tracing::info!(%auction, stage, ?elapsed, "stage completed");
    metrics::get()
        .stages
        .with_label_values(&[stage, "success"])
        .inc();
}

pub fn stage_failed(auction: auction::Id, stage: &str, err: &stage::Error, elapsed: Duration) {
    tracing::warn!(%auction, stage, ?err, ?elapsed, "stage failed");
    metrics::get()
        .stages
        .with_label_values(&[stage, "failure"])
        .inc();
}

/// Observe that an auction was ended on-chain.
pub fn auction_ended(auction: auction::Id, receipt: &eth::Receipt) {
    tracing::info!(%auction, hash = ?receipt.hash, "auction ended");
}

/// Observe that ending an auction failed because it had already been ended.
pub fn auction_already_ended(auction: auction::Id, err: &blockchain::Error) {
    tracing::info!(%auction, ?err, "auction was already ended");
}

/// Observe the outcome of the bidder reconciliation.
pub fn reconciled(auction: auction::Id, result: &Result<Vec<auction::Bidder>, lifecycle::Error>) {
    match result {
        Ok(bidders) => tracing::info!(%auction, bidders = bidders.len(), "bidders reconciled"),
        Err(err) => tracing::error!(%auction, ?err, "bidder reconciliation failed"),
    }
    metrics::get()
        .reconciliations
        .with_label_values(&[metrics::result(result)])
        .inc();
}

/// Observe the outcome of closing an auction.
pub fn closed(auction: auction::Id, result: &Result<lifecycle::Closed, lifecycle::Error>) {
    match result {
        Ok(closed) => tracing::info!(
            %auction,
            end_tx = ?closed.end_tx,
            reconciled = closed.reconciliation.is_ok(),
            settled = closed.settlement.is_ok(),
            "auction closed"
        ),
        Err(err) => tracing::error!(%auction, ?err, "failed to close auction"),
    }
}

/// Observe a seasonal reward that could not be paid.
pub fn reward_failed(rank: usize, wallet: Address, err: &rewards::RewardError) {
    tracing::warn!(rank, %wallet, ?err, "seasonal reward failed");
    metrics::get()
        .reward_transfers
        .with_label_values(&["failure"])
        .inc();
}

pub fn reward_paid(rank: usize, wallet: Address, amount: U256, receipt: &eth::Receipt) {
    tracing::info!(rank, %wallet, %amount, hash = ?receipt.hash, "seasonal reward paid");
    metrics::get()
        .reward_transfers
        .with_label_values(&["success"])
        .inc();
}

pub fn rewards_distributed(report: &rewards::Report) {
    tracing::info!(
        successes = report.successes,
        failures = report.failures.len(),
        total_distributed = %report.total_distributed,
        total_distributed_usd = report.total_distributed_usd,
        "seasonal rewards distributed"
    );
}

/// Observe that no reward at all could be distributed.
pub fn distribution_failed(season: u32, err: &rewards::Error) {
    tracing::error!(season, ?err, "seasonal reward distribution failed");
}

/// Observe that a season's rewards are not distributed because an earlier
/// rollover attempt already did.
pub fn payout_recorded(season: u32, payout: &season::Payout) {
    match &payout.outcome {
        season::Outcome::Started => tracing::error!(
            season,
            "reward distribution of an earlier attempt was interrupted, not paying again"
        ),
        _ => tracing::info!(
            season,
            rewarded = payout.report().map(|report| report.successes),
            "rewards already distributed"
        ),
    }
}

pub fn payout_not_recorded(season: u32, err: &anyhow::Error) {
    tracing::error!(season, ?err, "failed to record reward payout");
}

pub fn season_rolled_over(finished: &Season, next: &Season, report: Option<&rewards::Report>) {
    tracing::info!(
        finished = finished.number,
        next = next.number,
        next_start = %next.start,
        next_end = %next.end,
        rewarded = report.map(|report| report.successes),
        "season rolled over"
    );
    metrics::get()
        .season_rollovers
        .with_label_values(&[if report.is_some_and(|report| !report.is_partial()) {
            "success"
        } else {
            "partial"
        }])
        .inc();
}

pub fn rollover_failed(err: &season::rollover::Error) {
    tracing::error!(?err, "season rollover failed");
    metrics::get()
        .season_rollovers
        .with_label_values(&["failure"])
        .inc();
}

pub fn job_enqueued(auction: auction::Id, kind: &'static str) {
    tracing::debug!(%auction, kind, "job enqueued");
    metrics::get()
        .jobs
        .with_label_values(&[kind, "enqueued"])
        .inc();
}

pub fn job_rejected(auction: auction::Id, kind: &'static str, reason: &queue::Rejected) {
    tracing::warn!(%auction, kind, %reason, "job rejected");
    metrics::get()
        .jobs
        .with_label_values(&[kind, "rejected"])
        .inc();
}

pub fn job_panicked(auction: auction::Id, kind: &'static str, err: &tokio::task::JoinError) {
    tracing::error!(%auction, kind, ?err, "job panicked");
    metrics::get()
        .jobs
        .with_label_values(&[kind, "panicked"])
        .inc();
}

/// Observe a token whose decimals were read from the chain.
pub fn token_decimals(token: TokenAddress, decimals: u8) {
    tracing::trace!(%token, decimals, "fetched token decimals");
}
