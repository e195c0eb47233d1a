//! Queue of auction jobs, executed one at a time by a single worker task.
//!
//! Running jobs sequentially serialises all transactions of the shared
//! operator wallet across auctions. The queue refuses a job for an auction
//! that is already queued or running.

use {
    crate::{
        domain::{
            auction,
            eth::TokenAddress,
            settlement::{self, AuctionSettlement},
        },
        infra::observe,
    },
    dashmap::DashSet,
    std::sync::Arc,
    tokio::sync::{mpsc, oneshot},
};

pub const DEFAULT_CAPACITY: usize = 64;

pub enum Job {
    /// End the auction on-chain, then reconcile and settle it.
    Close {
        auction: auction::Id,
        /// Read from the auction contract when not known.
        proceeds_token: Option<TokenAddress>,
    },
    /// Settle the proceeds of an auction that already ended.
    Settle {
        auction: auction::Id,
        proceeds_token: TokenAddress,
        reply: oneshot::Sender<Result<AuctionSettlement, settlement::Error>>,
    },
}

impl Job {
    pub fn auction(&self) -> auction::Id {
        match self {
            Self::Close { auction, .. } | Self::Settle { auction, .. } => *auction,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Close { .. } => "close",
            Self::Settle { .. } => "settle",
        }
    }
}

#[async_trait::async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, job: Job);
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Rejected {
    #[error("a job for auction {0} is already queued or running")]
    InFlight(auction::Id),
    #[error("the job queue is full")]
    Full,
    #[error("the job queue is shut down")]
    Closed,
}

#[derive(Clone)]
pub struct Queue {
    sender: mpsc::Sender<Job>,
    in_flight: Arc<DashSet<auction::Id>>,
}

impl Queue {
    /// Creates the queue and spawns the worker task consuming it.
    pub fn spawn(capacity: usize, handler: Arc<dyn Handler>) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        let in_flight = Arc::new(DashSet::new());
        tokio::spawn(work(receiver, in_flight.clone(), handler));
        Self { sender, in_flight }
    }

    pub fn enqueue(&self, job: Job) -> Result<(), Rejected> {
        let auction = job.auction();
        let kind = job.kind();
        if !self.in_flight.insert(auction) {
            observe::job_rejected(auction, kind, &Rejected::InFlight(auction));
            return Err(Rejected::InFlight(auction));
        }
        if let Err(err) = self.sender.try_send(job) {
            self.in_flight.remove(&auction);
            let rejected = match err {
                mpsc::error::TrySendError::Full(_) => Rejected::Full,
                mpsc::error::TrySendError::Closed(_) => Rejected::Closed,
            };
            observe::job_rejected(auction, kind, &rejected);
            return Err(rejected);
        }
        observe::job_enqueued(auction, kind);
        Ok(())
    }

    pub fn is_in_flight(&self, auction: auction::Id) -> bool {
        self.in_flight.contains(&auction)
    }
}

async fn work(
    mut receiver: mpsc::Receiver<Job>,
    in_flight: Arc<DashSet<auction::Id>>,
    handler: Arc<dyn Handler>,
) {
    while let Some(job) = receiver.recv().await {
        let auction = job.auction();
        let kind = job.kind();
        let handler = handler.clone();
        // Run in a separate task so that a panicking job doesn't take the
        // worker down with it.
        if let Err(err) = tokio::spawn(async move { handler.handle(job).await }).await {
            observe::job_panicked(auction, kind, &err);
        }
        in_flight.remove(&auction);
    }
}
