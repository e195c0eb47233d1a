//! Stages of the settlement pipeline and the driver running them.
//!
//! Every stage decides on its own whether its work is already done, based on
//! the settlement record and on current balances. This makes re-running a
//! pipeline that failed halfway safe: completed stages are skipped and the
//! run continues where the previous one stopped.

use {
    super::{AuctionSettlement, Config, Registry, shares},
    crate::{
        domain::{
            eth::TokenAddress,
            swap::{self, Swapper},
        },
        infra::{aggregator, blockchain, observe, tokens::Tokens},
    },
    std::time::Instant,
};

/// Everything a stage needs to do its work.
pub struct Context<'a> {
    pub tokens: &'a Tokens,
    pub swapper: &'a Swapper,
    pub config: &'a Config,
    pub registry: &'a Registry,
    pub record: &'a mut AuctionSettlement,
}

impl Context<'_> {
    /// Publishes the current progress of the record.
    fn checkpoint(&self) {
        self.registry.store(self.record.clone());
    }
}

#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// Checks that the stage can run at all. Preconditions of all stages are
    /// checked before the first stage runs.
    async fn precondition(&self, _ctx: &Context<'_>) -> Result<(), Error> {
        Ok(())
    }

    /// Whether the stage has nothing left to do.
    async fn is_complete(&self, ctx: &Context<'_>) -> Result<bool, Error>;

    async fn execute(&self, ctx: &mut Context<'_>) -> Result<(), Error>;
}

fn failed(stage: &dyn Stage) -> impl Fn(Error) -> super::Error + Copy + '_ {
    move |source| super::Error {
        stage: stage.name().to_owned(),
        source,
    }
}

/// Runs the stages in order, skipping the ones that are complete. Stops at
/// the first failing stage.
pub async fn run(
    pipeline: &str,
    stages: &[Box<dyn Stage>],
    ctx: &mut Context<'_>,
) -> Result<(), super::Error> {
    for stage in stages {
        stage
            .precondition(ctx)
            .await
            .map_err(failed(stage.as_ref()))?;
    }

    let auction = ctx.record.auction;
    for stage in stages {
        let name = stage.name();
        let fail = failed(stage.as_ref());
        if stage.is_complete(ctx).await.map_err(fail)? {
            observe::stage_skipped(auction, name);
            continue;
        }

        let _timer = ::observe::metrics::metrics().on_phase_start(pipeline, name);
        let start = Instant::now();
        observe::stage_started(auction, name);
        match stage.execute(ctx).await {
            Ok(()) => {
                observe::stage_completed(auction, name, start.elapsed());
                ctx.checkpoint();
            }
            Err(err) => {
                observe::stage_failed(auction, name, &err, start.elapsed());
                return Err(fail(err));
            }
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no funds to settle: the operator holds no {0}")]
    NoFunds(TokenAddress),
    #[error("quote unavailable: {0}")]
    QuoteUnavailable(#[from] aggregator::Error),
    #[error("transaction failure: {0}")]
    Transaction(#[from] blockchain::Error),
    #[error("no destination configured for the {0} share")]
    MissingDestination(shares::Bucket),
    #[error(transparent)]
    Overflow(#[from] shares::Overflow),
}

impl From<swap::Error> for Error {
    fn from(err: swap::Error) -> Self {
        match err {
            swap::Error::QuoteUnavailable(err) => Self::QuoteUnavailable(err),
            swap::Error::Transaction(err) => Self::Transaction(err),
        }
    }
}

impl Error {
    /// Stable name of the error kind, used in API responses and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoFunds(_) => "NoFundsToSettle",
            Self::QuoteUnavailable(_) => "QuoteUnavailable",
            Self::Transaction(_) => "TransactionFailure",
            Self::MissingDestination(_) => "ConfigurationError",
            Self::Overflow(_) => "InvalidAmount",
        }
    }

    /// Whether running the pipeline again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QuoteUnavailable(_) | Self::Transaction(_))
    }
}
