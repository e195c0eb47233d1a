//! Settlement of an ended auction: the proceeds get swapped into the
//! settlement currency, split between the stakeholders, and the buyback share
//! is used to buy and burn the target token.

use {
    crate::{
        domain::{
            auction,
            eth::{Address, TokenAddress, TxHash, U256},
            swap::Swapper,
        },
        infra::{observe, tokens::{BurnMethod, Tokens}},
    },
    dashmap::DashMap,
    std::{
        collections::{BTreeMap, HashMap},
        sync::Arc,
        time::Duration,
    },
    tokio::time::Instant,
};

pub mod shares;
pub mod stage;
mod stages;

pub use shares::{Bucket, Distribution, RatioScheme};

const PIPELINE: &str = "settlement";

#[derive(Debug, Clone)]
pub struct Config {
    /// The stable token all proceeds are converted into.
    pub settlement_currency: TokenAddress,
    /// The token bought back and burned.
    pub target_token: TokenAddress,
    pub scheme: RatioScheme,
    pub destinations: Destinations,
    pub burn: BurnMethod,
}

/// Wallets receiving the transferred shares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Destinations(HashMap<Bucket, Address>);

impl Destinations {
    pub fn new(wallets: HashMap<Bucket, Address>) -> Self {
        Self(wallets)
    }

    pub fn get(&self, bucket: Bucket) -> Option<Address> {
        self.0.get(&bucket).copied()
    }
}

/// The settlement of one auction as it progresses through the stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionSettlement {
    pub auction: auction::Id,
    pub proceeds_token: TokenAddress,
    /// Settlement currency balance that was split, in atoms.
    pub total_proceeds: U256,
    pub swap_tx: Option<TxHash>,
    pub distribution: Option<Distribution>,
    pub transfers: BTreeMap<Bucket, TxHash>,
    pub buyback_tx: Option<TxHash>,
    pub burn_tx: Option<TxHash>,
    pub burn_amount: U256,
    pub status: Status,
}

impl AuctionSettlement {
    pub fn new(auction: auction::Id, proceeds_token: TokenAddress) -> Self {
        Self {
            auction,
            proceeds_token,
            total_proceeds: U256::ZERO,
            swap_tx: None,
            distribution: None,
            transfers: Default::default(),
            buyback_tx: None,
            burn_tx: None,
            burn_amount: U256::ZERO,
            status: Status::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Pending,
    Swapped,
    Split,
    Distributed,
    BoughtBack,
    Completed,
    NoFunds,
    Failed { stage: String, reason: String },
}

impl Status {
    /// Terminal states a new settlement starts over from.
    fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::NoFunds)
    }
}

/// How long the record of a finished settlement stays available.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Settlement records of this process, keyed by auction. Records of finished
/// settlements are dropped once they are older than the retention period,
/// unfinished ones are kept so a retry can resume them.
#[derive(Debug, Clone)]
pub struct Registry {
    records: Arc<DashMap<auction::Id, Entry>>,
    retention: Duration,
}

#[derive(Debug, Clone)]
struct Entry {
    record: AuctionSettlement,
    updated: Instant,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl Registry {
    pub fn new(retention: Duration) -> Self {
        Self {
            records: Default::default(),
            retention,
        }
    }

    pub fn get(&self, auction: auction::Id) -> Option<AuctionSettlement> {
        self.records.get(&auction).map(|entry| entry.record.clone())
    }

    fn store(&self, record: AuctionSettlement) {
        self.prune();
        self.records.insert(
            record.auction,
            Entry {
                record,
                updated: Instant::now(),
            },
        );
    }

    fn prune(&self) {
        self.records.retain(|_, entry| {
            !entry.record.status.is_final() || entry.updated.elapsed() < self.retention
        });
    }

    /// The record to continue from: the unfinished record of an earlier run
    /// for the same proceeds, or a fresh one.
    fn resume(&self, auction: auction::Id, proceeds_token: TokenAddress) -> AuctionSettlement {
        match self.get(auction) {
            Some(record) if record.proceeds_token == proceeds_token && !record.status.is_final() => {
                record
            }
            _ => AuctionSettlement::new(auction, proceeds_token),
        }
    }
}

pub struct Orchestrator {
    tokens: Arc<Tokens>,
    swapper: Swapper,
    config: Config,
    registry: Registry,
    stages: Vec<Box<dyn stage::Stage>>,
}

impl Orchestrator {
    pub fn new(tokens: Arc<Tokens>, swapper: Swapper, config: Config, registry: Registry) -> Self {
        let mut stages: Vec<Box<dyn stage::Stage>> =
            vec![Box::new(stages::SwapProceeds), Box::new(stages::Split)];
        stages.extend(
            config
                .scheme
                .buckets()
                .into_iter()
                .filter(|bucket| *bucket != Bucket::Buyback)
                .map(|bucket| Box::new(stages::Transfer::new(bucket)) as Box<dyn stage::Stage>),
        );
        stages.push(Box::new(stages::Buyback));
        stages.push(Box::new(stages::Burn));

        Self {
            tokens,
            swapper,
            config,
            registry,
            stages,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Settles the proceeds of an ended auction. Safe to call again after a
    /// failure: work that already happened is not repeated.
    pub async fn settle(
        &self,
        auction: auction::Id,
        proceeds_token: TokenAddress,
    ) -> Result<AuctionSettlement, Error> {
        let start = Instant::now();
        let mut record = self.registry.resume(auction, proceeds_token);
        observe::settling(&record);

        let result = {
            let mut ctx = stage::Context {
                tokens: &self.tokens,
                swapper: &self.swapper,
                config: &self.config,
                registry: &self.registry,
                record: &mut record,
            };
            stage::run(PIPELINE, &self.stages, &mut ctx).await
        };

        record.status = match &result {
            Ok(()) => Status::Completed,
            Err(err) if matches!(err.source, stage::Error::NoFunds(_)) => Status::NoFunds,
            Err(err) => Status::Failed {
                stage: err.stage.clone(),
                reason: err.source.to_string(),
            },
        };
        self.registry.store(record.clone());
        observe::settled(&record, result.as_ref().err(), start.elapsed());
        result.map(|()| record)
    }
}

/// A stage of the pipeline failed. Stages before it stay done.
#[derive(Debug, thiserror::Error)]
#[error("settlement stage {stage} failed: {source}")]
pub struct Error {
    pub stage: String,
    #[source]
    pub source: stage::Error,
}

impl Error {
    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }

    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}
