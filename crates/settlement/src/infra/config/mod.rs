//! Service configuration, assembled from the TOML file and the secrets passed
//! through the environment.

use {
    crate::{
        domain::{
            eth::{self, Address, ChainId, TokenAddress},
            settlement::{self, Bucket, Destinations},
        },
        infra::{
            aggregator,
            blockchain::{SignerContext, gas},
            cli,
        },
        util::retry,
    },
    std::{collections::HashMap, path::{Path, PathBuf}, time::Duration},
    url::Url,
};

pub mod file;

pub use file::Profile;

const GWEI: u128 = 1_000_000_000;

pub struct Config {
    pub chain_id: ChainId,
    pub profile: Profile,
    pub auction_contract: Address,
    pub settlement: settlement::Config,
    pub gas: gas::Policy,
    pub confirmation_timeout: Duration,
    pub aggregator: aggregator::Config,
    pub quote_ttl: Duration,
    pub lifecycle_retry: retry::Policy,
    pub reconciliation: Reconciliation,
    pub season: Season,
    pub queue_capacity: usize,
    pub accounts: Accounts,
    pub worker_secret: String,
    pub database: Database,
}

pub struct Reconciliation {
    pub url: Url,
    pub timeout: Duration,
}

pub struct Season {
    pub length_days: u32,
    pub reward_token: TokenAddress,
    pub usd_token: TokenAddress,
    pub scheduler: bool,
    pub check_interval: Duration,
}

/// The operator accounts, one per kind of on-chain work. Accounts may share a
/// key.
#[derive(Debug)]
pub struct Accounts {
    pub settlement: SignerContext,
    pub auction: SignerContext,
    pub rewards: SignerContext,
}

pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

/// Secrets that never live in the configuration file.
#[derive(Default)]
pub struct Secrets {
    pub settlement_operator_key: Option<String>,
    pub auction_operator_key: Option<String>,
    pub rewards_operator_key: Option<String>,
    pub aggregator_api_key: Option<String>,
    pub worker_secret: Option<String>,
    pub database_url: Option<String>,
}

impl From<&cli::Args> for Secrets {
    fn from(args: &cli::Args) -> Self {
        Self {
            settlement_operator_key: args.settlement_operator_key.clone(),
            auction_operator_key: args.auction_operator_key.clone(),
            rewards_operator_key: args.rewards_operator_key.clone(),
            aggregator_api_key: args.aggregator_api_key.clone(),
            worker_secret: args.worker_secret.clone(),
            database_url: args.database_url.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("could not read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration file {path:?}: {source}")]
    Syntax {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration of {item}: {reason}")]
    Invalid { item: &'static str, reason: String },
}

/// Loads the configuration file at `path` and completes it with the secrets
/// from the command line arguments.
pub async fn load(args: &cli::Args) -> Result<Config, ConfigurationError> {
    let data = read(&args.config).await?;
    let file = parse(&args.config, &data)?;
    resolve(
        file,
        Secrets::from(args),
        &args.node_url,
        args.database_max_connections,
    )
}

async fn read(path: &Path) -> Result<String, ConfigurationError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigurationError::Io {
            path: path.to_owned(),
            source,
        })
}

fn parse(path: &Path, data: &str) -> Result<file::Config, ConfigurationError> {
    toml::from_str(data).map_err(|source| ConfigurationError::Syntax {
        path: path.to_owned(),
        source,
    })
}

fn resolve(
    file: file::Config,
    secrets: Secrets,
    node_url: &Url,
    max_connections: u32,
) -> Result<Config, ConfigurationError> {
    let fallback = match file.profile {
        Profile::Strict => None,
        Profile::LegacyFallback => Some(
            file.fallback_address
                .ok_or(ConfigurationError::Missing("fallback-address"))?,
        ),
    };

    let settlement_key = secrets
        .settlement_operator_key
        .ok_or(ConfigurationError::Missing("SETTLEMENT_OPERATOR_KEY"))?;
    let account_key = |key: Option<String>, name: &'static str| match (key, file.profile) {
        (Some(key), _) => Ok(key),
        (None, Profile::LegacyFallback) => Ok(settlement_key.clone()),
        (None, Profile::Strict) => Err(ConfigurationError::Missing(name)),
    };
    let accounts = Accounts {
        auction: signer(
            &account_key(secrets.auction_operator_key, "AUCTION_OPERATOR_KEY")?,
            "AUCTION_OPERATOR_KEY",
            node_url,
        )?,
        rewards: signer(
            &account_key(secrets.rewards_operator_key, "REWARDS_OPERATOR_KEY")?,
            "REWARDS_OPERATOR_KEY",
            node_url,
        )?,
        settlement: signer(&settlement_key, "SETTLEMENT_OPERATOR_KEY", node_url)?,
    };

    let chain_id = ChainId(file.chain_id);
    let settlement_currency = TokenAddress(file.contracts.settlement_currency);
    let target_token = TokenAddress(file.contracts.target_token);
    if settlement_currency == target_token {
        return Err(ConfigurationError::Invalid {
            item: "contracts",
            reason: "settlement currency and target token must differ".to_owned(),
        });
    }

    Ok(Config {
        chain_id,
        profile: file.profile,
        auction_contract: file.contracts.auction,
        settlement: settlement::Config {
            settlement_currency,
            target_token,
            scheme: file.settlement.scheme,
            destinations: destinations(&file, fallback)?,
            burn: file.settlement.burn,
        },
        gas: gas::Policy::new(eth::GasPrice(
            u128::from(file.submission.high_water_mark_gwei) * GWEI,
        )),
        confirmation_timeout: file.submission.confirmation_timeout,
        aggregator: aggregator::Config {
            endpoint: file.aggregator.endpoint,
            api_key: secrets
                .aggregator_api_key
                .ok_or(ConfigurationError::Missing("AGGREGATOR_API_KEY"))?,
            chain_id,
            slippage_bps: file.aggregator.slippage_bps,
            timeout: file.aggregator.timeout,
            retry: retry::Policy::fixed(
                attempts(file.aggregator.attempts, "aggregator.attempts")?,
                file.aggregator.backoff,
            ),
        },
        quote_ttl: file.settlement.quote_ttl,
        lifecycle_retry: retry::Policy::exponential(
            attempts(file.lifecycle.attempts, "lifecycle.attempts")?,
            file.lifecycle.backoff,
        ),
        reconciliation: Reconciliation {
            url: file.reconciliation.url,
            timeout: file.reconciliation.timeout,
        },
        season: Season {
            length_days: match file.season.length_days {
                0 => {
                    return Err(ConfigurationError::Invalid {
                        item: "season.length-days",
                        reason: "a season lasts at least one day".to_owned(),
                    });
                }
                days => days,
            },
            reward_token: target_token,
            usd_token: file
                .season
                .usd_token
                .map(TokenAddress)
                .unwrap_or(settlement_currency),
            scheduler: file.season.scheduler,
            check_interval: file.season.check_interval,
        },
        queue_capacity: file.queue_capacity.max(1),
        accounts,
        worker_secret: secrets
            .worker_secret
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigurationError::Missing("WORKER_SECRET"))?,
        database: Database {
            url: secrets
                .database_url
                .ok_or(ConfigurationError::Missing("DATABASE_URL"))?,
            max_connections,
        },
    })
}

fn signer(
    key: &str,
    name: &'static str,
    node_url: &Url,
) -> Result<SignerContext, ConfigurationError> {
    // The signer error is not included, it could contain parts of the key.
    SignerContext::new(key, node_url.clone()).map_err(|_| ConfigurationError::Invalid {
        item: name,
        reason: "not a valid private key".to_owned(),
    })
}

fn attempts(attempts: u32, item: &'static str) -> Result<u32, ConfigurationError> {
    if attempts == 0 {
        return Err(ConfigurationError::Invalid {
            item,
            reason: "at least one attempt is required".to_owned(),
        });
    }
    Ok(attempts)
}

/// Destination wallets of every bucket the scheme transfers to. The buyback
/// share stays with the settlement operator.
fn destinations(
    file: &file::Config,
    fallback: Option<Address>,
) -> Result<Destinations, ConfigurationError> {
    let mut wallets = HashMap::new();
    for bucket in file.settlement.scheme.buckets() {
        let (configured, name) = match bucket {
            Bucket::Buyback => continue,
            Bucket::Treasury => (file.destinations.treasury, "destinations.treasury"),
            Bucket::Dev => (file.destinations.dev, "destinations.dev"),
            Bucket::Staking => (file.destinations.staking, "destinations.staking"),
        };
        let wallet = configured
            .or(fallback)
            .ok_or(ConfigurationError::Missing(name))?;
        wallets.insert(bucket, wallet);
    }
    Ok(Destinations::new(wallets))
}
