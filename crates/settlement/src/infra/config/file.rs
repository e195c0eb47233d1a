//! The layout of the TOML configuration file.

use {
    crate::{
        domain::{
            eth::Address,
            settlement::RatioScheme,
        },
        infra::tokens::BurnMethod,
    },
    serde::Deserialize,
    std::time::Duration,
    url::Url,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// The chain the service operates on. The service refuses to start if the
    /// node reports a different chain.
    pub chain_id: u64,

    /// How missing operator keys and destination wallets are treated.
    #[serde(default)]
    pub profile: Profile,

    /// Receives every share that has no configured destination under the
    /// `legacy-fallback` profile.
    pub fallback_address: Option<Address>,

    pub contracts: Contracts,

    pub settlement: Settlement,

    #[serde(default)]
    pub destinations: Destinations,

    #[serde(default)]
    pub submission: Submission,

    #[serde(default)]
    pub aggregator: Aggregator,

    #[serde(default)]
    pub lifecycle: Lifecycle,

    pub reconciliation: Reconciliation,

    pub season: Season,

    /// Maximum number of auction jobs waiting to be executed.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Every operator key and destination wallet has to be configured.
    #[default]
    Strict,
    /// Operator keys default to the settlement operator key and missing
    /// destinations default to `fallback-address`.
    LegacyFallback,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Contracts {
    pub auction: Address,
    /// The stable token all proceeds are converted into.
    pub settlement_currency: Address,
    /// The token that gets bought back and burned, and that seasonal rewards
    /// are paid in.
    pub target_token: Address,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settlement {
    pub scheme: RatioScheme,

    #[serde(default = "default_burn")]
    pub burn: BurnMethod,

    /// Firm quotes older than this are fetched again before execution.
    #[serde(with = "humantime_serde", default = "default_quote_ttl")]
    pub quote_ttl: Duration,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Destinations {
    pub treasury: Option<Address>,
    pub dev: Option<Address>,
    pub staking: Option<Address>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Submission {
    /// Network gas price in gwei above which the smaller markup applies.
    #[serde(default = "default_high_water_mark_gwei")]
    pub high_water_mark_gwei: u64,

    /// How long to wait for a transaction to be confirmed.
    #[serde(with = "humantime_serde", default = "default_confirmation_timeout")]
    pub confirmation_timeout: Duration,
}

impl Default for Submission {
    fn default() -> Self {
        Self {
            high_water_mark_gwei: default_high_water_mark_gwei(),
            confirmation_timeout: default_confirmation_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Aggregator {
    #[serde(default = "default_aggregator_endpoint")]
    pub endpoint: Url,

    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,

    #[serde(with = "humantime_serde", default = "default_aggregator_timeout")]
    pub timeout: Duration,

    #[serde(default = "default_aggregator_attempts")]
    pub attempts: u32,

    #[serde(with = "humantime_serde", default = "default_aggregator_backoff")]
    pub backoff: Duration,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            endpoint: default_aggregator_endpoint(),
            slippage_bps: default_slippage_bps(),
            timeout: default_aggregator_timeout(),
            attempts: default_aggregator_attempts(),
            backoff: default_aggregator_backoff(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Lifecycle {
    /// Attempts at reconciling and settling a closed auction.
    #[serde(default = "default_lifecycle_attempts")]
    pub attempts: u32,

    /// Delay before the first retry, doubled after every further failure.
    #[serde(with = "humantime_serde", default = "default_lifecycle_backoff")]
    pub backoff: Duration,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            attempts: default_lifecycle_attempts(),
            backoff: default_lifecycle_backoff(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Reconciliation {
    /// Internal endpoint of the web application receiving the final bidders.
    pub url: Url,

    #[serde(with = "humantime_serde", default = "default_reconciliation_timeout")]
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Season {
    #[serde(default = "default_season_length_days")]
    pub length_days: u32,

    /// Token the USD reward values are priced against. Defaults to the
    /// settlement currency.
    pub usd_token: Option<Address>,

    /// Whether the service rolls seasons over on its own.
    #[serde(default = "default_true")]
    pub scheduler: bool,

    /// How often the scheduler checks whether the active season has ended.
    #[serde(with = "humantime_serde", default = "default_check_interval")]
    pub check_interval: Duration,
}

fn default_queue_capacity() -> usize {
    crate::infra::queue::DEFAULT_CAPACITY
}

fn default_burn() -> BurnMethod {
    BurnMethod::Burn
}

fn default_quote_ttl() -> Duration {
    crate::domain::swap::DEFAULT_QUOTE_TTL
}

fn default_high_water_mark_gwei() -> u64 {
    20
}

fn default_confirmation_timeout() -> Duration {
    crate::infra::blockchain::DEFAULT_CONFIRMATION_TIMEOUT
}

fn default_aggregator_endpoint() -> Url {
    crate::infra::aggregator::DEFAULT_URL
        .parse()
        .expect("default aggregator url is valid")
}

fn default_slippage_bps() -> u32 {
    crate::infra::aggregator::DEFAULT_SLIPPAGE_BPS
}

fn default_aggregator_timeout() -> Duration {
    crate::infra::aggregator::DEFAULT_TIMEOUT
}

fn default_aggregator_attempts() -> u32 {
    crate::infra::aggregator::DEFAULT_ATTEMPTS
}

fn default_aggregator_backoff() -> Duration {
    crate::infra::aggregator::DEFAULT_BACKOFF
}

fn default_lifecycle_attempts() -> u32 {
    crate::domain::lifecycle::DEFAULT_ATTEMPTS
}

fn default_lifecycle_backoff() -> Duration {
    crate::domain::lifecycle::DEFAULT_BACKOFF
}

fn default_reconciliation_timeout() -> Duration {
    std::time::Duration::from_secs(30)
}

fn default_season_length_days() -> u32 {
    crate::domain::season::DEFAULT_LENGTH_DAYS
}

fn default_true() -> bool {
    true
}

fn default_check_interval() -> Duration {
    crate::domain::season::rollover::DEFAULT_CHECK_INTERVAL
}
