//! Storage of the seasonal competition.

use crate::domain::season::{Archive, Payout, Season, Standing};

mod dto;
mod postgres;

pub use postgres::Postgres;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SeasonStore: Send + Sync {
    async fn active_season(&self) -> anyhow::Result<Season>;

    /// Participants with the most seasonal XP, best first.
    async fn leaderboard(&self, limit: usize) -> anyhow::Result<Vec<Standing>>;

    /// The recorded reward payout of a season, if there is one.
    async fn payout(&self, season: u32) -> anyhow::Result<Option<Payout>>;

    /// Records the reward payout of a season, replacing an earlier record.
    async fn record_payout(&self, season: u32, payout: &Payout) -> anyhow::Result<()>;

    /// Archives the final standings of the finished season, resets every
    /// participant's seasonal XP and opens the next season, all in one
    /// transaction.
    async fn rollover(&self, archive: &Archive, next: &Season) -> anyhow::Result<()>;
}
