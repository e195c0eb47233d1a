//! Seasonal competitions. At the end of a season the top of the leaderboard
//! is rewarded in the target token and the seasonal XP starts over.

use {
    crate::domain::eth::Address,
    chrono::{Days, NaiveDate},
};

pub mod rewards;
pub mod rollover;

pub use rollover::Controller;

/// Number of leaderboard entries that get rewarded.
pub const SNAPSHOT_SIZE: usize = 10;
pub const DEFAULT_LENGTH_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Season {
    pub number: u32,
    pub start: NaiveDate,
    /// Last day of the season, inclusive.
    pub end: NaiveDate,
}

impl Season {
    /// The season following this one. It starts the day after this one ends
    /// and lasts `length_days` days.
    pub fn next(&self, length_days: u32) -> Option<Self> {
        let start = self.end.checked_add_days(Days::new(1))?;
        let end = start.checked_add_days(Days::new(u64::from(length_days.saturating_sub(1))))?;
        Some(Self {
            number: self.number.checked_add(1)?,
            start,
            end,
        })
    }

    pub fn has_ended(&self, today: NaiveDate) -> bool {
        today > self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub wallet: Address,
    pub season_xp: u64,
}

/// The top of the leaderboard at the moment the season ended. Taken before
/// any counter is reset and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    standings: Vec<Standing>,
}

impl Snapshot {
    pub fn new(mut standings: Vec<Standing>) -> Self {
        // Stable, so ties keep the order the leaderboard has them in.
        standings.sort_by(|a, b| b.season_xp.cmp(&a.season_xp));
        standings.truncate(SNAPSHOT_SIZE);
        Self { standings }
    }

    /// Standings with their 1-based rank.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &Standing)> {
        self.standings
            .iter()
            .enumerate()
            .map(|(index, standing)| (index + 1, standing))
    }

    pub fn len(&self) -> usize {
        self.standings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standings.is_empty()
    }

    pub fn standings(&self) -> &[Standing] {
        &self.standings
    }
}

/// The reward payout of a season. It is on record before the first reward is
/// sent, so a rollover that has to be retried never pays a season twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub snapshot: Snapshot,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Rewards are being sent. Found by a later rollover attempt this means
    /// the attempt that sent them was interrupted and an unknown part of the
    /// rewards went out.
    Started,
    Finished(rewards::Report),
    /// The distribution failed before any reward was sent.
    Failed(String),
}

impl Payout {
    pub fn started(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            outcome: Outcome::Started,
        }
    }

    pub fn report(&self) -> Option<&rewards::Report> {
        match &self.outcome {
            Outcome::Finished(report) => Some(report),
            Outcome::Started | Outcome::Failed(_) => None,
        }
    }
}

/// Final standings of a season as they get archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub season: Season,
    pub standings: Vec<ArchivedStanding>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedStanding {
    pub rank: usize,
    pub standing: Standing,
    /// Missing when the distribution failed as a whole.
    pub reward: Option<rewards::Allocation>,
}

impl Archive {
    pub fn new(season: Season, snapshot: &Snapshot, report: Option<&rewards::Report>) -> Self {
        let standings = snapshot
            .ranked()
            .map(|(rank, standing)| ArchivedStanding {
                rank,
                standing: *standing,
                reward: report.and_then(|report| {
                    report
                        .allocations
                        .iter()
                        .find(|allocation| allocation.rank == rank)
                        .cloned()
                }),
            })
            .collect();
        Self { season, standings }
    }
}
