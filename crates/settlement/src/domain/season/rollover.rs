//! Ends a season: rewards the top of the leaderboard, archives the final
//! standings, resets seasonal XP and opens the next season.

use {
    super::{Archive, Outcome, Payout, SNAPSHOT_SIZE, Season, Snapshot, rewards},
    crate::infra::{observe, persistence::SeasonStore},
    chrono::NaiveDate,
    std::{sync::Arc, time::Duration},
    tokio::time::MissedTickBehavior,
};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct Controller {
    store: Arc<dyn SeasonStore>,
    distributor: rewards::Distributor,
    length_days: u32,
    /// Rollovers never overlap.
    running: tokio::sync::Mutex<()>,
}

/// A completed rollover.
#[derive(Debug)]
pub struct Rollover {
    pub finished: Season,
    pub next: Season,
    pub snapshot: Snapshot,
    /// `None` if the distribution failed as a whole.
    pub report: Option<rewards::Report>,
    pub distribution_error: Option<String>,
}

impl Controller {
    pub fn new(
        store: Arc<dyn SeasonStore>,
        distributor: rewards::Distributor,
        length_days: u32,
    ) -> Self {
        Self {
            store,
            distributor,
            length_days,
            running: Default::default(),
        }
    }

    /// Rolls the active season over, whether it has ended or not.
    pub async fn rollover(&self) -> Result<Rollover, Error> {
        let _running = self.running.lock().await;
        let season = self.store.active_season().await.map_err(Error::Store)?;
        self.roll(season).await
    }

    /// Rolls the active season over if it ended before `today`.
    pub async fn rollover_if_due(&self, today: NaiveDate) -> Result<Option<Rollover>, Error> {
        let _running = self.running.lock().await;
        let season = self.store.active_season().await.map_err(Error::Store)?;
        if !season.has_ended(today) {
            return Ok(None);
        }
        self.roll(season).await.map(Some)
    }

    async fn roll(&self, season: Season) -> Result<Rollover, Error> {
        let next = season
            .next(self.length_days)
            .ok_or(Error::Calendar(season.number))?;

        let payout = match self
            .store
            .payout(season.number)
            .await
            .map_err(Error::Store)?
        {
            // Nothing was sent, so the recorded snapshot can be paid now.
            Some(Payout {
                snapshot,
                outcome: Outcome::Failed(_),
            }) => self.pay(season.number, snapshot).await?,
            Some(payout) => {
                observe::payout_recorded(season.number, &payout);
                payout
            }
            None => {
                let snapshot = Snapshot::new(
                    self.store
                        .leaderboard(SNAPSHOT_SIZE)
                        .await
                        .map_err(Error::Store)?,
                );
                self.pay(season.number, snapshot).await?
            }
        };

        let report = payout.report().cloned();
        let distribution_error = match &payout.outcome {
            Outcome::Started => Some(INTERRUPTED.to_owned()),
            Outcome::Finished(_) => None,
            Outcome::Failed(err) => Some(err.clone()),
        };
        let archive = Archive::new(season, &payout.snapshot, report.as_ref());
        self.store
            .rollover(&archive, &next)
            .await
            .map_err(Error::Store)?;
        observe::season_rolled_over(&season, &next, report.as_ref());

        Ok(Rollover {
            finished: season,
            next,
            snapshot: payout.snapshot,
            report,
            distribution_error,
        })
    }

    /// Distributes the rewards of the snapshot. The season ends no matter
    /// how the distribution went, so only a failure to record the payout
    /// before sending anything is an error.
    async fn pay(&self, season: u32, snapshot: Snapshot) -> Result<Payout, Error> {
        let mut payout = Payout::started(snapshot);
        self.store
            .record_payout(season, &payout)
            .await
            .map_err(Error::Store)?;

        payout.outcome = match self.distributor.distribute(&payout.snapshot).await {
            Ok(report) => Outcome::Finished(report),
            Err(err) => {
                observe::distribution_failed(season, &err);
                Outcome::Failed(err.to_string())
            }
        };
        // A payout stuck in the started state is never paid again, so losing
        // the outcome only loses the report.
        if let Err(err) = self.store.record_payout(season, &payout).await {
            observe::payout_not_recorded(season, &err);
        }
        Ok(payout)
    }
}

const INTERRUPTED: &str =
    "an earlier reward distribution was interrupted, rewards were not sent again";

/// Periodically checks whether the active season has ended and rolls it over
/// if so.
pub async fn schedule(controller: Arc<Controller>, interval: Duration) {
    let mut ticks = tokio::time::interval(interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        if let Err(err) = controller
            .rollover_if_due(chrono::Utc::now().date_naive())
            .await
        {
            observe::rollover_failed(&err);
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("season store error: {0:#}")]
    Store(anyhow::Error),
    #[error("season {0} has no representable successor")]
    Calendar(u32),
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            domain::{
                eth::{self, Address, Gas, OperationKind, TokenAddress},
                season::Standing,
            },
            infra::{
                blockchain::{self, MockChain},
                persistence::MockSeasonStore,
                prices::MockPriceEstimating,
                tokens::Tokens,
            },
        },
        alloy::primitives::B256,
        bigdecimal::BigDecimal,
        std::sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    fn season() -> Season {
        Season {
            number: 1,
            start: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 5, 30).unwrap(),
        }
    }

    fn winners() -> Vec<Standing> {
        vec![
            Standing {
                wallet: Address::repeat_byte(1),
                season_xp: 900,
            },
            Standing {
                wallet: Address::repeat_byte(2),
                season_xp: 800,
            },
        ]
    }

    fn broken_distributor() -> rewards::Distributor {
        let mut chain = MockChain::new();
        chain
            .expect_decimals()
            .returning(|_| Err(blockchain::Error::Reverted(B256::ZERO)));
        chain.expect_send().never();
        rewards::Distributor::new(
            Arc::new(Tokens::new(Arc::new(chain))),
            Arc::new(MockPriceEstimating::new()),
            TokenAddress(Address::repeat_byte(0x22)),
        )
    }

    /// A distributor paying every reward, counting the transfers it sends.
    fn distributor(transfers: Arc<AtomicUsize>) -> rewards::Distributor {
        let mut chain = MockChain::new();
        chain.expect_decimals().returning(|_| Ok(18));
        chain.expect_send().returning(move |tx| {
            assert_eq!(tx.kind, OperationKind::Transfer);
            let sent = transfers.fetch_add(1, Ordering::SeqCst);
            Ok(eth::Receipt {
                hash: B256::with_last_byte(u8::try_from(sent).unwrap()),
                gas_used: Gas(50_000),
            })
        });
        let mut prices = MockPriceEstimating::new();
        prices
            .expect_usd_price()
            .returning(|_| Ok(BigDecimal::from(2)));
        rewards::Distributor::new(
            Arc::new(Tokens::new(Arc::new(chain))),
            Arc::new(prices),
            TokenAddress(Address::repeat_byte(0x22)),
        )
    }

    /// Keeps the recorded payout in memory like the database would.
    fn record_payouts(store: &mut MockSeasonStore) -> Arc<Mutex<Option<Payout>>> {
        let recorded = Arc::new(Mutex::new(None));
        let reads = recorded.clone();
        store
            .expect_payout()
            .returning(move |_| Ok(reads.lock().unwrap().clone()));
        let writes = recorded.clone();
        store
            .expect_record_payout()
            .withf(|season, _| *season == 1)
            .returning(move |_, payout| {
                *writes.lock().unwrap() = Some(payout.clone());
                Ok(())
            });
        recorded
    }

    #[tokio::test]
    async fn archives_and_resets_even_if_distribution_fails() {
        let mut store = MockSeasonStore::new();
        store.expect_active_season().returning(|| Ok(season()));
        store
            .expect_leaderboard()
            .withf(|limit| *limit == 10)
            .returning(|_| Ok(winners()));
        let recorded = record_payouts(&mut store);
        store
            .expect_rollover()
            .withf(|archive, next| {
                archive.season == season()
                    && archive.standings.len() == 2
                    && archive.standings[0].rank == 1
                    && archive.standings.iter().all(|s| s.reward.is_none())
                    && next.number == 2
                    && next.start == NaiveDate::from_ymd_opt(2025, 5, 31).unwrap()
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let controller = Controller::new(Arc::new(store), broken_distributor(), 30);
        let rollover = controller.rollover().await.unwrap();

        assert!(rollover.report.is_none());
        assert!(rollover.distribution_error.is_some());
        assert_eq!(rollover.next.end, NaiveDate::from_ymd_opt(2025, 6, 29).unwrap());
        assert!(matches!(
            recorded.lock().unwrap().as_ref().unwrap().outcome,
            Outcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn waits_for_the_season_to_end() {
        let mut store = MockSeasonStore::new();
        store.expect_active_season().returning(|| Ok(season()));
        store.expect_payout().never();
        store.expect_leaderboard().never();
        store.expect_rollover().never();

        let controller = Controller::new(Arc::new(store), broken_distributor(), 30);
        let rollover = controller
            .rollover_if_due(NaiveDate::from_ymd_opt(2025, 5, 30).unwrap())
            .await
            .unwrap();
        assert!(rollover.is_none());
    }

    #[tokio::test]
    async fn store_failures_abort_the_rollover() {
        let mut store = MockSeasonStore::new();
        store.expect_active_season().returning(|| Ok(season()));
        store.expect_leaderboard().returning(|_| Ok(vec![]));
        record_payouts(&mut store);
        store
            .expect_rollover()
            .returning(|_, _| Err(anyhow::anyhow!("connection reset")));

        let controller = Controller::new(Arc::new(store), broken_distributor(), 30);
        let err = controller.rollover().await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[tokio::test]
    async fn retried_rollover_does_not_pay_again() {
        let mut store = MockSeasonStore::new();
        store.expect_active_season().returning(|| Ok(season()));
        // The snapshot is taken once and reused by the retry.
        store
            .expect_leaderboard()
            .times(1)
            .returning(|_| Ok(winners()));
        record_payouts(&mut store);
        let commits = Arc::new(AtomicUsize::new(0));
        let attempts = commits.clone();
        store
            .expect_rollover()
            .times(2)
            .returning(move |archive, _| {
                assert!(archive.standings.iter().all(|s| s.reward.is_some()));
                match attempts.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(anyhow::anyhow!("db down")),
                    _ => Ok(()),
                }
            });

        let transfers = Arc::new(AtomicUsize::new(0));
        let controller = Controller::new(Arc::new(store), distributor(transfers.clone()), 30);
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        let err = controller.rollover_if_due(today).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert_eq!(transfers.load(Ordering::SeqCst), 2);

        let rollover = controller.rollover_if_due(today).await.unwrap().unwrap();
        assert_eq!(transfers.load(Ordering::SeqCst), 2);
        assert_eq!(rollover.snapshot.len(), 2);
        let report = rollover.report.unwrap();
        assert_eq!(report.successes, 2);
        assert_eq!(report.total_distributed_usd, 850);
        assert!(rollover.distribution_error.is_none());
    }

    #[tokio::test]
    async fn interrupted_payout_is_not_repeated() {
        let mut store = MockSeasonStore::new();
        store.expect_active_season().returning(|| Ok(season()));
        store.expect_payout().returning(|_| {
            Ok(Some(Payout::started(Snapshot::new(winners()))))
        });
        store.expect_record_payout().never();
        store.expect_leaderboard().never();
        store
            .expect_rollover()
            .withf(|archive, _| {
                archive.standings.len() == 2 && archive.standings.iter().all(|s| s.reward.is_none())
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let transfers = Arc::new(AtomicUsize::new(0));
        let controller = Controller::new(Arc::new(store), distributor(transfers.clone()), 30);
        let rollover = controller.rollover().await.unwrap();

        assert_eq!(transfers.load(Ordering::SeqCst), 0);
        assert!(rollover.report.is_none());
        assert!(rollover.distribution_error.is_some());
    }

    #[tokio::test]
    async fn unrecorded_payout_sends_nothing() {
        let mut store = MockSeasonStore::new();
        store.expect_active_season().returning(|| Ok(season()));
        store.expect_payout().returning(|_| Ok(None));
        store.expect_leaderboard().returning(|_| Ok(winners()));
        store
            .expect_record_payout()
            .returning(|_, _| Err(anyhow::anyhow!("db down")));
        store.expect_rollover().never();

        let transfers = Arc::new(AtomicUsize::new(0));
        let controller = Controller::new(Arc::new(store), distributor(transfers.clone()), 30);
        let err = controller.rollover().await.unwrap_err();

        assert!(matches!(err, Error::Store(_)));
        assert_eq!(transfers.load(Ordering::SeqCst), 0);
    }
}
