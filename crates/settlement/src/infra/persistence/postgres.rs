use {
    super::{SeasonStore, dto},
    crate::domain::{
        eth::Address,
        season::{Archive, ArchivedStanding, Payout, Season, Standing},
    },
    anyhow::Context,
    chrono::NaiveDate,
    sqlx::{PgConnection, PgPool, postgres::PgPoolOptions},
    std::str::FromStr,
};

pub struct Postgres {
    pool: PgPool,
}

impl Postgres {
    /// Connections are established on first use.
    pub fn new(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)
            .context("invalid database url")?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl SeasonStore for Postgres {
    async fn active_season(&self) -> anyhow::Result<Season> {
        let mut ex = self.pool.acquire().await?;
        let (number, start, end) = load_active_season(&mut ex)
            .await?
            .context("no active season")?;
        Ok(Season {
            number: u32::try_from(number).context("negative season number")?,
            start,
            end,
        })
    }

    async fn leaderboard(&self, limit: usize) -> anyhow::Result<Vec<Standing>> {
        let mut ex = self.pool.acquire().await?;
        load_leaderboard(&mut ex, i64::try_from(limit)?)
            .await?
            .into_iter()
            .map(|(wallet, season_xp)| {
                Ok(Standing {
                    wallet: Address::from_str(&wallet)
                        .with_context(|| format!("invalid wallet {wallet}"))?,
                    season_xp: u64::try_from(season_xp).context("negative season xp")?,
                })
            })
            .collect()
    }

    async fn payout(&self, season: u32) -> anyhow::Result<Option<Payout>> {
        let mut ex = self.pool.acquire().await?;
        let Some(payload) = load_payout(&mut ex, i32::try_from(season)?).await? else {
            return Ok(None);
        };
        let payout: dto::Payout =
            serde_json::from_str(&payload).context("invalid stored payout")?;
        Ok(Some(payout.into()))
    }

    async fn record_payout(&self, season: u32, payout: &Payout) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&dto::Payout::from(payout))?;
        let mut ex = self.pool.acquire().await?;
        upsert_payout(&mut ex, i32::try_from(season)?, &payload).await?;
        Ok(())
    }

    async fn rollover(&self, archive: &Archive, next: &Season) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        let season = i32::try_from(archive.season.number)?;
        for standing in &archive.standings {
            insert_standing(&mut tx, season, standing).await?;
        }
        reset_season_xp(&mut tx).await?;
        open_season(&mut tx, next).await?;
        tx.commit().await?;
        Ok(())
    }
}

type SeasonRow = (i32, NaiveDate, NaiveDate);

async fn load_active_season(ex: &mut PgConnection) -> Result<Option<SeasonRow>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT number, start_date, end_date
FROM seasons
WHERE active
ORDER BY number DESC
LIMIT 1
    ;"#;
    sqlx::query_as(QUERY).fetch_optional(ex).await
}

async fn load_leaderboard(
    ex: &mut PgConnection,
    limit: i64,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT wallet, season_xp
FROM users
WHERE season_xp > 0
ORDER BY season_xp DESC, wallet ASC
LIMIT $1
    ;"#;
    sqlx::query_as(QUERY).bind(limit).fetch_all(ex).await
}

async fn load_payout(ex: &mut PgConnection, season: i32) -> Result<Option<String>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT payload::text
FROM season_payouts
WHERE season = $1
    ;"#;
    sqlx::query_scalar(QUERY).bind(season).fetch_optional(ex).await
}

async fn upsert_payout(ex: &mut PgConnection, season: i32, payload: &str) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO season_payouts (season, payload, updated_at)
VALUES ($1, $2::jsonb, now())
ON CONFLICT (season) DO UPDATE
SET payload = EXCLUDED.payload, updated_at = EXCLUDED.updated_at
    ;"#;
    sqlx::query(QUERY).bind(season).bind(payload).execute(ex).await?;
    Ok(())
}

async fn insert_standing(
    ex: &mut PgConnection,
    season: i32,
    standing: &ArchivedStanding,
) -> anyhow::Result<()> {
    const QUERY: &str = r#"
INSERT INTO season_standings
    (season, rank, wallet, season_xp, reward_usd, reward_tokens, reward_tx, reward_error)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ;"#;
    let reward = standing.reward.as_ref();
    sqlx::query(QUERY)
        .bind(season)
        .bind(i16::try_from(standing.rank)?)
        .bind(standing.standing.wallet.to_string())
        .bind(i64::try_from(standing.standing.season_xp)?)
        .bind(reward.map(|reward| i64::from(reward.usd_value)))
        .bind(
            reward
                .and_then(|reward| reward.token_amount)
                .map(|amount| number::conversions::u256_to_big_decimal(&amount)),
        )
        .bind(
            reward
                .and_then(|reward| reward.tx_hash)
                .map(|hash| hash.to_string()),
        )
        .bind(reward.and_then(|reward| reward.error.clone()))
        .execute(ex)
        .await?;
    Ok(())
}

async fn reset_season_xp(ex: &mut PgConnection) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
UPDATE users
SET season_xp = 0
WHERE season_xp <> 0
    ;"#;
    sqlx::query(QUERY).execute(ex).await?;
    Ok(())
}

async fn open_season(ex: &mut PgConnection, season: &Season) -> anyhow::Result<()> {
    const CLOSE: &str = r#"
UPDATE seasons
SET active = FALSE
WHERE active
    ;"#;
    const OPEN: &str = r#"
INSERT INTO seasons (number, start_date, end_date, active)
VALUES ($1, $2, $3, TRUE)
    ;"#;
    sqlx::query(CLOSE).execute(&mut *ex).await?;
    sqlx::query(OPEN)
        .bind(i32::try_from(season.number)?)
        .bind(season.start)
        .bind(season.end)
        .execute(ex)
        .await?;
    Ok(())
}
