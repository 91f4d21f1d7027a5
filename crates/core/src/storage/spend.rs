use anyhow::Context;
use chrono::NaiveDate;

use crate::domain::metrics::SpendTotals;

#[async_trait::async_trait]
pub trait SpendStore: Send + Sync {
    /// `Ok(None)` means the aggregate query produced no row at all, which is not the same as a
    /// range without records (that yields zero totals).
    async fn fetch_totals(&self, start: NaiveDate, end: NaiveDate)
        -> anyhow::Result<Option<SpendTotals>>;

    async fn ping(&self) -> anyhow::Result<()>;
}

// Sums are rounded per day, then re-aggregated.
const TOTALS_SQL: &str = "\
WITH daily AS (
  SELECT date,
         SUM(spend)::numeric(18,2)       AS spend,
         SUM(conversions)::numeric(18,2) AS conversions
  FROM ads_spend
  WHERE date >= $1 AND date <= $2
  GROUP BY date
),
agg AS (
  SELECT COALESCE(SUM(spend), 0)::numeric(18,2)       AS spend,
         COALESCE(SUM(conversions), 0)::numeric(18,2) AS conversions
  FROM daily
)
SELECT spend::float8, conversions::float8 FROM agg";

#[derive(Debug, Clone)]
pub struct PgSpendStore {
    pool: sqlx::PgPool,
}

impl PgSpendStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SpendStore for PgSpendStore {
    async fn fetch_totals(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Option<SpendTotals>> {
        // Held for this call only; returned to the pool on drop.
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("acquire database connection failed")?;

        let row = sqlx::query_as::<_, (f64, f64)>(TOTALS_SQL)
            .persistent(false)
            .bind(start)
            .bind(end)
            .fetch_optional(&mut *conn)
            .await
            .with_context(|| format!("ads_spend totals query failed ({start}..={end})"))?;

        Ok(row.map(|(spend, conversions)| SpendTotals { spend, conversions }))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .persistent(false)
            .execute(&self.pool)
            .await
            .context("database ping failed")?;
        Ok(())
    }
}
