use chrono::NaiveDate;

use crate::aggregator::MetricsAggregator;
use crate::domain::comparison::{ComparisonResult, Deltas, TrailingWindows};

#[derive(Clone)]
pub struct WindowComparator {
    aggregator: MetricsAggregator,
}

impl WindowComparator {
    pub fn new(aggregator: MetricsAggregator) -> Self {
        Self { aggregator }
    }

    pub async fn compare_trailing_windows(
        &self,
        n_days: u32,
        reference_date: NaiveDate,
    ) -> anyhow::Result<ComparisonResult> {
        let windows = TrailingWindows::new(n_days, reference_date)?;

        let last = self
            .aggregator
            .fetch(windows.last.start, windows.last.end)
            .await?;
        let prior = self
            .aggregator
            .fetch(windows.prior.start, windows.prior.end)
            .await?;

        let deltas = Deltas::between(last.as_ref(), prior.as_ref());
        tracing::info!(
            n_days,
            %reference_date,
            spend_delta = ?deltas.spend,
            cac_delta = ?deltas.cac,
            roas_delta = ?deltas.roas,
            "trailing windows compared"
        );

        Ok(ComparisonResult {
            n_days,
            last,
            prior,
            deltas,
        })
    }
}
