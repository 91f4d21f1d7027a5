use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::metrics::{Assumptions, MetricsResult};
use crate::storage::spend::SpendStore;

/// Turns spend/conversion totals for a date range into CAC and ROAS.
#[derive(Clone)]
pub struct MetricsAggregator {
    store: Arc<dyn SpendStore>,
    assumptions: Assumptions,
}

impl MetricsAggregator {
    pub fn new(store: Arc<dyn SpendStore>, assumptions: Assumptions) -> Self {
        Self { store, assumptions }
    }

    pub fn assumptions(&self) -> Assumptions {
        self.assumptions
    }

    pub fn store(&self) -> &dyn SpendStore {
        self.store.as_ref()
    }

    // Callers guarantee start <= end.
    pub async fn fetch(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Option<MetricsResult>> {
        let Some(totals) = self.store.fetch_totals(start, end).await? else {
            tracing::debug!(%start, %end, "totals query returned no row");
            return Ok(None);
        };

        let result = MetricsResult::derive(start, end, totals, self.assumptions);
        tracing::debug!(
            %start,
            %end,
            spend = result.spend,
            conversions = result.conversions,
            cac = ?result.cac,
            roas = ?result.roas,
            "metrics computed"
        );
        Ok(Some(result))
    }
}
