use anyhow::Context;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::metrics::MetricsResult;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const MAX_WINDOW_DAYS: u32 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn calendar_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// The trailing window ending at the reference date and the window right before it.
///
/// `last` is `[ref - n, ref]` (n + 1 days), `prior` is `[ref - 2n, ref - n - 1]` (n days).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingWindows {
    pub last: DateRange,
    pub prior: DateRange,
}

impl TrailingWindows {
    pub fn new(n_days: u32, reference_date: NaiveDate) -> anyhow::Result<Self> {
        anyhow::ensure!(n_days >= 1, "window length must be >= 1 day (got {n_days})");

        let n = i64::from(n_days);
        let back = |days: i64| {
            reference_date
                .checked_sub_signed(Duration::days(days))
                .with_context(|| format!("date out of range: {reference_date} - {days} days"))
        };

        Ok(Self {
            last: DateRange {
                start: back(n)?,
                end: reference_date,
            },
            prior: DateRange {
                start: back(2 * n)?,
                end: back(n + 1)?,
            },
        })
    }
}

pub fn pct_delta(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    let b = b.filter(|b| *b != 0.0)?;
    let a = a?;
    Some((a - b) / b * 100.0)
}

// A computed ratio of exactly zero is treated like a missing one.
fn ratio_delta(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    pct_delta(a.filter(|a| *a != 0.0), b)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Deltas {
    pub spend: Option<f64>,
    pub conversions: Option<f64>,
    #[serde(rename = "CAC")]
    pub cac: Option<f64>,
    #[serde(rename = "ROAS")]
    pub roas: Option<f64>,
}

impl Deltas {
    pub fn between(last: Option<&MetricsResult>, prior: Option<&MetricsResult>) -> Self {
        let (Some(last), Some(prior)) = (last, prior) else {
            return Self::default();
        };
        Self {
            spend: pct_delta(Some(last.spend), Some(prior.spend)),
            conversions: pct_delta(Some(last.conversions), Some(prior.conversions)),
            cac: ratio_delta(last.cac, prior.cac),
            roas: ratio_delta(last.roas, prior.roas),
        }
    }

    /// Looks a delta up by metric name (`spend`, `conversions`, `CAC`, `ROAS`; case-insensitive).
    /// The outer `None` means the name is not a known metric.
    pub fn get(&self, metric: &str) -> Option<Option<f64>> {
        match metric.trim().to_ascii_lowercase().as_str() {
            "spend" => Some(self.spend),
            "conversions" => Some(self.conversions),
            "cac" => Some(self.cac),
            "roas" => Some(self.roas),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub n_days: u32,
    pub last: Option<MetricsResult>,
    pub prior: Option<MetricsResult>,
    pub deltas: Deltas,
}
