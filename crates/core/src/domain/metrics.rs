use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_REVENUE_PER_CONVERSION: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpendTotals {
    pub spend: f64,
    pub conversions: f64,
}

impl SpendTotals {
    pub const ZERO: Self = Self {
        spend: 0.0,
        conversions: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assumptions {
    pub revenue_per_conversion: f64,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            revenue_per_conversion: DEFAULT_REVENUE_PER_CONVERSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub spend: f64,
    pub conversions: f64,
    #[serde(rename = "CAC")]
    pub cac: Option<f64>,
    #[serde(rename = "ROAS")]
    pub roas: Option<f64>,
    pub assumptions: Assumptions,
}

impl MetricsResult {
    pub fn derive(
        start: NaiveDate,
        end: NaiveDate,
        totals: SpendTotals,
        assumptions: Assumptions,
    ) -> Self {
        Self {
            start,
            end,
            spend: totals.spend,
            conversions: totals.conversions,
            cac: cac(totals.spend, totals.conversions),
            roas: roas(
                totals.spend,
                totals.conversions,
                assumptions.revenue_per_conversion,
            ),
            assumptions,
        }
    }
}

pub fn cac(spend: f64, conversions: f64) -> Option<f64> {
    if conversions == 0.0 {
        return None;
    }
    Some(spend / conversions)
}

pub fn roas(spend: f64, conversions: f64, revenue_per_conversion: f64) -> Option<f64> {
    if spend == 0.0 {
        return None;
    }
    Some(conversions * revenue_per_conversion / spend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn derives_both_ratios() {
        let m = MetricsResult::derive(
            jan(1),
            jan(31),
            SpendTotals {
                spend: 1000.0,
                conversions: 40.0,
            },
            Assumptions::default(),
        );
        assert_eq!(m.cac, Some(25.0));
        assert_eq!(m.roas, Some(4.0));
    }

    #[test]
    fn cac_absent_without_conversions_roas_still_defined() {
        let m = MetricsResult::derive(
            jan(1),
            jan(1),
            SpendTotals {
                spend: 1000.0,
                conversions: 0.0,
            },
            Assumptions::default(),
        );
        assert_eq!(m.cac, None);
        assert_eq!(m.roas, Some(0.0));
    }

    #[test]
    fn zero_totals_leave_both_ratios_absent() {
        let m = MetricsResult::derive(jan(1), jan(2), SpendTotals::ZERO, Assumptions::default());
        assert_eq!(m.spend, 0.0);
        assert_eq!(m.conversions, 0.0);
        assert_eq!(m.cac, None);
        assert_eq!(m.roas, None);
    }

    #[test]
    fn roas_uses_configured_revenue() {
        let assumptions = Assumptions {
            revenue_per_conversion: 250.0,
        };
        assert_eq!(roas(500.0, 10.0, assumptions.revenue_per_conversion), Some(5.0));
    }

    #[test]
    fn serializes_with_kpi_names_and_nulls() {
        let m = MetricsResult::derive(
            jan(1),
            jan(2),
            SpendTotals {
                spend: 0.0,
                conversions: 3.0,
            },
            Assumptions::default(),
        );
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(
            v,
            json!({
                "start": "2024-01-01",
                "end": "2024-01-02",
                "spend": 0.0,
                "conversions": 3.0,
                "CAC": 0.0,
                "ROAS": null,
                "assumptions": {"revenue_per_conversion": 100.0},
            })
        );
    }
}
