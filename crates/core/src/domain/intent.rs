use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::comparison::{DEFAULT_WINDOW_DAYS, MAX_WINDOW_DAYS};

pub const COMPARE_CAC_ROAS_INTENT: &str = "compare_cac_roas_last_vs_prior";

pub fn default_metrics() -> Vec<String> {
    vec!["CAC".to_string(), "ROAS".to_string()]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub intent: String,
    pub n_days: u32,
    pub metrics: Vec<String>,
}

impl Intent {
    /// Returns `None` unless `intent` is exactly [`COMPARE_CAC_ROAS_INTENT`]. An `n_days` that is
    /// missing, not an integer, or outside `1..=MAX_WINDOW_DAYS` becomes 30; a missing or non-list
    /// `metrics` becomes `["CAC", "ROAS"]`. Every other key is dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        if obj.get("intent").and_then(Value::as_str) != Some(COMPARE_CAC_ROAS_INTENT) {
            return None;
        }

        // Strings such as "30" and floats such as 30.0 are not integers.
        let n_days = obj
            .get("n_days")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| (1..=MAX_WINDOW_DAYS).contains(n))
            .unwrap_or(DEFAULT_WINDOW_DAYS);

        let metrics = obj
            .get("metrics")
            .and_then(Value::as_array)
            .and_then(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .unwrap_or_else(default_metrics);

        Some(Self {
            intent: COMPARE_CAC_ROAS_INTENT.to_string(),
            n_days,
            metrics,
        })
    }
}
