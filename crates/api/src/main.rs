use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adkpi_core::aggregator::MetricsAggregator;
use adkpi_core::comparator::WindowComparator;
use adkpi_core::domain::comparison::{ComparisonResult, DEFAULT_WINDOW_DAYS, MAX_WINDOW_DAYS};
use adkpi_core::domain::metrics::{Assumptions, MetricsResult};
use adkpi_core::storage::spend::{PgSpendStore, SpendStore};
use adkpi_core::time::iso::{parse_iso_date, today};

const DB_ACQUIRE_TIMEOUT_SECS: u64 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = adkpi_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    // No connection is opened here; each request acquires one and surfaces failures as 500.
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(std::time::Duration::from_secs(DB_ACQUIRE_TIMEOUT_SECS))
        .connect_lazy(&settings.database_url)
        .context("invalid database URL")?;
    let store: Arc<dyn SpendStore> = Arc::new(PgSpendStore::new(pool));

    let state = AppState::new(
        store,
        Assumptions {
            revenue_per_conversion: settings.revenue_per_conversion,
        },
    );
    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, revenue_per_conversion = settings.revenue_per_conversion, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(get_metrics))
        .route("/compare-30d", get(compare_30d))
        .route("/compare", get(compare))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Clone)]
struct AppState {
    aggregator: MetricsAggregator,
}

impl AppState {
    fn new(store: Arc<dyn SpendStore>, assumptions: Assumptions) -> Self {
        Self {
            aggregator: MetricsAggregator::new(store, assumptions),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("No data")]
    NotFound,
    #[error("database unavailable")]
    Unavailable,
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(e) => {
                sentry_anyhow::capture_anyhow(e);
                tracing::error!(error = %e, "request failed upstream");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let detail = match &self {
            ApiError::Upstream(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn ready(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.aggregator.store().ping().await.map_err(|e| {
        tracing::warn!(error = %e, "readiness ping failed");
        ApiError::Unavailable
    })?;
    Ok(Json(json!({"status": "ok"})))
}

#[derive(Debug, Deserialize)]
struct MetricsQuery {
    start: Option<String>,
    end: Option<String>,
}

async fn get_metrics(
    State(state): State<AppState>,
    Query(q): Query<MetricsQuery>,
) -> Result<Json<MetricsResult>, ApiError> {
    let (Some(start), Some(end)) = (q.start.as_deref(), q.end.as_deref()) else {
        return Err(ApiError::BadRequest(
            "start and end query parameters are required".to_string(),
        ));
    };
    let (start, end) = match (parse_iso_date(start), parse_iso_date(end)) {
        (Ok(start), Ok(end)) => (start, end),
        _ => {
            return Err(ApiError::BadRequest(
                "Invalid date format; use YYYY-MM-DD".to_string(),
            ))
        }
    };
    if start > end {
        return Err(ApiError::BadRequest("start must be <= end".to_string()));
    }

    let metrics = state
        .aggregator
        .fetch(start, end)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(metrics))
}

async fn compare_30d(State(state): State<AppState>) -> Result<Json<ComparisonResult>, ApiError> {
    run_comparison(&state, DEFAULT_WINDOW_DAYS, today()).await
}

#[derive(Debug, Deserialize)]
struct CompareQuery {
    n_days: Option<String>,
    as_of: Option<String>,
}

async fn compare(
    State(state): State<AppState>,
    Query(q): Query<CompareQuery>,
) -> Result<Json<ComparisonResult>, ApiError> {
    let n_days = match q.n_days.as_deref() {
        None => DEFAULT_WINDOW_DAYS,
        Some(raw) => parse_window_days(raw)?,
    };
    let reference_date = match q.as_of.as_deref() {
        None => today(),
        Some(raw) => parse_iso_date(raw).map_err(|_| {
            ApiError::BadRequest("Invalid as_of date format; use YYYY-MM-DD".to_string())
        })?,
    };
    run_comparison(&state, n_days, reference_date).await
}

fn parse_window_days(raw: &str) -> Result<u32, ApiError> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|n| (1..=MAX_WINDOW_DAYS).contains(n))
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "n_days must be an integer in 1..={MAX_WINDOW_DAYS}"
            ))
        })
}

async fn run_comparison(
    state: &AppState,
    n_days: u32,
    reference_date: NaiveDate,
) -> Result<Json<ComparisonResult>, ApiError> {
    let comparator = WindowComparator::new(state.aggregator.clone());
    let result = comparator
        .compare_trailing_windows(n_days, reference_date)
        .await?;
    Ok(Json(result))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &adkpi_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adkpi_core::domain::metrics::SpendTotals;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Mutex;
    use tower::ServiceExt;

    enum Reply {
        Totals(SpendTotals),
        NoRow,
        Fail,
        // Fails the first `failures` calls, then answers with the totals.
        Recovering {
            failures: Mutex<u32>,
            then: SpendTotals,
        },
    }

    struct FakeStore {
        reply: Reply,
        calls: Mutex<Vec<(NaiveDate, NaiveDate)>>,
    }

    impl FakeStore {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl SpendStore for FakeStore {
        async fn fetch_totals(
            &self,
            start: NaiveDate,
            end: NaiveDate,
        ) -> anyhow::Result<Option<SpendTotals>> {
            self.calls.lock().unwrap().push((start, end));
            match &self.reply {
                Reply::Totals(t) => Ok(Some(*t)),
                Reply::NoRow => Ok(None),
                Reply::Fail => anyhow::bail!("connection refused"),
                Reply::Recovering { failures, then } => {
                    let mut failures = failures.lock().unwrap();
                    if *failures > 0 {
                        *failures -= 1;
                        anyhow::bail!("connection refused");
                    }
                    Ok(Some(*then))
                }
            }
        }

        async fn ping(&self) -> anyhow::Result<()> {
            match &self.reply {
                Reply::Fail => anyhow::bail!("connection refused"),
                _ => Ok(()),
            }
        }
    }

    fn app(store: Arc<FakeStore>) -> Router {
        router(AppState::new(store, Assumptions::default()))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let res = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn totals(spend: f64, conversions: f64) -> Reply {
        Reply::Totals(SpendTotals { spend, conversions })
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let (status, body) = get(app(FakeStore::new(Reply::Fail)), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn ready_reflects_store() {
        let (status, _) = get(app(FakeStore::new(Reply::Fail)), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = get(app(FakeStore::new(totals(0.0, 0.0))), "/ready").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_returns_kpis() {
        let store = FakeStore::new(totals(1000.0, 0.0));
        let (status, body) = get(
            app(store.clone()),
            "/metrics?start=2024-01-01&end=2024-01-31",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["start"], "2024-01-01");
        assert_eq!(body["end"], "2024-01-31");
        assert_eq!(body["spend"], 1000.0);
        assert_eq!(body["CAC"], Value::Null);
        assert_eq!(body["ROAS"], 0.0);
        assert_eq!(body["assumptions"]["revenue_per_conversion"], 100.0);

        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        assert_eq!(*store.calls.lock().unwrap(), vec![(d(1), d(31))]);
    }

    #[tokio::test]
    async fn metrics_rejects_reversed_range() {
        let store = FakeStore::new(totals(1.0, 1.0));
        let (status, body) = get(
            app(store.clone()),
            "/metrics?start=2024-02-01&end=2024-01-01",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "start must be <= end");
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn metrics_rejects_bad_dates() {
        for uri in [
            "/metrics?start=2024-13-01&end=2024-12-01",
            "/metrics?start=yesterday&end=2024-01-01",
            "/metrics?start=2024-01-01",
        ] {
            let (status, _) = get(app(FakeStore::new(totals(1.0, 1.0))), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn metrics_without_row_is_not_found() {
        let (status, body) = get(
            app(FakeStore::new(Reply::NoRow)),
            "/metrics?start=2024-01-01&end=2024-01-01",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "No data");
    }

    #[tokio::test]
    async fn metrics_store_failure_is_500() {
        let (status, _) = get(
            app(FakeStore::new(Reply::Fail)),
            "/metrics?start=2024-01-01&end=2024-01-02",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn store_outage_is_500_and_recovers_without_restart() {
        let store = FakeStore::new(Reply::Recovering {
            failures: Mutex::new(2),
            then: SpendTotals {
                spend: 100.0,
                conversions: 4.0,
            },
        });
        let router = app(store.clone());

        let (status, body) = get(router.clone(), "/compare-30d").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Internal Server Error");

        let (status, _) = get(router.clone(), "/metrics?start=2024-01-01&end=2024-01-02").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, body) = get(router, "/metrics?start=2024-01-01&end=2024-01-02").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["CAC"], 25.0);
        assert_eq!(store.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn compare_30d_uses_today_as_reference() {
        let store = FakeStore::new(totals(500.0, 10.0));
        let (status, body) = get(app(store.clone()), "/compare-30d").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["n_days"], 30);
        assert_eq!(body["deltas"]["spend"], 0.0);
        assert_eq!(body["deltas"]["CAC"], 0.0);

        let calls = store.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        let (last, prior) = (calls[0], calls[1]);
        assert!(last.1 >= today() - chrono::Duration::days(1));
        assert_eq!((last.1 - last.0).num_days(), 30);
        assert_eq!((prior.1 - prior.0).num_days(), 29);
        assert_eq!(prior.1 + chrono::Duration::days(1), last.0);
    }

    #[tokio::test]
    async fn compare_accepts_window_and_reference_date() {
        let store = FakeStore::new(totals(100.0, 4.0));
        let (status, body) = get(
            app(store.clone()),
            "/compare?n_days=7&as_of=2024-03-10",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["n_days"], 7);
        assert_eq!(body["last"]["start"], "2024-03-03");
        assert_eq!(body["last"]["end"], "2024-03-10");
        assert_eq!(body["prior"]["start"], "2024-02-25");
        assert_eq!(body["prior"]["end"], "2024-03-02");
    }

    #[tokio::test]
    async fn compare_rejects_bad_parameters() {
        for uri in [
            "/compare?n_days=0",
            "/compare?n_days=abc",
            "/compare?n_days=3651",
            "/compare?as_of=nope",
        ] {
            let (status, _) = get(app(FakeStore::new(totals(1.0, 1.0))), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn compare_accepts_longest_window() {
        let (status, body) = get(
            app(FakeStore::new(totals(1.0, 1.0))),
            &format!("/compare?n_days={MAX_WINDOW_DAYS}&as_of=2024-03-10"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["n_days"], MAX_WINDOW_DAYS);
    }

    #[tokio::test]
    async fn compare_with_missing_rows_has_null_windows() {
        let (status, body) = get(app(FakeStore::new(Reply::NoRow)), "/compare-30d").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["last"], Value::Null);
        assert_eq!(body["prior"], Value::Null);
        assert_eq!(body["deltas"]["ROAS"], Value::Null);
    }

    #[tokio::test]
    async fn compare_failure_is_500() {
        let (status, _) = get(app(FakeStore::new(Reply::Fail)), "/compare-30d").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
