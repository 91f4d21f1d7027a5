pub mod aggregator;
pub mod comparator;
pub mod domain;
pub mod intent;
pub mod llm;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    use crate::domain::metrics::DEFAULT_REVENUE_PER_CONVERSION;
    use crate::llm::Provider;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: String,
        pub revenue_per_conversion: f64,
        pub llm_provider: Provider,
        pub openai_api_key: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub metrics_api_url: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let revenue_per_conversion = match std::env::var("REVENUE_PER_CONVERSION") {
                Ok(raw) => parse_revenue_per_conversion(&raw)?,
                Err(_) => DEFAULT_REVENUE_PER_CONVERSION,
            };

            let llm_provider = match std::env::var("LLM_PROVIDER") {
                Ok(raw) => raw.parse::<Provider>()?,
                Err(_) => Provider::OpenAI,
            };

            Ok(Self {
                database_url: database_url_from_env(),
                revenue_per_conversion,
                llm_provider,
                openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                metrics_api_url: std::env::var("METRICS_API_URL").ok(),
            })
        }

        pub fn require_openai_api_key(&self) -> anyhow::Result<&str> {
            self.openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }
    }

    // DATABASE_URL wins; otherwise the libpq-style PG* variables are composed.
    fn database_url_from_env() -> String {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            return url;
        }
        let var = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
        compose_database_url(
            &var("PGHOST", "postgres"),
            &var("PGPORT", "5432"),
            &var("PGUSER", "ads"),
            &var("PGPASSWORD", "ads123"),
            &var("PGDATABASE", "adsdb"),
        )
    }

    fn compose_database_url(host: &str, port: &str, user: &str, password: &str, dbname: &str) -> String {
        format!("postgres://{user}:{password}@{host}:{port}/{dbname}")
    }

    fn parse_revenue_per_conversion(raw: &str) -> anyhow::Result<f64> {
        let value = raw
            .trim()
            .parse::<f64>()
            .with_context(|| format!("REVENUE_PER_CONVERSION must be a number (got {raw:?})"))?;
        anyhow::ensure!(
            value.is_finite() && value > 0.0,
            "REVENUE_PER_CONVERSION must be > 0 (got {value})"
        );
        Ok(value)
    }

}
