use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adkpi_core::domain::comparison::ComparisonResult;
use adkpi_core::intent::IntentParser;

mod report;

const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Parser)]
#[command(name = "adkpi_agent")]
struct Args {
    /// Question in plain language, e.g. "compare CAC and ROAS last 30 days vs prior 30 days".
    #[arg(required = true)]
    question: Vec<String>,

    /// Metrics API base URL. Defaults to METRICS_API_URL, then http://localhost:8000.
    #[arg(long)]
    api_url: Option<String>,

    /// Print the parsed intent without calling the metrics API.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = adkpi_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let question = args.question.join(" ");

    let llm = adkpi_core::llm::client_from_settings(&settings)?;
    let parser = IntentParser::new(llm);

    let intent = match parser.parse(&question).await {
        Ok(Some(intent)) => intent,
        Ok(None) => anyhow::bail!("could not map the question to a supported intent: {question:?}"),
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            return Err(err.context("intent parsing failed"));
        }
    };

    println!("{}", serde_json::to_string_pretty(&intent)?);
    if args.dry_run {
        tracing::info!(n_days = intent.n_days, dry_run = true, "skipping metrics API call");
        return Ok(());
    }

    let api_url = args
        .api_url
        .or(settings.metrics_api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let comparison = fetch_comparison(&api_url, intent.n_days).await?;
    println!();
    print!("{}", report::render(&intent, &comparison));
    Ok(())
}

async fn fetch_comparison(api_url: &str, n_days: u32) -> anyhow::Result<ComparisonResult> {
    let url = format!("{}/compare?n_days={n_days}", api_url.trim_end_matches('/'));
    tracing::info!(%url, n_days, "requesting window comparison");

    let res = reqwest::Client::new()
        .get(&url)
        .send()
        .await
        .with_context(|| format!("metrics API request failed: {url}"))?;

    let status = res.status();
    let text = res
        .text()
        .await
        .context("failed to read metrics API response body")?;
    anyhow::ensure!(status.is_success(), "metrics API returned {status}: {text}");

    serde_json::from_str::<ComparisonResult>(&text)
        .with_context(|| format!("failed to decode comparison response: {text}"))
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
