use anyhow::Result;
use bankscrape::{pipeline, PipelineConfig, ProgressTrace};
use reqwest::Client;
use std::{env, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) resolve config ───────────────────────────────────────────
    let config = PipelineConfig::resolve(env::args_os().nth(1).map(PathBuf::from))?;
    info!(page = %config.page, table = %config.table_name, "config resolved");

    // ─── 3) run once, trace to today's log file ──────────────────────
    let mut trace = ProgressTrace::daily_file(&config.log_dir)?;
    if let Some(path) = trace.log_path() {
        info!("progress log → {}", path.display());
    }

    let client = Client::new();
    let outcome = pipeline::run(&client, &config, &mut trace).await;
    info!(state = %outcome.state, "run finished");

    trace.finish()?;
    Ok(())
}
