// src/pipeline.rs

use reqwest::Client;
use std::fmt;
use tracing::{info, instrument};

use crate::config::PipelineConfig;
use crate::error::EtlError;
use crate::extract;
use crate::load::{self, LoadReport};
use crate::trace::ProgressTrace;
use crate::transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    Extracting,
    Transforming,
    Loading,
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a run ended. `load` is `None` when no sink was attempted.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: RunState,
    pub abort_reason: Option<EtlError>,
    pub load: Option<LoadReport>,
}

impl RunOutcome {
    fn aborted(reason: Option<EtlError>) -> Self {
        Self {
            state: RunState::Aborted,
            abort_reason: reason,
            load: None,
        }
    }
}

struct Run<'a> {
    state: RunState,
    trace: &'a mut ProgressTrace,
}

impl Run<'_> {
    fn enter(&mut self, next: RunState) {
        info!(from = %self.state, to = %next, "pipeline state");
        self.state = next;
    }
}

/// One full extract → transform → load pass.
///
/// Never fails: stage errors end up in `trace` and in the returned outcome.
/// An empty extraction or a failed transformation stops the run before any
/// sink is touched.
#[instrument(level = "info", skip_all, fields(page = %config.page))]
pub async fn run(client: &Client, config: &PipelineConfig, trace: &mut ProgressTrace) -> RunOutcome {
    let mut flow = Run {
        state: RunState::Start,
        trace,
    };
    flow.trace.info("Starting ETL process");

    flow.enter(RunState::Extracting);
    let extracted = extract::extract(
        client,
        &config.page_source(),
        &config.table_filter,
        flow.trace,
    )
    .await;

    let table = match extracted {
        Ok(table) if !table.is_empty() => table,
        other => {
            flow.enter(RunState::Aborted);
            flow.trace
                .warn("ETL process did not complete due to data extraction issues");
            return RunOutcome::aborted(other.err());
        }
    };

    flow.enter(RunState::Transforming);
    let transformed = match transform::transform(
        table,
        &config.rate_source,
        &config.base_column,
        &config.currencies,
        flow.trace,
    ) {
        Ok(table) => table,
        Err(e) => {
            flow.enter(RunState::Aborted);
            flow.trace
                .warn("ETL process did not complete due to data transformation issues");
            return RunOutcome::aborted(Some(e));
        }
    };

    flow.enter(RunState::Loading);
    let report = load::load(
        &transformed,
        &config.output_csv,
        &config.database,
        &config.table_name,
        flow.trace,
    );

    flow.enter(RunState::Done);
    if report.all_ok() {
        flow.trace.info("ETL process completed successfully");
    } else {
        flow.trace.warn("ETL process completed with load errors");
    }

    RunOutcome {
        state: RunState::Done,
        abort_reason: None,
        load: Some(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::extract::TableFilter;
    use crate::load::read_table_file;
    use crate::table::ColumnData;
    use anyhow::Result;
    use std::{fs, path::Path};
    use tempfile::{tempdir, TempDir};

    const PAGE: &str = r#"<html><body>
        <table class="wikitable sortable">
          <tr><th>Rank</th><th>Bank name</th><th>Market cap<br>(US$ billion)</th></tr>
          <tr><td>1</td><td>JPMorgan Chase</td><td>432.92</td></tr>
          <tr><td>2</td><td>Bank of America</td><td>231.52</td></tr>
          <tr><td>3</td><td>Industrial and Commercial Bank of China</td><td>194.56</td></tr>
        </table></body></html>"#;

    const RATES: &str = "Currency,Rate\nEUR,0.93\nGBP,0.8\nINR,82.95\n";

    fn workspace(page: &str, rates: &str) -> Result<(TempDir, PipelineConfig)> {
        let dir = tempdir()?;
        let page_path = dir.path().join("banks.html");
        fs::write(&page_path, page)?;
        let rates_path = dir.path().join("exchange_rates.csv");
        fs::write(&rates_path, rates)?;

        let cfg = PipelineConfig {
            page: page_path.to_string_lossy().into_owned(),
            table_filter: TableFilter::class("wikitable"),
            rate_source: rates_path,
            output_csv: dir.path().join("largest_banks.csv"),
            database: dir.path().join("Banks.db"),
            log_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        Ok((dir, cfg))
    }

    fn client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    fn row_count(db: &Path, table: &str) -> Result<i64> {
        let conn = duckdb::Connection::open(db)?;
        let n = conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |r| r.get(0))?;
        Ok(n)
    }

    #[tokio::test]
    async fn full_run_writes_both_sinks() -> Result<()> {
        let (_dir, cfg) = workspace(PAGE, RATES)?;
        let mut trace = ProgressTrace::in_memory();

        let outcome = run(&client(), &cfg, &mut trace).await;
        assert_eq!(outcome.state, RunState::Done);
        assert!(outcome.load.as_ref().unwrap().all_ok());

        let csv = read_table_file(&cfg.output_csv)?;
        assert_eq!(csv.num_rows(), 3);
        assert_eq!(
            csv.column("Market Cap (GBP)").unwrap().data,
            ColumnData::Float(vec![Some(346.34), Some(185.22), Some(155.65)])
        );
        assert_eq!(row_count(&cfg.database, &cfg.table_name)?, 3);

        let messages = trace.messages();
        assert_eq!(messages.first(), Some(&"Starting ETL process"));
        assert_eq!(messages.last(), Some(&"ETL process completed successfully"));
        assert!(trace.contains("Data transformed successfully"));
        Ok(())
    }

    #[tokio::test]
    async fn empty_extraction_aborts_before_loading() -> Result<()> {
        let (_dir, cfg) = workspace("<html><p>moved</p></html>", RATES)?;
        let mut trace = ProgressTrace::in_memory();

        let outcome = run(&client(), &cfg, &mut trace).await;
        assert_eq!(outcome.state, RunState::Aborted);
        assert!(outcome.load.is_none());
        assert_eq!(
            outcome.abort_reason.as_ref().map(|e| e.kind()),
            Some(ErrorKind::NoMatchingTable)
        );
        assert!(!cfg.output_csv.exists());
        assert!(!cfg.database.exists());
        assert_eq!(
            trace.messages(),
            vec![
                "Starting ETL process",
                "No tables found",
                "ETL process did not complete due to data extraction issues",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn header_only_table_aborts_without_error() -> Result<()> {
        let page = r#"<table class="wikitable"><tr><th>Rank</th></tr></table>"#;
        let (_dir, cfg) = workspace(page, RATES)?;
        let mut trace = ProgressTrace::in_memory();

        let outcome = run(&client(), &cfg, &mut trace).await;
        assert_eq!(outcome.state, RunState::Aborted);
        assert!(outcome.abort_reason.is_none());
        assert!(outcome.load.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn missing_rate_aborts_before_loading() -> Result<()> {
        let (_dir, cfg) = workspace(PAGE, "Currency,Rate\nGBP,0.8\n")?;
        let mut trace = ProgressTrace::in_memory();

        let outcome = run(&client(), &cfg, &mut trace).await;
        assert_eq!(outcome.state, RunState::Aborted);
        assert_eq!(
            outcome.abort_reason.as_ref().map(|e| e.kind()),
            Some(ErrorKind::MissingCurrencyRate)
        );
        assert!(outcome.load.is_none());
        assert!(!cfg.output_csv.exists());
        assert!(trace.contains("EUR"));
        Ok(())
    }

    #[tokio::test]
    async fn load_errors_still_reach_done() -> Result<()> {
        let (dir, mut cfg) = workspace(PAGE, RATES)?;
        cfg.database = dir.path().join("missing").join("deeper").join("Banks.db");
        let mut trace = ProgressTrace::in_memory();

        let outcome = run(&client(), &cfg, &mut trace).await;
        assert_eq!(outcome.state, RunState::Done);
        let report = outcome.load.unwrap();
        assert!(report.file.is_ok());
        assert!(report.store.is_err());
        assert_eq!(trace.messages().last(), Some(&"ETL process completed with load errors"));
        Ok(())
    }

    #[tokio::test]
    async fn rerun_replaces_outputs() -> Result<()> {
        let (dir, cfg) = workspace(PAGE, RATES)?;
        let mut trace = ProgressTrace::in_memory();
        run(&client(), &cfg, &mut trace).await;

        let smaller = r#"<table class="wikitable">
            <tr><th>Bank name</th><th>Market cap (US$ billion)</th></tr>
            <tr><td>Solo Bank</td><td>10</td></tr></table>"#;
        fs::write(dir.path().join("banks.html"), smaller)?;
        let outcome = run(&client(), &cfg, &mut trace).await;

        assert_eq!(outcome.state, RunState::Done);
        assert_eq!(row_count(&cfg.database, &cfg.table_name)?, 1);
        assert_eq!(read_table_file(&cfg.output_csv)?.num_rows(), 1);
        Ok(())
    }
}
