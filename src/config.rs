// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, env, fs, path::PathBuf};

use crate::extract::{PageSource, TableFilter};

pub const DEFAULT_PAGE_URL: &str =
    "https://web.archive.org/web/20230908091635/https://en.wikipedia.org/wiki/List_of_largest_banks";

/// Everything one run needs. Fixed once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Page URL, or a path to a saved copy of the page.
    pub page: String,
    pub table_filter: TableFilter,
    /// CSV with `Currency` and `Rate` columns.
    pub rate_source: PathBuf,
    pub output_csv: PathBuf,
    pub database: PathBuf,
    pub table_name: String,
    /// Column holding the value to convert.
    pub base_column: String,
    pub currencies: Vec<String>,
    /// Directory receiving `etl_log_YYYY-MM-DD.txt`.
    pub log_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE_URL.to_string(),
            table_filter: TableFilter::class("wikitable"),
            rate_source: PathBuf::from("exchange_rates.csv"),
            output_csv: PathBuf::from("largest_banks.csv"),
            database: PathBuf::from("Banks.db"),
            table_name: "Largest_banks".to_string(),
            base_column: "Market cap (US$ billion)".to_string(),
            currencies: vec!["GBP".into(), "EUR".into(), "INR".into()],
            log_dir: PathBuf::from("."),
        }
    }
}

impl PipelineConfig {
    /// Parse a YAML document; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(yaml).context("parsing pipeline config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        Self::from_yaml_str(&text).with_context(|| format!("in {:?}", path))
    }

    /// Resolve the config for this invocation: YAML file from `path` (or
    /// `ETL_CONFIG`) if given, else defaults, then `ETL_*` overrides.
    pub fn resolve(path: Option<PathBuf>) -> Result<Self> {
        let path = path.or_else(|| env::var_os("ETL_CONFIG").map(PathBuf::from));
        let mut cfg = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        cfg.apply_overrides(|key| env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `ETL_PAGE_URL`, `ETL_RATES`, `ETL_OUTPUT_CSV`, `ETL_DATABASE`,
    /// `ETL_TABLE`, `ETL_CURRENCIES` (comma separated) and `ETL_LOG_DIR`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ETL_PAGE_URL") {
            self.page = v;
        }
        if let Some(v) = lookup("ETL_RATES") {
            self.rate_source = v.into();
        }
        if let Some(v) = lookup("ETL_OUTPUT_CSV") {
            self.output_csv = v.into();
        }
        if let Some(v) = lookup("ETL_DATABASE") {
            self.database = v.into();
        }
        if let Some(v) = lookup("ETL_TABLE") {
            self.table_name = v;
        }
        if let Some(v) = lookup("ETL_CURRENCIES") {
            self.currencies = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("ETL_LOG_DIR") {
            self.log_dir = v.into();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.currencies.is_empty() {
            bail!("at least one target currency is required");
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.currencies.iter().find(|c| !seen.insert(c.as_str())) {
            bail!("currency {:?} is listed more than once", dup);
        }
        if self.table_name.trim().is_empty() {
            bail!("table_name must not be empty");
        }
        if self.base_column.is_empty() {
            bail!("base_column must not be empty");
        }
        Ok(())
    }

    pub fn page_source(&self) -> PageSource {
        PageSource::parse(&self.page)
    }
}
