// src/extract/mod.rs

pub mod html;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::PathBuf};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::table::Table;
use crate::trace::ProgressTrace;

pub use html::parse_table;

/// Where the page comes from: a web address, or a saved copy on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum PageSource {
    Http(Url),
    File(PathBuf),
}

impl PageSource {
    /// `http://` and `https://` locators are fetched, anything else is a path.
    pub fn parse(locator: &str) -> Self {
        match Url::parse(locator) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => PageSource::Http(url),
            _ => PageSource::File(PathBuf::from(locator)),
        }
    }
}

impl fmt::Display for PageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSource::Http(url) => write!(f, "{}", url),
            PageSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Picks the table to extract.
///
/// `Attributes` matches like `{class: wikitable}`: `class` is matched per
/// whitespace-separated class name, every other attribute by exact value.
/// `Css` is a raw selector; the first matching `<table>` wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableFilter {
    Css(String),
    Attributes(BTreeMap<String, String>),
}

impl TableFilter {
    pub fn class(name: &str) -> Self {
        TableFilter::Attributes(BTreeMap::from([("class".to_string(), name.to_string())]))
    }

    pub fn to_css(&self) -> String {
        match self {
            TableFilter::Css(css) => css.clone(),
            TableFilter::Attributes(attrs) => {
                let mut css = String::from("table");
                for (key, value) in attrs {
                    if key == "class" {
                        for class in value.split_whitespace() {
                            css.push_str(&format!("[class~=\"{}\"]", escape_css(class)));
                        }
                    } else {
                        css.push_str(&format!("[{}=\"{}\"]", key, escape_css(value)));
                    }
                }
                css
            }
        }
    }
}

impl fmt::Display for TableFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

fn escape_css(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Fetch the page body. Non-2xx responses are transport failures.
pub async fn fetch_page(client: &Client, source: &PageSource) -> EtlResult<String> {
    let locator = source.to_string();
    match source {
        PageSource::File(path) => {
            debug!("Reading page from {}", path.display());
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| EtlError::TransportFailure {
                    locator,
                    reason: e.to_string(),
                })
        }
        PageSource::Http(url) => {
            debug!("Fetching page from {}", url);
            let transport = |e: reqwest::Error| EtlError::TransportFailure {
                locator: locator.clone(),
                reason: e.to_string(),
            };
            let resp = client.get(url.clone()).send().await.map_err(transport)?;
            let status = resp.status();
            if !status.is_success() {
                return Err(EtlError::TransportFailure {
                    locator: locator.clone(),
                    reason: format!("HTTP status {}", status),
                });
            }
            resp.text().await.map_err(transport)
        }
    }
}

/// Fetch `source` and turn the first table matching `filter` into a [`Table`].
///
/// Records exactly one trace event: success, or which of
/// fetch/no-table/parse went wrong.
#[instrument(level = "info", skip(client, source, trace), fields(source = %source))]
pub async fn extract(
    client: &Client,
    source: &PageSource,
    filter: &TableFilter,
    trace: &mut ProgressTrace,
) -> EtlResult<Table> {
    let result = match fetch_page(client, source).await {
        Ok(body) => parse_table(&body, filter, &source.to_string()),
        Err(e) => Err(e),
    };

    match &result {
        Ok(table) => trace.info(format!(
            "Data extracted successfully from {} ({} rows, {} columns)",
            source,
            table.num_rows(),
            table.num_columns()
        )),
        Err(e) => match e.kind() {
            ErrorKind::TransportFailure => trace.error(format!("Failed to fetch data: {}", e)),
            ErrorKind::NoMatchingTable => trace.warn("No tables found"),
            _ => trace.error(format!("Error during extraction: {}", e)),
        },
    }

    result
}
