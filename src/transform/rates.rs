// src/transform/rates.rs

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::{collections::BTreeMap, fs::File, io::Read, path::Path};
use tracing::debug;

use crate::error::{EtlError, EtlResult};

/// One row of the exchange-rate file.
#[derive(Debug, Deserialize)]
struct RateRecord {
    #[serde(rename = "Currency")]
    currency: String,
    #[serde(rename = "Rate")]
    rate: f64,
}

/// Currency code → rate against the base currency. Read once per run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RateMap {
    rates: BTreeMap<String, f64>,
}

impl RateMap {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            rates: pairs.into_iter().map(|(c, r)| (c.into(), r)).collect(),
        }
    }

    /// Load a CSV with `Currency` and `Rate` columns; other columns are ignored.
    /// A repeated currency keeps its last rate.
    pub fn load(path: impl AsRef<Path>) -> EtlResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| EtlError::MissingRateSource {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let map = Self::from_reader(file, path)?;
        debug!(path = %path.display(), currencies = map.len(), "loaded exchange rates");
        Ok(map)
    }

    fn from_reader<R: Read>(reader: R, path: &Path) -> EtlResult<Self> {
        let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
        let mut rates = BTreeMap::new();
        for record in rdr.deserialize::<RateRecord>() {
            let record = record.map_err(|e| EtlError::MalformedRateSource {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            rates.insert(record.currency, record.rate);
        }
        Ok(Self { rates })
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
