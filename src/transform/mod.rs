// src/transform/mod.rs

pub mod rates;

use std::path::Path;
use tracing::{debug, instrument};

use crate::error::{EtlError, EtlResult};
use crate::table::{ColumnData, Table};
use crate::trace::ProgressTrace;

pub use rates::RateMap;

/// Name of the column holding the base value converted into `code`.
pub fn converted_column_name(code: &str) -> String {
    format!("Market Cap ({})", code)
}

/// Round to two decimals, ties to even (`0.125` → `0.12`, `0.135` → `0.14`).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Append one converted column per currency, in the order given.
///
/// Every currency is resolved before the table is touched, so a missing
/// rate leaves nothing half-converted. A column with the converted name
/// that already exists is overwritten.
pub fn apply_rates(
    mut table: Table,
    rates: &RateMap,
    base_column: &str,
    currencies: &[String],
) -> EtlResult<Table> {
    let base = table
        .column(base_column)
        .ok_or_else(|| EtlError::MissingBaseColumn {
            column: base_column.to_string(),
        })?
        .data
        .to_f64()
        .ok_or_else(|| EtlError::NonNumericBaseColumn {
            column: base_column.to_string(),
        })?;

    let resolved = currencies
        .iter()
        .map(|code| {
            rates
                .get(code)
                .map(|rate| (code, rate))
                .ok_or_else(|| EtlError::MissingCurrencyRate {
                    currency: code.clone(),
                })
        })
        .collect::<EtlResult<Vec<_>>>()?;

    for (code, rate) in resolved {
        let converted = base.iter().map(|v| v.map(|x| round2(x * rate))).collect();
        debug!(currency = %code, rate, "converting");
        put_column(&mut table, converted_column_name(code), ColumnData::Float(converted))?;
    }

    Ok(table)
}

fn put_column(table: &mut Table, name: String, data: ColumnData) -> EtlResult<()> {
    table
        .set_column(name.clone(), data)
        .map_err(|source| EtlError::ColumnMismatch {
            column: name,
            source,
        })
}

/// Convert `base_column` into every currency using rates read from
/// `rate_source`. An empty input comes back empty without any lookups.
#[instrument(level = "info", skip(table, trace), fields(rows = table.num_rows()))]
pub fn transform(
    table: Table,
    rate_source: &Path,
    base_column: &str,
    currencies: &[String],
    trace: &mut ProgressTrace,
) -> EtlResult<Table> {
    if table.is_empty() {
        trace.warn("Skipping transformation: input table is empty");
        return Ok(Table::empty());
    }

    let result = RateMap::load(rate_source)
        .and_then(|rates| apply_rates(table, &rates, base_column, currencies));

    match &result {
        Ok(_) => trace.info("Data transformed successfully"),
        Err(e) => trace.error(format!("Error during transformation: {}", e)),
    }
    result
}
