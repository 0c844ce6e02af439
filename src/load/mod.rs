// src/load/mod.rs

pub mod file;
pub mod store;

use std::path::Path;
use tracing::instrument;

use crate::error::EtlResult;
use crate::table::Table;
use crate::trace::ProgressTrace;

pub use file::{load_to_file, read_table_file};
pub use store::load_to_store;

/// Outcome of one attempt per sink.
#[derive(Debug)]
pub struct LoadReport {
    pub file: EtlResult<()>,
    pub store: EtlResult<()>,
}

impl LoadReport {
    pub fn all_ok(&self) -> bool {
        self.file.is_ok() && self.store.is_ok()
    }
}

/// Write `table` to the CSV file and to the database table. Both sinks are
/// always attempted, once each; each gets its own trace event.
#[instrument(level = "info", skip(table, trace), fields(rows = table.num_rows()))]
pub fn load(
    table: &Table,
    csv_path: &Path,
    db_path: &Path,
    table_name: &str,
    trace: &mut ProgressTrace,
) -> LoadReport {
    let file = load_to_file(table, csv_path);
    match &file {
        Ok(()) => trace.info(format!("Data saved to CSV at {}.", csv_path.display())),
        Err(e) => trace.error(format!("Error saving to CSV: {}", e)),
    }

    let store = load_to_store(table, db_path, table_name);
    match &store {
        Ok(()) => trace.info(format!(
            "Data saved to database table {} in {}.",
            table_name,
            db_path.display()
        )),
        Err(e) => trace.error(format!("Error saving to database: {}", e)),
    }

    LoadReport { file, store }
}
