//! Scrape one HTML table, convert its market-cap column into other
//! currencies, and write the result to a CSV file and a DuckDB table.

pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod table;
pub mod trace;
pub mod transform;

pub use config::PipelineConfig;
pub use error::{ErrorKind, EtlError, EtlResult};
pub use pipeline::{run, RunOutcome, RunState};
pub use table::{Column, ColumnData, DataType, Table};
pub use trace::ProgressTrace;
