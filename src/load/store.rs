// src/load/store.rs

use anyhow::{bail, Result};
use duckdb::{types::Value, Connection, ToSql};
use std::{collections::HashSet, path::Path};
use tracing::debug;

use crate::error::{EtlError, EtlResult};
use crate::table::{ColumnData, Table};

/// Open the DuckDB database at `db_path` and replace `table_name` with
/// `table`. The connection is closed when this returns, on every path.
pub fn load_to_store(table: &Table, db_path: &Path, table_name: &str) -> EtlResult<()> {
    let mut conn = Connection::open(db_path).map_err(|source| EtlError::StoreConnectionFailure {
        path: db_path.to_path_buf(),
        source,
    })?;

    let rows = replace_table(&mut conn, table, table_name).map_err(|source| {
        EtlError::StoreWriteFailure {
            path: db_path.to_path_buf(),
            table: table_name.to_string(),
            source,
        }
    })?;
    debug!(table = table_name, rows, "replaced table");
    Ok(())
}

/// Drop-and-recreate `name` with `table`'s schema, then bulk insert its rows
/// through the appender. All of it commits together or not at all.
pub fn replace_table(conn: &mut Connection, table: &Table, name: &str) -> Result<usize> {
    if table.num_columns() == 0 {
        bail!("table has no columns");
    }
    // DuckDB identifiers compare case-insensitively
    let mut folded = HashSet::new();
    if let Some(clash) = table
        .column_names()
        .into_iter()
        .find(|n| !folded.insert(n.to_lowercase()))
    {
        bail!("column {:?} clashes with another column differing only in case", clash);
    }

    let tx = conn.transaction()?;
    tx.execute_batch(&create_table_sql(table, name))?;
    {
        let mut appender = tx.appender(name)?;
        for row in 0..table.num_rows() {
            let values: Vec<Value> = table
                .columns()
                .iter()
                .map(|c| sql_value(&c.data, row))
                .collect();
            let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
            appender.append_row(params.as_slice())?;
        }
        appender.flush()?;
    }
    tx.commit()?;
    Ok(table.num_rows())
}

/// `CREATE OR REPLACE TABLE "name" ("col" TYPE, ...)`
pub fn create_table_sql(table: &Table, name: &str) -> String {
    let cols = table
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.data.dtype().sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE OR REPLACE TABLE {} ({});", quote_ident(name), cols)
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn sql_value(data: &ColumnData, row: usize) -> Value {
    match data {
        ColumnData::Int(v) => v[row].map(Value::BigInt).unwrap_or(Value::Null),
        ColumnData::Float(v) => v[row].map(Value::Double).unwrap_or(Value::Null),
        ColumnData::Text(v) => v[row].clone().map(Value::Text).unwrap_or(Value::Null),
    }
}
