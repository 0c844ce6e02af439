// src/load/file.rs

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::{fs, path::Path};
use tempfile::NamedTempFile;

use crate::error::{EtlError, EtlResult};
use crate::table::Table;

/// Write `table` as CSV to `path`, replacing whatever was there.
pub fn load_to_file(table: &Table, path: &Path) -> EtlResult<()> {
    write_csv(table, path).map_err(|source| EtlError::FileWriteFailure {
        path: path.to_path_buf(),
        source,
    })
}

fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&dir).with_context(|| format!("creating {:?}", dir))?;

    // Write to a tmp file beside the target, then rename over it; the tmp
    // file is removed on drop if anything fails first
    let mut tmp = NamedTempFile::new_in(&dir)
        .with_context(|| format!("creating tmp file in {:?}", dir))?;
    {
        let mut wtr = WriterBuilder::new().from_writer(&mut tmp);
        if table.num_columns() > 0 {
            wtr.write_record(table.column_names())?;
            for row in 0..table.num_rows() {
                wtr.write_record(table.render_row(row))?;
            }
        }
        wtr.flush()
            .with_context(|| format!("flushing tmp file for {:?}", path))?;
    }

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("renaming tmp file -> {:?}", path))?;
    Ok(())
}

/// Read a CSV written by [`load_to_file`] back into a [`Table`], applying
/// the same cell coercion as HTML extraction.
pub fn read_table_file(path: &Path) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {:?}", path))?;
    let headers = rdr
        .headers()
        .with_context(|| format!("reading header of {:?}", path))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.with_context(|| format!("reading {:?}", path))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Table::from_records(headers, rows)
}
