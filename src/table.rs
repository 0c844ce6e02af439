// src/table.rs

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Thousands-grouped number like `1,234,567.89`.
static GROUPED_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("valid regex"));

/// Plain decimal or scientific literal, no `inf`/`nan` words.
static PLAIN_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("valid regex")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Semantic type of a column, mapped onto the nearest store type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int,
    Float,
    Text,
}

impl DataType {
    pub fn sql_type(self) -> &'static str {
        match self {
            DataType::Int => "BIGINT",
            DataType::Float => "DOUBLE",
            DataType::Text => "VARCHAR",
        }
    }
}

/// Values of one column; `None` is a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DataType {
        match self {
            ColumnData::Int(_) => DataType::Int,
            ColumnData::Float(_) => DataType::Float,
            ColumnData::Text(_) => DataType::Text,
        }
    }

    /// Numeric view of the column, `None` for text columns.
    pub fn to_f64(&self) -> Option<Vec<Option<f64>>> {
        match self {
            ColumnData::Int(v) => Some(v.iter().map(|x| x.map(|i| i as f64)).collect()),
            ColumnData::Float(v) => Some(v.clone()),
            ColumnData::Text(_) => None,
        }
    }

    /// Text form of one cell as written to flat files.
    pub fn render(&self, row: usize) -> String {
        match self {
            ColumnData::Int(v) => v[row].map(|i| i.to_string()).unwrap_or_default(),
            ColumnData::Float(v) => v[row].map(|f| format!("{:.2}", f)).unwrap_or_default(),
            ColumnData::Text(v) => v[row].clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// Ordered named columns sharing one row count. Names are unique.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from header names and raw cell text, coercing each
    /// column to the narrowest type that holds every non-empty cell.
    ///
    /// Short rows are padded with missing cells; a row longer than the
    /// header is rejected. Duplicate header names get `.1`, `.2`, ... suffixes.
    pub fn from_records(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let width = headers.len();
        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(rows.len()); width];

        for (i, row) in rows.into_iter().enumerate() {
            if row.len() > width {
                bail!("row {} has {} cells, header has {}", i, row.len(), width);
            }
            let mut it = row.into_iter();
            for col in cells.iter_mut() {
                col.push(it.next().and_then(|raw| clean_cell(&raw)));
            }
        }

        let mut table = Table::empty();
        for (name, col) in dedupe_names(headers).into_iter().zip(cells) {
            table.columns.push(Column {
                name,
                data: infer_column(col),
            });
        }
        Ok(table)
    }

    /// Zero columns or zero rows.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.num_rows() == 0
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Append `data` as column `name`, or replace the column already
    /// carrying that name in place.
    pub fn set_column(&mut self, name: impl Into<String>, data: ColumnData) -> Result<()> {
        let name = name.into();
        if !self.columns.is_empty() && data.len() != self.num_rows() {
            bail!(
                "column {:?} has {} values, table has {} rows",
                name,
                data.len(),
                self.num_rows()
            );
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.data = data,
            None => self.columns.push(Column { name, data }),
        }
        Ok(())
    }

    /// Rendered cells of one row, in column order.
    pub fn render_row(&self, row: usize) -> Vec<String> {
        self.columns.iter().map(|c| c.data.render(row)).collect()
    }
}

/// Trim and collapse internal whitespace; blank cells become `None`.
pub fn clean_cell(raw: &str) -> Option<String> {
    let collapsed = WHITESPACE.replace_all(raw.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

/// Strip thousands separators if `s` looks like a number, else `None`.
fn numeric_literal(s: &str) -> Option<String> {
    if GROUPED_NUMBER.is_match(s) {
        Some(s.replace(',', ""))
    } else if PLAIN_NUMBER.is_match(s) {
        Some(s.to_string())
    } else {
        None
    }
}

/// Pick Int, then Float, then Text for a column of cleaned cells.
/// An all-missing column stays Text.
pub fn infer_column(cells: Vec<Option<String>>) -> ColumnData {
    if cells.iter().all(Option::is_none) {
        return ColumnData::Text(cells);
    }

    let literals: Option<Vec<Option<String>>> = cells
        .iter()
        .map(|c| match c {
            None => Some(None),
            Some(s) => numeric_literal(s).map(Some),
        })
        .collect();

    let Some(literals) = literals else {
        return ColumnData::Text(cells);
    };

    let ints: Option<Vec<Option<i64>>> = literals
        .iter()
        .map(|c| match c {
            None => Some(None),
            Some(s) => s.parse::<i64>().ok().map(Some),
        })
        .collect();
    if let Some(ints) = ints {
        return ColumnData::Int(ints);
    }

    let floats: Option<Vec<Option<f64>>> = literals
        .iter()
        .map(|c| match c {
            None => Some(None),
            Some(s) => s.parse::<f64>().ok().map(Some),
        })
        .collect();
    match floats {
        Some(floats) => ColumnData::Float(floats),
        None => ColumnData::Text(cells),
    }
}

fn dedupe_names(headers: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(headers.len());
    for h in headers {
        let mut name = clean_cell(&h).unwrap_or_else(|| format!("Unnamed: {}", out.len()));
        let mut count = counts.get(&name).copied().unwrap_or(0);
        // suffixed names can collide with real headers
        while count > 0 {
            counts.insert(name.clone(), count + 1);
            name = format!("{}.{}", name, count);
            count = counts.get(&name).copied().unwrap_or(0);
        }
        counts.insert(name.clone(), count + 1);
        out.push(name);
    }
    out
}
