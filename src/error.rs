// src/error.rs

use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Stable tag for each failure a stage can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TransportFailure,
    NoMatchingTable,
    ParseFailure,
    MissingBaseColumn,
    NonNumericBaseColumn,
    MissingRateSource,
    MalformedRateSource,
    MissingCurrencyRate,
    ColumnMismatch,
    FileWriteFailure,
    StoreConnectionFailure,
    StoreWriteFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::TransportFailure => "transport failure",
            ErrorKind::NoMatchingTable => "no matching table",
            ErrorKind::ParseFailure => "parse failure",
            ErrorKind::MissingBaseColumn => "missing base column",
            ErrorKind::NonNumericBaseColumn => "non-numeric base column",
            ErrorKind::MissingRateSource => "missing rate source",
            ErrorKind::MalformedRateSource => "malformed rate source",
            ErrorKind::MissingCurrencyRate => "missing currency rate",
            ErrorKind::ColumnMismatch => "column mismatch",
            ErrorKind::FileWriteFailure => "file write failure",
            ErrorKind::StoreConnectionFailure => "store connection failure",
            ErrorKind::StoreWriteFailure => "store write failure",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("fetching {locator} failed: {reason}")]
    TransportFailure { locator: String, reason: String },

    #[error("no table matching {filter} in {locator}")]
    NoMatchingTable { locator: String, filter: String },

    #[error("could not parse table from {locator}: {reason}")]
    ParseFailure { locator: String, reason: String },

    #[error("column {column:?} not found")]
    MissingBaseColumn { column: String },

    #[error("column {column:?} is not numeric")]
    NonNumericBaseColumn { column: String },

    #[error("rate source {} unavailable: {reason}", .path.display())]
    MissingRateSource { path: PathBuf, reason: String },

    #[error("rate source {} malformed: {reason}", .path.display())]
    MalformedRateSource { path: PathBuf, reason: String },

    #[error("no exchange rate for currency {currency:?}")]
    MissingCurrencyRate { currency: String },

    #[error("cannot set column {column:?}: {source}")]
    ColumnMismatch {
        column: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("writing {}: {source}", .path.display())]
    FileWriteFailure {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("opening database {}: {source}", .path.display())]
    StoreConnectionFailure {
        path: PathBuf,
        #[source]
        source: duckdb::Error,
    },

    #[error("writing table {table} in {}: {source}", .path.display())]
    StoreWriteFailure {
        path: PathBuf,
        table: String,
        #[source]
        source: anyhow::Error,
    },
}

impl EtlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EtlError::TransportFailure { .. } => ErrorKind::TransportFailure,
            EtlError::NoMatchingTable { .. } => ErrorKind::NoMatchingTable,
            EtlError::ParseFailure { .. } => ErrorKind::ParseFailure,
            EtlError::MissingBaseColumn { .. } => ErrorKind::MissingBaseColumn,
            EtlError::NonNumericBaseColumn { .. } => ErrorKind::NonNumericBaseColumn,
            EtlError::MissingRateSource { .. } => ErrorKind::MissingRateSource,
            EtlError::MalformedRateSource { .. } => ErrorKind::MalformedRateSource,
            EtlError::MissingCurrencyRate { .. } => ErrorKind::MissingCurrencyRate,
            EtlError::ColumnMismatch { .. } => ErrorKind::ColumnMismatch,
            EtlError::FileWriteFailure { .. } => ErrorKind::FileWriteFailure,
            EtlError::StoreConnectionFailure { .. } => ErrorKind::StoreConnectionFailure,
            EtlError::StoreWriteFailure { .. } => ErrorKind::StoreWriteFailure,
        }
    }
}

pub type EtlResult<T> = std::result::Result<T, EtlError>;
