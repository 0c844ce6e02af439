// src/trace.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warn => "WARNING",
            Level::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub at: DateTime<Local>,
    pub level: Level,
    pub message: String,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Append-only record of one pipeline run.
///
/// Every event is kept in memory, mirrored to `tracing`, and, when the trace
/// was opened with [`ProgressTrace::daily_file`], appended to
/// `etl_log_YYYY-MM-DD.txt` in the log directory.
pub struct ProgressTrace {
    events: Vec<TraceEvent>,
    sink: Option<(PathBuf, BufWriter<File>)>,
}

impl ProgressTrace {
    /// Trace without a file sink; used by tests to capture events.
    pub fn in_memory() -> Self {
        Self {
            events: Vec::new(),
            sink: None,
        }
    }

    /// Open (or create) today's log file under `log_dir` in append mode.
    pub fn daily_file(log_dir: impl AsRef<Path>) -> Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)
            .with_context(|| format!("creating log directory {:?}", log_dir))?;
        let path = log_dir.join(daily_log_name(Local::now()));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {:?}", path))?;
        Ok(Self {
            events: Vec::new(),
            sink: Some((path, BufWriter::new(file))),
        })
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.record(Level::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.record(Level::Warn, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.record(Level::Error, message.into());
    }

    fn record(&mut self, level: Level, message: String) {
        match level {
            Level::Info => info!("{}", message),
            Level::Warn => warn!("{}", message),
            Level::Error => error!("{}", message),
        }

        let event = TraceEvent {
            at: Local::now(),
            level,
            message,
        };

        if let Some((path, writer)) = self.sink.as_mut() {
            // log write errors are reported, never propagated
            if let Err(e) = writeln!(writer, "{}", event).and_then(|_| writer.flush()) {
                error!(path = %path.display(), error = %e, "failed to append to log file");
            }
        }

        self.events.push(event);
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn messages(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.message.as_str()).collect()
    }

    /// True if any recorded message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.events.iter().any(|e| e.message.contains(needle))
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|(p, _)| p.as_path())
    }

    /// Flush and close the file sink, returning the captured events.
    pub fn finish(mut self) -> Result<Vec<TraceEvent>> {
        if let Some((path, mut writer)) = self.sink.take() {
            writer
                .flush()
                .with_context(|| format!("flushing log file {:?}", path))?;
        }
        Ok(self.events)
    }
}

/// `etl_log_2023-09-08.txt` for a run on that calendar day.
pub fn daily_log_name(now: DateTime<Local>) -> String {
    now.format("etl_log_%Y-%m-%d.txt").to_string()
}
