//! Probe Sink - export abstraction for probe time series
//!
//! A sink receives tables of (probe identity, time series) produced by
//! [`ProbeCollection::dump`](crate::ProbeCollection::dump) and writes them to
//! a backend. Dumps are local to one rank; combining the tables of all ranks
//! is up to whoever reads the output.
//!
//! # Sink Trait
//!
//! All sinks implement the `ProbeSink` trait:
//! - `write_table()` - Called once per dump with a named table
//! - `flush()` - Ensure buffered data is written
//! - `close()` - Clean shutdown (writes manifest)
//!
//! # Implementations
//!
//! - `FileSink` - JSON files to disk
//! - `MemorySink` - Keeps tables in memory
//! - `NullSink` - Discard output

pub mod file;

pub use file::{FileSink, FileSinkConfig};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Result type for sink operations
pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors that can occur during sink operations
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Sink configuration error: {0}")]
    Config(String),

    #[error("Sink already closed")]
    AlreadyClosed,
}

/// Recorded values of one probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Series {
    /// A single component, one scalar per evaluation.
    Component {
        index: usize,
        #[serde(with = "missing_as_null")]
        values: Vec<f64>,
    },
    /// Every component, one vector per evaluation.
    Full(#[serde(with = "missing_as_null::nested")] Vec<Vec<f64>>),
}

/// Missing entries (NaN) are written as `null` and read back as NaN.
///
/// JSON has no NaN, so without this a table holding a skipped evaluation
/// could be written but not loaded again.
mod missing_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    fn encode(value: f64) -> Option<f64> {
        if value.is_nan() {
            None
        } else {
            Some(value)
        }
    }

    fn decode(values: Vec<Option<f64>>) -> Vec<f64> {
        values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    }

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| encode(*v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Ok(decode(Vec::deserialize(deserializer)?))
    }

    pub mod nested {
        use super::*;

        pub fn serialize<S: Serializer>(
            rows: &[Vec<f64>],
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(
                rows.iter()
                    .map(|row| row.iter().map(|v| encode(*v)).collect::<Vec<_>>()),
            )
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<Vec<f64>>, D::Error> {
            let rows: Vec<Vec<Option<f64>>> = Vec::deserialize(deserializer)?;
            Ok(rows.into_iter().map(decode).collect())
        }
    }
}

impl Series {
    /// Number of evaluations in the series.
    pub fn len(&self) -> usize {
        match self {
            Series::Component { values, .. } => values.len(),
            Series::Full(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One row of a dump: a probe and its series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeRow {
    /// Global probe id
    pub id: usize,
    pub coordinates: Vec<f64>,
    pub series: Series,
}

/// Everything one rank dumps in one call, rows in local probe order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeTable {
    pub rank: usize,
    pub value_size: usize,
    pub evaluations: usize,
    pub rows: Vec<ProbeRow>,
}

/// Trait for probe data sinks
///
/// # Lifecycle
///
/// 1. Create sink with backend-specific configuration
/// 2. Call `write_table()` for every dump
/// 3. Call `flush()` to ensure data is written
/// 4. Call `close()` to finalize output
pub trait ProbeSink: Send {
    /// Write a table to the destination called `name`.
    fn write_table(&mut self, name: &str, table: ProbeTable) -> Result<()>;

    /// Flush any buffered data to backend
    fn flush(&mut self) -> Result<()>;

    /// Close the sink and finalize output. After close(), the sink must not be used.
    fn close(&mut self) -> Result<()>;

    /// Returns the output path where this sink is writing data, if any.
    fn output_path(&self) -> Option<std::path::PathBuf> {
        None
    }
}

/// Null sink - discards all data
pub struct NullSink;

impl ProbeSink for NullSink {
    fn write_table(&mut self, _name: &str, _table: ProbeTable) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Memory sink - keeps the latest table per destination name
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: IndexMap<String, ProbeTable>,
    is_closed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&ProbeTable> {
        self.tables.get(name)
    }

    /// Destination names in write order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn into_tables(self) -> IndexMap<String, ProbeTable> {
        self.tables
    }
}

impl ProbeSink for MemorySink {
    fn write_table(&mut self, name: &str, table: ProbeTable) -> Result<()> {
        if self.is_closed {
            return Err(SinkError::AlreadyClosed);
        }
        self.tables.insert(name.to_string(), table);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.is_closed = true;
        Ok(())
    }
}
