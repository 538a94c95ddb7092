//! File-based probe sink (JSON format)
//!
//! Writes each dumped table to `<name>_rank<r>.json` inside a run directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use super::{ProbeSink, ProbeTable, Result, SinkError};

/// Manifest describing a probe dump run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeManifest {
    /// Unique run identifier (timestamp-based)
    pub run_id: String,

    /// Creation timestamp
    pub created_at: String,

    /// Rank that wrote this directory's tables
    pub rank: usize,

    /// Destination names written, in order
    pub tables: Vec<String>,
}

/// File-based sink configuration
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub output_dir: PathBuf,

    /// Run directory name. Defaults to a timestamp.
    pub run_id: Option<String>,

    /// Rank used in file names and the manifest
    pub rank: usize,
}

/// File-based probe sink (JSON format)
pub struct FileSink {
    config: FileSinkConfig,
    run_id: String,
    run_dir: PathBuf,
    manifest_path: PathBuf,
    written: Vec<String>,
    is_closed: bool,
}

impl FileSink {
    /// Create a new file sink
    pub fn new(config: FileSinkConfig) -> Result<Self> {
        let run_id = config
            .run_id
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y%m%d_%H%M%S").to_string());
        let run_dir = config.output_dir.join(&run_id);

        fs::create_dir_all(&run_dir).map_err(|e| {
            SinkError::Config(format!("Failed to create output directory: {}", e))
        })?;

        let manifest_path = run_dir.join(format!("manifest_rank{}.json", config.rank));

        Ok(Self {
            config,
            run_id,
            run_dir,
            manifest_path,
            written: Vec::new(),
            is_closed: false,
        })
    }

    /// Path a table named `name` is written to.
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.run_dir
            .join(format!("{}_rank{}.json", name, self.config.rank))
    }

    fn check_not_closed(&self) -> Result<()> {
        if self.is_closed {
            Err(SinkError::AlreadyClosed)
        } else {
            Ok(())
        }
    }
}

impl ProbeSink for FileSink {
    fn write_table(&mut self, name: &str, table: ProbeTable) -> Result<()> {
        self.check_not_closed()?;

        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(SinkError::Config(format!(
                "invalid destination name: {:?}",
                name
            )));
        }

        let json = serde_json::to_string_pretty(&table)
            .map_err(|e| SinkError::Serialization(e.to_string()))?;
        fs::write(self.table_path(name), json)?;

        if !self.written.iter().any(|n| n == name) {
            self.written.push(name.to_string());
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.check_not_closed()?;
        // File writes are synchronous, nothing to flush
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.is_closed {
            return Ok(());
        }

        let manifest = ProbeManifest {
            run_id: self.run_id.clone(),
            created_at: chrono::Local::now().to_rfc3339(),
            rank: self.config.rank,
            tables: self.written.clone(),
        };

        let manifest_json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| SinkError::Serialization(e.to_string()))?;

        fs::write(&self.manifest_path, manifest_json)?;

        self.is_closed = true;
        Ok(())
    }

    fn output_path(&self) -> Option<PathBuf> {
        Some(self.run_dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ProbeRow, Series};

    fn config(dir: &std::path::Path, rank: usize) -> FileSinkConfig {
        FileSinkConfig {
            output_dir: dir.to_path_buf(),
            run_id: Some("run".to_string()),
            rank,
        }
    }

    fn table(rank: usize) -> ProbeTable {
        ProbeTable {
            rank,
            value_size: 1,
            evaluations: 3,
            rows: vec![ProbeRow {
                id: 4,
                coordinates: vec![0.1, 0.2, 0.3],
                series: Series::Component {
                    index: 0,
                    values: vec![1.0, 2.0, 3.0],
                },
            }],
        }
    }

    #[test]
    fn test_file_sink_create() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(config(temp_dir.path(), 0)).unwrap();
        assert_eq!(sink.output_path(), Some(temp_dir.path().join("run")));
        assert!(temp_dir.path().join("run").is_dir());
    }

    #[test]
    fn test_file_sink_write_and_close() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(config(temp_dir.path(), 1)).unwrap();

        sink.write_table("p", table(1)).unwrap();
        sink.close().unwrap();

        let content = fs::read_to_string(temp_dir.path().join("run/p_rank1.json")).unwrap();
        let read_back: ProbeTable = serde_json::from_str(&content).unwrap();
        assert_eq!(read_back, table(1));

        let manifest_content = fs::read_to_string(&sink.manifest_path).unwrap();
        let manifest: ProbeManifest = serde_json::from_str(&manifest_content).unwrap();
        assert_eq!(manifest.run_id, "run");
        assert_eq!(manifest.rank, 1);
        assert_eq!(manifest.tables, vec!["p"]);
    }

    #[test]
    fn test_file_sink_rejects_use_after_close() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(config(temp_dir.path(), 0)).unwrap();
        sink.close().unwrap();

        assert!(matches!(
            sink.write_table("p", table(0)),
            Err(SinkError::AlreadyClosed)
        ));
        assert!(matches!(sink.flush(), Err(SinkError::AlreadyClosed)));
        sink.close().unwrap();
    }

    #[test]
    fn test_file_sink_rejects_path_names() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(config(temp_dir.path(), 0)).unwrap();
        assert!(matches!(
            sink.write_table("../p", table(0)),
            Err(SinkError::Config(_))
        ));
    }
}
