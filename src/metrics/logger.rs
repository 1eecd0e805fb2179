use super::MetricsSnapshot;
use crate::graph::NeighborGraph;
use anyhow::{Context, Result};
use csv::Writer;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Streams one run's output as ticks complete: every tick graph as a JSON
/// line and every diagnostics row as CSV. Rows are flushed per tick so an
/// interrupted run still leaves its finished ticks on disk.
pub struct RunRecorder {
    graphs: BufWriter<File>,
    rows: Writer<File>,
    graph_path: PathBuf,
    csv_path: PathBuf,
}

impl RunRecorder {
    /// Creates `<dir>/<stem>_graphs.jsonl` and `<dir>/<stem>.csv`.
    pub fn create(dir: impl AsRef<Path>, stem: &str) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let graph_path = dir.join(format!("{}_graphs.jsonl", stem));
        let csv_path = dir.join(format!("{}.csv", stem));
        let graphs = BufWriter::new(File::create(&graph_path)?);
        let rows = Writer::from_path(&csv_path)?;

        Ok(Self { graphs, rows, graph_path, csv_path })
    }

    pub fn record(&mut self, graph: &NeighborGraph, row: &MetricsSnapshot) -> Result<()> {
        serde_json::to_writer(&mut self.graphs, graph)?;
        self.graphs.write_all(b"\n")?;
        self.graphs.flush()?;

        self.rows.serialize(row)?;
        self.rows.flush()?;
        Ok(())
    }

    pub fn graph_path(&self) -> &Path {
        &self.graph_path
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn finish(mut self) -> Result<()> {
        self.graphs.flush()?;
        self.rows.flush()?;
        Ok(())
    }
}
