//! Flat JSON snapshots of completed runs.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{ExtractError, Result};
use crate::pipeline::PipelineReport;
use crate::schema::{ConsistencyResult, CorrectedChunk, EntityRecord, GrammarResult};
use crate::store::EntityStore;

pub const ENTITIES_FILE: &str = "entities.json";
pub const CONSISTENCY_FILE: &str = "consistency_results.json";
pub const CORRECTIONS_FILE: &str = "corrected_chunks.json";
pub const GRAMMAR_FILE: &str = "grammar_results.json";

pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    /// Create the run directory if needed.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|source| io_error(&dir, source))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn write_entities(&self, entities: &[EntityRecord]) -> Result<PathBuf> {
        self.write_json(ENTITIES_FILE, entities).await
    }

    pub async fn write_consistency(&self, results: &[ConsistencyResult]) -> Result<PathBuf> {
        self.write_json(CONSISTENCY_FILE, results).await
    }

    pub async fn write_corrections(&self, corrected: &[CorrectedChunk]) -> Result<PathBuf> {
        self.write_json(CORRECTIONS_FILE, corrected).await
    }

    pub async fn write_grammar(&self, results: &[GrammarResult]) -> Result<PathBuf> {
        self.write_json(GRAMMAR_FILE, results).await
    }

    /// Write every file a report carries; returns the paths written.
    pub async fn write_report(&self, report: &PipelineReport) -> Result<Vec<PathBuf>> {
        let written = match report {
            PipelineReport::Consistency { entities, results, .. } => vec![
                self.write_entities(entities).await?,
                self.write_consistency(results).await?,
            ],
            PipelineReport::Correction {
                entities,
                results,
                corrected,
            } => vec![
                self.write_entities(entities).await?,
                self.write_consistency(results).await?,
                self.write_corrections(corrected).await?,
            ],
            PipelineReport::Grammar { results } => vec![self.write_grammar(results).await?],
        };

        tracing::info!(dir = %self.dir.display(), files = written.len(), "snapshot written");
        Ok(written)
    }

    async fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<PathBuf> {
        let path = self.dir.join(file);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json).await.map_err(|source| io_error(&path, source))?;
        Ok(path)
    }
}

/// Rebuild a store from an entity snapshot, re-adding records in order.
pub async fn load_entities(path: &Path) -> Result<EntityStore> {
    let json = fs::read_to_string(path).await.map_err(|source| io_error(path, source))?;
    let records: Vec<EntityRecord> = serde_json::from_str(&json)?;

    let mut store = EntityStore::new();
    for record in records {
        store.add(record)?;
    }
    Ok(store)
}

fn io_error(path: &Path, source: std::io::Error) -> ExtractError {
    ExtractError::SnapshotIo {
        path: path.display().to_string(),
        source,
    }
}
