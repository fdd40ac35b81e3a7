//! Document pipelines.
//!
//! `Pipeline::run` drives one document through the selected pipeline under a
//! cooperative model: it yields once per chunk and once per entity and checks
//! the cancellation token at each of those points. `Pipeline::run_blocking`
//! drives the same code to completion on a private single-threaded runtime.

pub mod consistency;
pub mod correction;
pub mod extraction;
pub mod grammar;

use ingest::{Chunk, Chunker, ChunkerConfig, generate_doc_id};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::capability::Capabilities;
use crate::error::{ExtractError, Result};
use crate::progress::Progress;
use crate::schema::{ConsistencyResult, CorrectedChunk, EntityRecord, GrammarResult};

pub use consistency::ConsistencyPipeline;
pub use correction::CorrectionPipeline;
pub use extraction::{ExtractionPipeline, ExtractionState};
pub use grammar::GrammarPipeline;

/// Which pipeline a request runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// Extraction followed by per-entity conflict assessment.
    #[default]
    Consistency,
    /// Consistency, then a rewrite of every chunk against the flagged conflicts.
    Correction,
    /// Per-chunk grammar check.
    Grammar,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chunk_max_chars: usize,
    pub grammar_chunk_max_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_max_chars: ingest::chunker::DEFAULT_MAX_CHARS,
            grammar_chunk_max_chars: grammar::DEFAULT_GRAMMAR_CHUNK_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "pipeline", rename_all = "snake_case")]
pub enum PipelineReport {
    Consistency {
        /// Chunks the document was extracted from
        chunks: usize,
        entities: Vec<EntityRecord>,
        results: Vec<ConsistencyResult>,
    },
    Correction {
        entities: Vec<EntityRecord>,
        results: Vec<ConsistencyResult>,
        corrected: Vec<CorrectedChunk>,
    },
    Grammar {
        results: Vec<GrammarResult>,
    },
}

impl PipelineReport {
    pub fn kind(&self) -> PipelineKind {
        match self {
            Self::Consistency { .. } => PipelineKind::Consistency,
            Self::Correction { .. } => PipelineKind::Correction,
            Self::Grammar { .. } => PipelineKind::Grammar,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Completed,
            Err(e) if e.is_cancelled() => Self::Cancelled,
            Err(_) => Self::Failed,
        }
    }
}

pub struct Pipeline<C> {
    capabilities: C,
    config: PipelineConfig,
}

impl<C: Capabilities> Pipeline<C> {
    pub fn new(capabilities: C) -> Self {
        Self::with_config(capabilities, PipelineConfig::default())
    }

    pub fn with_config(capabilities: C, config: PipelineConfig) -> Self {
        Self {
            capabilities,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &C {
        &self.capabilities
    }

    pub fn chunks(&self, text: &str) -> Vec<String> {
        self.chunker().split(text)
    }

    /// Chunks with ids and offsets; the document id is derived from the text.
    pub fn document_chunks(&self, text: &str) -> Vec<Chunk> {
        self.chunker().chunk_document(&generate_doc_id(text), text)
    }

    fn chunker(&self) -> Chunker {
        Chunker::new(ChunkerConfig::with_max_chars(self.config.chunk_max_chars))
    }

    /// Run one document through `kind`.
    ///
    /// A cancelled run returns `ExtractError::Cancelled` and none of its
    /// partial state.
    pub async fn run(
        &self,
        kind: PipelineKind,
        text: &str,
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> Result<PipelineReport> {
        info!(pipeline = ?kind, chars = text.chars().count(), "pipeline started");
        progress.emit(format!("text length: {}", text.chars().count()));

        let report = match kind {
            PipelineKind::Consistency => {
                let chunks = self.chunks(text);
                let (entities, results) = self.extract_and_check(&chunks, cancel, progress).await?;
                PipelineReport::Consistency {
                    chunks: chunks.len(),
                    entities,
                    results,
                }
            }
            PipelineKind::Correction => {
                let chunks = self.document_chunks(text);
                let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
                let (entities, results) = self.extract_and_check(&texts, cancel, progress).await?;
                let corrected = CorrectionPipeline::new(&self.capabilities)
                    .run(&chunks, &results, cancel, progress)
                    .await?;
                PipelineReport::Correction {
                    entities,
                    results,
                    corrected,
                }
            }
            PipelineKind::Grammar => {
                let chunks = Chunker::new(ChunkerConfig::with_max_chars(
                    self.config.grammar_chunk_max_chars,
                ))
                .split(text);
                let results = GrammarPipeline::new(&self.capabilities)
                    .run(&chunks, cancel, progress)
                    .await?;
                PipelineReport::Grammar { results }
            }
        };

        info!(pipeline = ?kind, "pipeline finished");
        Ok(report)
    }

    /// Blocking, sequential execution of `run`. Never cancelled.
    ///
    /// Must not be called from inside an async runtime.
    pub fn run_blocking(&self, kind: PipelineKind, text: &str) -> Result<PipelineReport> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ExtractError::Runtime)?;

        runtime.block_on(self.run(kind, text, &CancellationToken::new(), &Progress::silent()))
    }

    async fn extract_and_check(
        &self,
        chunks: &[String],
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> Result<(Vec<EntityRecord>, Vec<ConsistencyResult>)> {
        progress.emit(format!("document split into {} chunks", chunks.len()));

        let mut extraction = ExtractionPipeline::new(&self.capabilities);
        extraction.run(chunks, cancel, progress).await?;
        let entities = extraction.into_store().into_records();

        let results = ConsistencyPipeline::new(&self.capabilities)
            .run(&entities, cancel, progress)
            .await?;

        Ok((entities, results))
    }
}
