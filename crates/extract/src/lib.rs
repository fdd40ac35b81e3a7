//! Incremental entity extraction, consistency checking and correction for
//! long documents.
//!
//! A document is chunked, each chunk is sent through entity extraction with
//! a running summary of everything before it, and the results are merged
//! into one `EntityStore` keyed by entity name. Each merged entity is then
//! checked for internal conflicts, and flagged conflicts can be fed back to
//! rewrite the text.

pub mod capability;
pub mod error;
pub mod llm;
pub mod normalizer;
pub mod pipeline;
pub mod progress;
pub mod prompt;
pub mod schema;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod testing;

pub use capability::{Capabilities, CapabilityResult};
pub use error::{CapabilityError, ExtractError, Result};
pub use llm::{LlmCapabilities, OllamaClient};
pub use pipeline::{Pipeline, PipelineConfig, PipelineKind, PipelineReport, RunStatus};
pub use progress::Progress;
pub use schema::{ConsistencyResult, CorrectedChunk, EntityRecord, GrammarResult};
pub use session::SessionHistory;
pub use snapshot::SnapshotWriter;
pub use store::EntityStore;

pub use tokio_util::sync::CancellationToken;
