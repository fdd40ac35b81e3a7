use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::capability::Capabilities;
use crate::error::{ExtractError, Result};
use crate::normalizer;
use crate::progress::Progress;
use crate::schema::EntityRecord;
use crate::store::EntityStore;

pub const MEMORY_LABEL: &str = "prior summary:";
pub const CHUNK_LABEL: &str = "current chunk:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    Init,
    /// Chunk `chunk` and every chunk before it have been folded in.
    Processed { chunk: usize },
    Done,
}

/// Chunk-sequential extraction with a running memory.
///
/// Chunks are processed strictly in order: the memory fed into chunk `i` is
/// the summary produced from chunk `i - 1`'s input.
pub struct ExtractionPipeline<'a, C> {
    capabilities: &'a C,
    state: ExtractionState,
    store: EntityStore,
    memory: String,
}

impl<'a, C: Capabilities> ExtractionPipeline<'a, C> {
    pub fn new(capabilities: &'a C) -> Self {
        Self {
            capabilities,
            state: ExtractionState::Init,
            store: EntityStore::new(),
            memory: String::new(),
        }
    }

    pub fn state(&self) -> ExtractionState {
        self.state
    }

    pub fn memory(&self) -> &str {
        &self.memory
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn into_store(self) -> EntityStore {
        self.store
    }

    /// Process every remaining chunk.
    pub async fn run(
        &mut self,
        chunks: &[String],
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> Result<()> {
        while self.step(chunks, cancel, progress).await? != ExtractionState::Done {}
        Ok(())
    }

    /// Process the next chunk and return the new state.
    ///
    /// `chunks` must be the same sequence on every call.
    pub async fn step(
        &mut self,
        chunks: &[String],
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> Result<ExtractionState> {
        let i = match self.state {
            ExtractionState::Init => 0,
            ExtractionState::Processed { chunk } => chunk + 1,
            ExtractionState::Done => return Ok(ExtractionState::Done),
        };
        let total = chunks.len();

        let Some(chunk) = chunks.get(i) else {
            self.state = ExtractionState::Done;
            progress.emit(format!("extraction done: {} entities", self.store.len()));
            return Ok(self.state);
        };

        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            progress.emit(format!("extraction cancelled before chunk {}", i + 1));
            return Err(ExtractError::Cancelled);
        }

        let input = build_chunk_input(&self.memory, chunk);
        let reply = self
            .capabilities
            .extract_entities(&input)
            .await
            .map_err(ExtractError::CapabilityUnavailable)?;

        let entities = match parse_entities(&reply, &format!("chunk {i}")) {
            Ok(entities) => entities,
            Err(e) => {
                warn!(chunk = i, error = %e, "extraction output discarded");
                Vec::new()
            }
        };

        let count = entities.len();
        for entity in entities {
            if let Err(e) = self.store.add(entity) {
                warn!(chunk = i, error = %e, "entity dropped");
            }
        }
        progress.emit(format!("chunk {}/{}: extracted {} entities", i + 1, total, count));

        if i + 1 < total {
            self.memory = self
                .capabilities
                .summarize_memory(&input)
                .await
                .map_err(ExtractError::MemorySummary)?;
            debug!(chunk = i, memory = %self.memory, "running memory updated");
        }

        self.state = ExtractionState::Processed { chunk: i };
        Ok(self.state)
    }
}

/// The text handed to extraction and summarization for one chunk.
pub fn build_chunk_input(memory: &str, chunk: &str) -> String {
    if memory.is_empty() {
        chunk.to_string()
    } else {
        format!("{MEMORY_LABEL}{memory}\n{CHUNK_LABEL}{chunk}")
    }
}

/// Parse one extraction reply. A broken reply is an error for the whole
/// unit; individually invalid entities are dropped.
pub fn parse_entities(reply: &str, unit: &str) -> Result<Vec<EntityRecord>> {
    let items = normalizer::parse_json_array(reply, unit)?;

    Ok(items
        .iter()
        .filter_map(|item| match EntityRecord::from_value(item) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(unit, error = %e, "entity dropped");
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_chunk_input_is_raw() {
        assert_eq!(build_chunk_input("", "小明在北京工作。"), "小明在北京工作。");
    }

    #[test]
    fn test_later_chunk_input_is_memory_prefixed() {
        assert_eq!(
            build_chunk_input("小明在北京", "小明现在在上海出差。"),
            "prior summary:小明在北京\ncurrent chunk:小明现在在上海出差。"
        );
    }

    #[test]
    fn test_parse_drops_only_invalid_entities() {
        let reply = r#"[{"name": "小明", "type": "人物"}, {"type": "地点"}, {"name": "北京", "type": "地点"}]"#;
        let entities = parse_entities(reply, "chunk 0").unwrap();
        let names: Vec<_> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["小明", "北京"]);
    }

    #[test]
    fn test_parse_accepts_json_mode_shapes() {
        let single = r#"{"name":"小明","type":"人物","attributes":{"地点":"北京"}}"#;
        let entities = parse_entities(single, "chunk 0").unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].attributes["地点"], serde_json::json!("北京"));

        let wrapped = r#"{"result":[{"name":"小明","type":"人物"},{"name":"北京","type":"地点"}]}"#;
        assert_eq!(parse_entities(wrapped, "chunk 0").unwrap().len(), 2);
    }

    #[test]
    fn test_parse_rejects_broken_reply() {
        assert!(parse_entities("not json at all", "chunk 0").is_err());
    }
}
