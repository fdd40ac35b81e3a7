use ingest::Chunk;
use tokio_util::sync::CancellationToken;

use crate::capability::Capabilities;
use crate::error::{ExtractError, Result};
use crate::progress::Progress;
use crate::schema::{ConsistencyResult, CorrectedChunk};

/// Rewrites every chunk with the full list of flagged conflicts as context.
pub struct CorrectionPipeline<'a, C> {
    capabilities: &'a C,
}

impl<'a, C: Capabilities> CorrectionPipeline<'a, C> {
    pub fn new(capabilities: &'a C) -> Self {
        Self { capabilities }
    }

    pub async fn run(
        &self,
        chunks: &[Chunk],
        results: &[ConsistencyResult],
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> Result<Vec<CorrectedChunk>> {
        let conflicts = conflict_context(results)?;
        progress.emit(format!(
            "correcting {} chunks against {} conflicts",
            chunks.len(),
            results.iter().filter(|r| r.conflict).count()
        ));

        let mut corrected = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                progress.emit(format!("correction cancelled before chunk {}", chunk.index + 1));
                return Err(ExtractError::Cancelled);
            }

            let corrected_text = self
                .capabilities
                .correct_text(&chunk.text, &conflicts)
                .await
                .map_err(ExtractError::CapabilityUnavailable)?;

            progress.emit(format!("chunk {}/{} corrected", chunk.index + 1, chunks.len()));
            corrected.push(CorrectedChunk {
                index: chunk.index,
                chunk_id: chunk.chunk_id.clone(),
                offset: chunk.offset,
                original_text: chunk.text.clone(),
                corrected_text,
            });
        }

        Ok(corrected)
    }
}

/// JSON array of the results whose conflict flag is set.
pub fn conflict_context(results: &[ConsistencyResult]) -> Result<String> {
    let flagged: Vec<&ConsistencyResult> = results.iter().filter(|r| r.conflict).collect();
    Ok(serde_json::to_string_pretty(&flagged)?)
}

/// The corrected document: corrected chunks joined in order.
pub fn corrected_document(chunks: &[CorrectedChunk]) -> String {
    chunks.iter().map(|c| c.corrected_text.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityRecord;

    #[test]
    fn test_context_lists_only_conflicts() {
        let a = EntityRecord::new("小明", "人物");
        let b = EntityRecord::new("北京", "地点");
        let mut flagged = ConsistencyResult::failed(&a, "x");
        flagged.conflict = true;
        flagged.error = None;
        let clean = ConsistencyResult::failed(&b, "y");

        let context = conflict_context(&[flagged, clean]).unwrap();
        assert!(context.contains("小明"));
        assert!(!context.contains("北京"));
    }

    #[test]
    fn test_corrected_document_preserves_order() {
        let chunks = vec![
            CorrectedChunk {
                index: 0,
                chunk_id: "c0".into(),
                offset: (0, 1),
                original_text: "a".into(),
                corrected_text: "A".into(),
            },
            CorrectedChunk {
                index: 1,
                chunk_id: "c1".into(),
                offset: (1, 2),
                original_text: "b".into(),
                corrected_text: "B".into(),
            },
        ];
        assert_eq!(corrected_document(&chunks), "AB");
    }
}
