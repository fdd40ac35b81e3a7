use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::capability::Capabilities;
use crate::error::{ExtractError, Result};
use crate::normalizer;
use crate::progress::Progress;
use crate::schema::GrammarResult;

pub const DEFAULT_GRAMMAR_CHUNK_CHARS: usize = 128;

/// Per-chunk grammar check; chunks are independent of each other.
pub struct GrammarPipeline<'a, C> {
    capabilities: &'a C,
}

impl<'a, C: Capabilities> GrammarPipeline<'a, C> {
    pub fn new(capabilities: &'a C) -> Self {
        Self { capabilities }
    }

    pub async fn run(
        &self,
        chunks: &[String],
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> Result<Vec<GrammarResult>> {
        progress.emit(format!("grammar check over {} chunks", chunks.len()));
        let mut results = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                progress.emit(format!("grammar check cancelled before chunk {}", index + 1));
                return Err(ExtractError::Cancelled);
            }

            let reply = self
                .capabilities
                .check_grammar(chunk)
                .await
                .map_err(ExtractError::CapabilityUnavailable)?;

            let result = parse_grammar(&reply, index, chunk).unwrap_or_else(|e| {
                warn!(chunk = index, error = %e, "grammar output discarded");
                GrammarResult {
                    index,
                    correct: None,
                    content: String::new(),
                    reason: String::new(),
                    original_text: chunk.clone(),
                    error: Some(e.to_string()),
                }
            });
            progress.emit(format!(
                "chunk {}/{}: correct = {:?}",
                index + 1,
                chunks.len(),
                result.correct
            ));
            results.push(result);
        }

        Ok(results)
    }
}

pub fn parse_grammar(reply: &str, index: usize, chunk: &str) -> Result<GrammarResult> {
    let unit = format!("chunk {index}");
    let map = normalizer::parse_json_object(reply, &unit)?;

    let correct = match map.get("correct") {
        Some(Value::Bool(flag)) => *flag,
        _ => return Err(ExtractError::parse(unit, "missing boolean 'correct'")),
    };
    let text_field = |key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Ok(GrammarResult {
        index,
        correct: Some(correct),
        content: text_field("content"),
        reason: text_field("reason"),
        original_text: chunk.to_string(),
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grammar_verdict() {
        let result = parse_grammar(
            r#"{"correct": false, "content": "在班会课上", "reason": "介宾结构误用"}"#,
            3,
            "在班会课时",
        )
        .unwrap();

        assert_eq!(result.correct, Some(false));
        assert_eq!(result.content, "在班会课上");
        assert_eq!(result.original_text, "在班会课时");
        assert_eq!(result.index, 3);
    }

    #[test]
    fn test_parse_grammar_requires_flag() {
        assert!(parse_grammar(r#"{"content": "x"}"#, 0, "x").is_err());
    }
}
