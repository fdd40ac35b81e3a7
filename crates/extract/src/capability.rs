//! The text-generation boundary the pipelines call through.
//!
//! Every capability takes text and returns the model's raw reply. Parsing
//! and validation of structured replies happen in the pipelines.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::CapabilityError;

pub type CapabilityResult = std::result::Result<String, CapabilityError>;

#[async_trait]
pub trait Capabilities: Send + Sync {
    /// Entity-shaped records for one chunk input, as a JSON array.
    async fn extract_entities(&self, context: &str) -> CapabilityResult;

    /// Summary of the entity-relevant content of one chunk input.
    async fn summarize_memory(&self, context: &str) -> CapabilityResult;

    /// Conflict assessment for one serialized entity, as a JSON object.
    async fn check_entity_consistency(&self, entity_json: &str) -> CapabilityResult;

    /// Rewrite of one chunk that resolves the given conflicts.
    async fn correct_text(&self, chunk: &str, conflicts: &str) -> CapabilityResult;

    /// Grammar verdict for one chunk, as a JSON object.
    async fn check_grammar(&self, chunk: &str) -> CapabilityResult;
}

#[async_trait]
impl<T: Capabilities + ?Sized> Capabilities for Arc<T> {
    async fn extract_entities(&self, context: &str) -> CapabilityResult {
        (**self).extract_entities(context).await
    }

    async fn summarize_memory(&self, context: &str) -> CapabilityResult {
        (**self).summarize_memory(context).await
    }

    async fn check_entity_consistency(&self, entity_json: &str) -> CapabilityResult {
        (**self).check_entity_consistency(entity_json).await
    }

    async fn correct_text(&self, chunk: &str, conflicts: &str) -> CapabilityResult {
        (**self).correct_text(chunk, conflicts).await
    }

    async fn check_grammar(&self, chunk: &str) -> CapabilityResult {
        (**self).check_grammar(chunk).await
    }
}
