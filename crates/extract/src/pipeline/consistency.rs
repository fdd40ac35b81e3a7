use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::capability::Capabilities;
use crate::error::{ExtractError, Result};
use crate::normalizer;
use crate::progress::Progress;
use crate::schema::{ConsistencyResult, EntityRecord};

/// One conflict assessment per entity. Entities are independent; an
/// unusable reply for one of them is recorded and the pass continues.
pub struct ConsistencyPipeline<'a, C> {
    capabilities: &'a C,
}

impl<'a, C: Capabilities> ConsistencyPipeline<'a, C> {
    pub fn new(capabilities: &'a C) -> Self {
        Self { capabilities }
    }

    pub async fn run(
        &self,
        entities: &[EntityRecord],
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> Result<Vec<ConsistencyResult>> {
        progress.emit(format!("checking consistency of {} entities", entities.len()));
        let mut results = Vec::with_capacity(entities.len());

        for entity in entities {
            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                progress.emit("consistency check cancelled");
                return Err(ExtractError::Cancelled);
            }

            let result = self.check(entity).await?;
            progress.emit(format!(
                "entity {} ({}): conflict = {}",
                entity.name, entity.entity_id, result.conflict
            ));
            results.push(result);
        }

        progress.emit("consistency check done");
        Ok(results)
    }

    async fn check(&self, entity: &EntityRecord) -> Result<ConsistencyResult> {
        let serialized = match serde_json::to_string(entity) {
            Ok(json) => json,
            Err(e) => {
                warn!(entity_id = %entity.entity_id, error = %e, "entity serialization failed");
                return Ok(ConsistencyResult::failed(entity, e.to_string()));
            }
        };

        let reply = self
            .capabilities
            .check_entity_consistency(&serialized)
            .await
            .map_err(ExtractError::CapabilityUnavailable)?;

        Ok(parse_consistency(&reply, entity).unwrap_or_else(|e| {
            warn!(entity_id = %entity.entity_id, error = %e, "consistency output discarded");
            ConsistencyResult::failed(entity, e.to_string())
        }))
    }
}

/// Parse a `{"conflict": bool, ...}` reply; every other key becomes a detail.
pub fn parse_consistency(reply: &str, entity: &EntityRecord) -> Result<ConsistencyResult> {
    let unit = format!("entity {}", entity.entity_id);
    let mut details = normalizer::parse_json_object(reply, &unit)?;

    let conflict = match details.remove("conflict") {
        Some(Value::Bool(flag)) => flag,
        Some(other) => {
            let reason = format!("'conflict' must be a boolean, got {other}");
            return Err(ExtractError::parse(unit, reason));
        }
        None => return Err(ExtractError::parse(unit, "missing 'conflict' flag")),
    };

    Ok(ConsistencyResult {
        entity_id: entity.entity_id,
        entity_name: entity.name.clone(),
        conflict,
        details,
        error: None,
    })
}
