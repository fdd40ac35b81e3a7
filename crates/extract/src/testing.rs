//! Scripted capabilities for tests.
//!
//! Replies are queued per capability and consumed in call order; every call
//! is recorded so tests can assert on what the pipelines sent.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::capability::{Capabilities, CapabilityResult};
use crate::error::CapabilityError;

/// Record of a call made to the scripted capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityCall {
    Extract { input: String },
    Summarize { input: String },
    CheckConsistency { entity_json: String },
    Correct { chunk: String, conflicts: String },
    Grammar { chunk: String },
}

#[derive(Default)]
pub struct ScriptedCapabilities {
    extractions: Mutex<VecDeque<CapabilityResult>>,
    summaries: Mutex<VecDeque<CapabilityResult>>,
    /// Consistency replies by entity name
    consistency: Mutex<HashMap<String, String>>,
    corrections: Mutex<VecDeque<CapabilityResult>>,
    grammar: Mutex<VecDeque<CapabilityResult>>,
    /// Cancel this token once the given number of extractions has been served
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
    /// Same, counted in consistency checks
    cancel_after_checks: Mutex<Option<(usize, CancellationToken)>>,
    calls: Mutex<Vec<CapabilityCall>>,
}

impl ScriptedCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the reply for the next extraction call.
    pub fn with_extraction(self, reply: impl Into<String>) -> Self {
        self.extractions.lock().unwrap().push_back(Ok(reply.into()));
        self
    }

    pub fn with_extraction_error(self, error: CapabilityError) -> Self {
        self.extractions.lock().unwrap().push_back(Err(error));
        self
    }

    /// Queue the reply for the next summarization call.
    pub fn with_summary(self, reply: impl Into<String>) -> Self {
        self.summaries.lock().unwrap().push_back(Ok(reply.into()));
        self
    }

    pub fn with_summary_error(self, error: CapabilityError) -> Self {
        self.summaries.lock().unwrap().push_back(Err(error));
        self
    }

    /// Reply used when checking the entity called `name`.
    pub fn with_consistency(self, name: impl Into<String>, reply: impl Into<String>) -> Self {
        self.consistency.lock().unwrap().insert(name.into(), reply.into());
        self
    }

    pub fn with_correction(self, reply: impl Into<String>) -> Self {
        self.corrections.lock().unwrap().push_back(Ok(reply.into()));
        self
    }

    pub fn with_correction_error(self, error: CapabilityError) -> Self {
        self.corrections.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_grammar(self, reply: impl Into<String>) -> Self {
        self.grammar.lock().unwrap().push_back(Ok(reply.into()));
        self
    }

    /// Cancel `token` right after the `n`-th extraction reply is handed out.
    pub fn cancel_after_extractions(self, n: usize, token: CancellationToken) -> Self {
        *self.cancel_after.lock().unwrap() = Some((n, token));
        self
    }

    /// Cancel `token` right after the `n`-th consistency reply is handed out.
    pub fn cancel_after_consistency_checks(self, n: usize, token: CancellationToken) -> Self {
        *self.cancel_after_checks.lock().unwrap() = Some((n, token));
        self
    }

    pub fn calls(&self) -> Vec<CapabilityCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn extraction_inputs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CapabilityCall::Extract { input } => Some(input),
                _ => None,
            })
            .collect()
    }

    pub fn summary_inputs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CapabilityCall::Summarize { input } => Some(input),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: CapabilityCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn count(&self, pred: fn(&CapabilityCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn maybe_cancel(&self, trigger: &Mutex<Option<(usize, CancellationToken)>>, served: usize) {
        if let Some((n, token)) = trigger.lock().unwrap().as_ref() {
            if served >= *n {
                token.cancel();
            }
        }
    }
}

#[async_trait]
impl Capabilities for ScriptedCapabilities {
    async fn extract_entities(&self, context: &str) -> CapabilityResult {
        self.record(CapabilityCall::Extract {
            input: context.to_string(),
        });
        let reply = self
            .extractions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("[]".to_string()));

        let served = self.count(|c| matches!(c, CapabilityCall::Extract { .. }));
        self.maybe_cancel(&self.cancel_after, served);
        reply
    }

    async fn summarize_memory(&self, context: &str) -> CapabilityResult {
        self.record(CapabilityCall::Summarize {
            input: context.to_string(),
        });
        let n = self.count(|c| matches!(c, CapabilityCall::Summarize { .. }));
        self.summaries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("summary {n}")))
    }

    async fn check_entity_consistency(&self, entity_json: &str) -> CapabilityResult {
        self.record(CapabilityCall::CheckConsistency {
            entity_json: entity_json.to_string(),
        });
        let name = serde_json::from_str::<serde_json::Value>(entity_json)
            .ok()
            .and_then(|v| v.get("name").and_then(|n| n.as_str()).map(str::to_string))
            .unwrap_or_default();

        let reply = self
            .consistency
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .unwrap_or_else(|| r#"{"conflict": false}"#.to_string());

        let served = self.count(|c| matches!(c, CapabilityCall::CheckConsistency { .. }));
        self.maybe_cancel(&self.cancel_after_checks, served);
        Ok(reply)
    }

    async fn correct_text(&self, chunk: &str, conflicts: &str) -> CapabilityResult {
        self.record(CapabilityCall::Correct {
            chunk: chunk.to_string(),
            conflicts: conflicts.to_string(),
        });
        self.corrections
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(chunk.to_string()))
    }

    async fn check_grammar(&self, chunk: &str) -> CapabilityResult {
        self.record(CapabilityCall::Grammar {
            chunk: chunk.to_string(),
        });
        self.grammar.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(serde_json::json!({"correct": true, "content": chunk, "reason": ""}).to_string())
        })
    }
}
