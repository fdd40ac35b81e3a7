use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::capability::{Capabilities, CapabilityResult};
use crate::error::CapabilityError;
use crate::prompt;
use crate::session::{Role, SessionHistory};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen2.5";

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>, // "json" for structured output
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Free-form completion.
    pub async fn generate(&self, prompt: &str) -> CapabilityResult {
        self.send(prompt, None).await
    }

    /// Completion constrained to valid JSON.
    pub async fn generate_json(&self, prompt: &str) -> CapabilityResult {
        self.send(prompt, Some("json")).await
    }

    async fn send(&self, prompt: &str, format: Option<&str>) -> CapabilityResult {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            format,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CapabilityError::Unavailable(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CapabilityError::Unavailable(format!(
                "Ollama request failed: {}",
                response.status()
            )));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))?;

        Ok(ollama_response.response)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL.to_string(), DEFAULT_MODEL.to_string())
    }
}

/// Model-backed capabilities for one run.
///
/// Extraction calls share a capped conversation history, so build one of
/// these per run (or call `reset_history` between runs).
pub struct LlmCapabilities {
    client: OllamaClient,
    history: Mutex<SessionHistory>,
}

impl LlmCapabilities {
    pub fn new(client: OllamaClient, history: SessionHistory) -> Self {
        Self {
            client,
            history: Mutex::new(history),
        }
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }

    pub async fn reset_history(&self) {
        self.history.lock().await.clear();
    }
}

#[async_trait]
impl Capabilities for LlmCapabilities {
    async fn extract_entities(&self, context: &str) -> CapabilityResult {
        let mut history = self.history.lock().await;
        let prompt = prompt::build_extraction_prompt(&history.render(), context);

        let reply = self.client.generate_json(&prompt).await?;

        history.push(Role::User, context);
        history.push(Role::Assistant, reply.clone());
        Ok(reply)
    }

    async fn summarize_memory(&self, context: &str) -> CapabilityResult {
        let reply = self
            .client
            .generate(&prompt::build_memory_summary_prompt(context))
            .await?;
        Ok(reply.trim().to_string())
    }

    async fn check_entity_consistency(&self, entity_json: &str) -> CapabilityResult {
        self.client
            .generate_json(&prompt::build_consistency_prompt(entity_json))
            .await
    }

    async fn correct_text(&self, chunk: &str, conflicts: &str) -> CapabilityResult {
        self.client
            .generate(&prompt::build_correction_prompt(chunk, conflicts))
            .await
    }

    async fn check_grammar(&self, chunk: &str) -> CapabilityResult {
        self.client
            .generate_json(&prompt::build_grammar_prompt(chunk))
            .await
    }
}
