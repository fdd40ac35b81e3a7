use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub boundary: BoundaryConfig,
    pub retry: RetryConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Turns of extraction history kept per run
    pub history_messages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub grammar_max_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryConfig {
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected text or json)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub output_dir: PathBuf,
    /// Directory `path` requests may read from; unset disables them
    pub document_root: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                base_url: extract::llm::DEFAULT_BASE_URL.to_string(),
                model: extract::llm::DEFAULT_MODEL.to_string(),
                history_messages: extract::session::DEFAULT_MAX_TURNS,
            },
            chunking: ChunkingConfig {
                max_chars: ingest::chunker::DEFAULT_MAX_CHARS,
                grammar_max_chars: extract::pipeline::grammar::DEFAULT_GRAMMAR_CHUNK_CHARS,
            },
            boundary: BoundaryConfig {
                request_timeout_secs: 60,
            },
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 500,
                max_backoff_ms: 5000,
            },
            server: ServerConfig {
                bind: "127.0.0.1:8000".to_string(),
                output_dir: PathBuf::from("./logs"),
                document_root: None,
                log_format: LogFormat::Text,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key);

        Ok(Self {
            llm: LlmConfig {
                base_url: get("CHUNKCHECK_LLM_BASE_URL").unwrap_or(defaults.llm.base_url),
                model: get("CHUNKCHECK_LLM_MODEL").unwrap_or(defaults.llm.model),
                history_messages: parse_or(
                    &get,
                    "CHUNKCHECK_HISTORY_MESSAGES",
                    defaults.llm.history_messages,
                )?,
            },
            chunking: ChunkingConfig {
                max_chars: parse_or(&get, "CHUNKCHECK_CHUNK_SIZE", defaults.chunking.max_chars)?,
                grammar_max_chars: parse_or(
                    &get,
                    "CHUNKCHECK_GRAMMAR_CHUNK_SIZE",
                    defaults.chunking.grammar_max_chars,
                )?,
            },
            boundary: BoundaryConfig {
                request_timeout_secs: parse_or(
                    &get,
                    "CHUNKCHECK_REQUEST_TIMEOUT_SECS",
                    defaults.boundary.request_timeout_secs,
                )?,
            },
            retry: RetryConfig {
                max_retries: parse_or(&get, "CHUNKCHECK_MAX_RETRIES", defaults.retry.max_retries)?,
                initial_backoff_ms: parse_or(
                    &get,
                    "CHUNKCHECK_INITIAL_BACKOFF_MS",
                    defaults.retry.initial_backoff_ms,
                )?,
                max_backoff_ms: parse_or(
                    &get,
                    "CHUNKCHECK_MAX_BACKOFF_MS",
                    defaults.retry.max_backoff_ms,
                )?,
            },
            server: ServerConfig {
                bind: get("CHUNKCHECK_BIND").unwrap_or(defaults.server.bind),
                output_dir: get("CHUNKCHECK_OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.server.output_dir),
                document_root: get("CHUNKCHECK_DOCUMENT_ROOT").map(PathBuf::from),
                log_format: parse_or(&get, "CHUNKCHECK_LOG_FORMAT", defaults.server.log_format)?,
            },
        })
    }

    pub fn pipeline_config(&self) -> extract::PipelineConfig {
        extract::PipelineConfig {
            chunk_max_chars: self.chunking.max_chars,
            grammar_chunk_max_chars: self.chunking.grammar_max_chars,
        }
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
    }
}
