//! HTTP service and batch CLI around the consistency pipelines.

pub mod boundary;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod tasks;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use extract::{
    LlmCapabilities, OllamaClient, Pipeline, PipelineReport, SessionHistory, SnapshotWriter,
};

use boundary::BoundedCapabilities;
use config::AppConfig;
use retry::RetryPolicy;

pub type BoundedPipeline = Pipeline<BoundedCapabilities<LlmCapabilities>>;

/// A pipeline for one run: fresh session history, bounded capability calls.
pub fn build_pipeline(config: &AppConfig) -> BoundedPipeline {
    let client = OllamaClient::new(config.llm.base_url.clone(), config.llm.model.clone());
    let history = SessionHistory::new(config.llm.history_messages);
    let capabilities = LlmCapabilities::new(client, history);
    let bounded = BoundedCapabilities::new(
        capabilities,
        Duration::from_secs(config.boundary.request_timeout_secs),
        RetryPolicy::from_config(&config.retry),
    );
    Pipeline::with_config(bounded, config.pipeline_config())
}

/// Resolve a client-supplied document path inside `root`.
///
/// Both sides are canonicalized, so `..` segments and symlinks cannot leave
/// the root. With no root configured every path is refused.
pub async fn confine_document_path(root: Option<&Path>, requested: &str) -> Result<PathBuf> {
    let root = root.context("document paths are disabled (no document root configured)")?;
    let root = tokio::fs::canonicalize(root)
        .await
        .with_context(|| format!("document root {} is not accessible", root.display()))?;

    let candidate = root.join(requested);
    let resolved = tokio::fs::canonicalize(&candidate)
        .await
        .with_context(|| format!("document {requested} not found"))?;

    if !resolved.starts_with(&root) {
        anyhow::bail!("document {requested} is outside the document root");
    }
    Ok(resolved)
}

/// Write a completed run's snapshot files under `output_dir/run_id`.
pub async fn persist_report(
    output_dir: &Path,
    run_id: &str,
    report: &PipelineReport,
) -> Result<Vec<PathBuf>> {
    let writer = SnapshotWriter::create(output_dir.join(run_id))
        .await
        .with_context(|| format!("failed to create snapshot directory for run {run_id}"))?;
    writer
        .write_report(report)
        .await
        .with_context(|| format!("failed to write snapshots to {}", writer.dir().display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::EntityRecord;

    #[tokio::test]
    async fn test_persist_report_writes_under_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let report = PipelineReport::Consistency {
            chunks: 1,
            entities: vec![EntityRecord::new("小明", "人物")],
            results: Vec::new(),
        };

        let written = persist_report(dir.path(), "run-1", &report).await.unwrap();
        assert!(!written.is_empty());
        assert!(written.iter().all(|p| p.starts_with(dir.path().join("run-1"))));
    }

    #[tokio::test]
    async fn test_document_inside_root_is_resolved() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("novel.txt"), "小明在北京工作。").unwrap();

        let resolved = confine_document_path(Some(root.path()), "novel.txt").await.unwrap();
        assert!(resolved.ends_with("novel.txt"));
    }

    #[tokio::test]
    async fn test_document_outside_root_is_refused() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secrets.md");
        std::fs::write(&secret, "DB_PASSWORD=hunter2.").unwrap();

        let absolute = secret.to_string_lossy().to_string();
        assert!(confine_document_path(Some(root.path()), &absolute).await.is_err());

        let dir_name = outside.path().file_name().unwrap().to_string_lossy().to_string();
        let relative = format!("../{dir_name}/secrets.md");
        assert!(confine_document_path(Some(root.path()), &relative).await.is_err());
    }

    #[tokio::test]
    async fn test_documents_refused_without_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("novel.txt");
        std::fs::write(&file, "text").unwrap();
        assert!(confine_document_path(None, &file.to_string_lossy()).await.is_err());
    }

    #[test]
    fn test_build_pipeline_uses_configured_chunk_size() {
        let mut config = AppConfig::default();
        config.chunking.max_chars = 10;
        let pipeline = build_pipeline(&config);
        assert_eq!(pipeline.config().chunk_max_chars, 10);
    }
}
