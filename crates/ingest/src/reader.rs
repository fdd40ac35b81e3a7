use std::path::Path;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub struct FileReader;

impl FileReader {
    pub async fn read_file(path: &Path) -> Result<String, ReadError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match extension {
            "txt" | "md" => fs::read_to_string(path).await.map_err(|source| ReadError::Io {
                path: path.display().to_string(),
                source,
            }),
            _ => Err(ReadError::UnsupportedFormat(extension.to_string())),
        }
    }
}

/// Best-effort document text: any read failure is logged and yields "".
pub async fn read_document_text(path: &Path) -> String {
    match FileReader::read_file(path).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "document text extraction failed");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "小明在北京工作。").unwrap();

        assert_eq!(FileReader::read_file(&path).await.unwrap(), "小明在北京工作。");
    }

    #[tokio::test]
    async fn rejects_unsupported_format() {
        let err = FileReader::read_file(Path::new("report.pdf")).await.unwrap_err();
        assert!(matches!(err, ReadError::UnsupportedFormat(ext) if ext == "pdf"));
    }

    #[tokio::test]
    async fn best_effort_read_yields_empty_text() {
        assert_eq!(read_document_text(Path::new("missing.txt")).await, "");
        assert_eq!(read_document_text(Path::new("report.docx")).await, "");
    }
}
