pub mod chunk;
pub mod chunker;
pub mod reader;

pub use chunk::Chunk;
pub use chunker::{Chunker, ChunkerConfig, SENTENCE_TERMINATORS};
pub use reader::{FileReader, ReadError, read_document_text};

use sha2::{Digest, Sha256};

/// Generate a stable document ID from a path or label
pub fn generate_doc_id(label: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_is_stable() {
        assert_eq!(generate_doc_id("a.txt"), generate_doc_id("a.txt"));
        assert_ne!(generate_doc_id("a.txt"), generate_doc_id("b.txt"));
    }
}
