use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    pub index: usize,
    pub chunk_id: String,
    pub text: String,
    pub offset: (usize, usize), // [start, end) character positions
}

impl Chunk {
    pub fn new(doc_id: String, index: usize, text: String, offset: (usize, usize)) -> Self {
        let chunk_id = Self::generate_chunk_id(&doc_id, index, &text);

        Self {
            doc_id,
            index,
            chunk_id,
            text,
            offset,
        }
    }

    fn generate_chunk_id(doc_id: &str, index: usize, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(doc_id.as_bytes());
        hasher.update(index.to_string().as_bytes());
        hasher.update(text.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16]) // Use first 16 bytes (32 hex chars)
    }

    /// Length in characters, the unit the chunker measures in.
    pub fn char_len(&self) -> usize {
        self.offset.1 - self.offset.0
    }
}
