use crate::chunk::Chunk;

/// Characters that end a sentence (CJK full-width and ASCII forms).
pub const SENTENCE_TERMINATORS: [char; 8] = ['。', '！', '？', '；', '.', ';', '?', '!'];

pub const DEFAULT_MAX_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Window size in characters.
    pub max_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl ChunkerConfig {
    pub fn with_max_chars(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

/// Splits text into windows of `max_chars` characters, cutting each window
/// after its last sentence terminator and carrying the tail into the next one.
///
/// Concatenating the output reproduces the input exactly.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn max_chars(&self) -> usize {
        self.config.max_chars.max(1)
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut carry: Vec<char> = Vec::new();

        for window in chars.chunks(self.max_chars()) {
            let mut buffer = std::mem::take(&mut carry);
            buffer.extend_from_slice(window);

            // The carry never holds a terminator, so any match lies in this window.
            match buffer.iter().rposition(|c| is_terminator(*c)) {
                Some(cut) => {
                    carry = buffer.split_off(cut + 1);
                    chunks.push(buffer.into_iter().collect());
                }
                None => chunks.push(buffer.into_iter().collect()),
            }
        }

        if !carry.is_empty() {
            chunks.push(carry.into_iter().collect());
        }

        chunks
    }

    /// Split and attach document-level metadata to each piece.
    pub fn chunk_document(&self, doc_id: &str, text: &str) -> Vec<Chunk> {
        let mut start = 0;

        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(index, piece)| {
                let end = start + piece.chars().count();
                let chunk = Chunk::new(doc_id.to_string(), index, piece, (start, end));
                start = end;
                chunk
            })
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

pub fn is_terminator(c: char) -> bool {
    SENTENCE_TERMINATORS.contains(&c)
}
