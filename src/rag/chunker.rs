//! Word-window text chunking.
//!
//! Documents are split on whitespace and cut into windows of `chunk_size`
//! words; consecutive windows share `chunk_overlap` words. Chunk ids are
//! derived from the source name and the position of the chunk inside that
//! source, so re-ingesting a file overwrites its own records and nothing else.
//! The sanitized name carries a digest of the raw name, so two files whose
//! names sanitize alike still get distinct ids.

use crate::types::{AppError, Chunk, Result};
use sha2::{Digest, Sha256};

/// Separator between the sanitized source name and the chunk position in ids.
pub const CHUNK_ID_SEPARATOR: &str = "#chunk-";

/// Splits text into overlapping word windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// Create a chunker.
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless `chunk_size > 0` and
    /// `chunk_overlap < chunk_size`; otherwise the window would never advance.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AppError::Configuration(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::Configuration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Split `text` into chunk strings. Whitespace-only text yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();

        if words.is_empty() {
            return Vec::new();
        }

        // A document that fits in one window is never split.
        if words.len() <= self.chunk_size {
            return vec![words.join(" ")];
        }

        let mut chunks = Vec::new();
        for start in (0..words.len()).step_by(self.step()) {
            let end = (start + self.chunk_size).min(words.len());
            let chunk = words[start..end].join(" ");
            if !chunk.trim().is_empty() {
                chunks.push(chunk);
            }
        }

        chunks
    }

    /// Split a document and attach ids and the source name.
    pub fn chunk_document(&self, source: &str, text: &str) -> Vec<Chunk> {
        self.chunk(text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                id: chunk_id(source, index),
                text,
                source: source.to_string(),
                index,
            })
            .collect()
    }
}

/// Replace characters that vector stores reject in ids.
pub fn sanitize_source(source: &str) -> String {
    source
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// First 8 hex digits of the SHA-256 of the raw source name.
fn source_digest(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(8);
    digest
}

/// Id prefix shared by every chunk of `source`: `{sanitized}-{digest}#chunk-`.
pub fn chunk_id_prefix(source: &str) -> String {
    format!(
        "{}-{}{}",
        sanitize_source(source),
        source_digest(source),
        CHUNK_ID_SEPARATOR
    )
}

/// Deterministic id of chunk `index` of `source`.
pub fn chunk_id(source: &str, index: usize) -> String {
    format!("{}{}", chunk_id_prefix(source), index)
}

/// Chunk position encoded in an id produced by [`chunk_id`].
pub fn chunk_index_from_id(id: &str) -> Option<usize> {
    id.rsplit_once(CHUNK_ID_SEPARATOR)
        .and_then(|(_, index)| index.parse().ok())
}
