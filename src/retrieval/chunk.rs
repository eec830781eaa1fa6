//! Ingestion-time text splitting.
//!
//! Long documents are cut into overlapping chunks before they are stored,
//! preferring paragraph, line and word boundaries over mid-word cuts.

use serde_json::Value;

use crate::core::Document;

/// Default maximum chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 4000;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Boundaries tried in order when looking for a cut point.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Splits `text` into chunks of at most `chunk_size` characters.
///
/// Consecutive chunks share up to `overlap` characters. An `overlap` of
/// `chunk_size` or more is clamped to half the chunk size.
#[must_use]
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = if overlap >= chunk_size {
        chunk_size / 2
    } else {
        overlap
    };

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    if chars.len() <= chunk_size {
        return if text.trim().is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        };
    }

    let byte_at = |i: usize| chars.get(i).map_or(text.len(), |(b, _)| *b);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            find_cut(text, byte_at(start), byte_at(hard_end))
                .map_or(hard_end, |byte| chars.partition_point(|(b, _)| *b < byte))
        };

        let piece = text[byte_at(start)..byte_at(end)].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}

/// Returns the byte offset just after the last separator in `text[from..to]`,
/// ignoring cuts that would leave the chunk less than half full.
fn find_cut(text: &str, from: usize, to: usize) -> Option<usize> {
    let window = &text[from..to];
    let min = window.len() / 2;
    SEPARATORS.iter().find_map(|sep| {
        window
            .rfind(sep)
            .map(|pos| pos + sep.len())
            .filter(|&cut| cut > min)
            .map(|cut| from + cut)
    })
}

/// Splits every oversized document into chunk documents.
///
/// Chunk identities are `<parent id>-<n>`, and each chunk's metadata gains a
/// zero-based `chunk` index. Documents that fit are returned unchanged.
#[must_use]
pub fn chunk_documents(docs: Vec<Document>, chunk_size: usize, overlap: usize) -> Vec<Document> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        if doc.content.chars().count() <= chunk_size {
            out.push(doc);
            continue;
        }
        for (n, piece) in split_text(&doc.content, chunk_size, overlap)
            .into_iter()
            .enumerate()
        {
            let mut metadata = doc.metadata.clone();
            metadata.insert("chunk".to_string(), Value::from(n));
            out.push(Document::with_id(format!("{}-{n}", doc.id), piece, metadata));
        }
    }
    out
}
