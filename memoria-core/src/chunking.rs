//! Deterministic, separator-respecting text chunker (spec §4.1). Pure and
//! side-effect free: no I/O, no suspension points.

use crate::config::ChunkingConfig;

/// One chunk of a longer text, with byte offsets into the (whitespace
/// normalized) input.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub index: usize,
}

pub struct TextChunker {
    config: ChunkingConfig,
}

impl TextChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Split `text` into ordered, overlapping chunks. Indices are dense from 0.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        let pieces: Vec<String> =
            if normalized.len() <= self.config.chunk_size && normalized.len() >= self.config.min_chunk_size {
                vec![normalized.clone()]
            } else {
                split_recursive(&normalized, &self.config, 0)
            };

        let kept: Vec<String> = pieces
            .into_iter()
            .filter(|c| c.len() >= self.config.min_chunk_size)
            .collect();

        assign_offsets(&normalized, kept)
    }

    /// Whether `content` is long enough to require chunking at all (spec §4.4
    /// `store`: "if `|content| > chunk_size`").
    pub fn needs_chunking(&self, content: &str) -> bool {
        content.len() > self.config.chunk_size
    }

    /// Capacity-planning helper: `ceil(|text| / (chunk_size - chunk_overlap))`.
    pub fn estimate_chunk_count(&self, text_len: usize) -> usize {
        let denom = self
            .config
            .chunk_size
            .saturating_sub(self.config.chunk_overlap)
            .max(1);
        text_len.div_ceil(denom)
    }
}

fn assign_offsets(normalized: &str, pieces: Vec<String>) -> Vec<Chunk> {
    let mut chunks = Vec::with_capacity(pieces.len());
    let mut cursor = 0usize;
    for (index, text) in pieces.into_iter().enumerate() {
        let start_offset = normalized[cursor..]
            .find(text.as_str())
            .map(|p| cursor + p)
            .unwrap_or(cursor);
        let end_offset = (start_offset + text.len()).min(normalized.len());
        chunks.push(Chunk {
            text,
            start_offset,
            end_offset,
            index,
        });
        cursor = start_offset;
    }
    chunks
}

fn split_recursive(text: &str, config: &ChunkingConfig, sep_start: usize) -> Vec<String> {
    if text.len() <= config.chunk_size {
        return vec![text.to_string()];
    }

    for sep_idx in sep_start..config.separators.len() {
        let sep = config.separators[sep_idx].as_str();
        let pieces = split_keeping_separator(text, sep);
        if pieces.len() <= 1 {
            continue;
        }

        let mut chunks = Vec::new();
        let mut current = String::new();

        for piece in pieces {
            if current.len() + piece.len() <= config.chunk_size {
                current.push_str(&piece);
                continue;
            }

            if !current.is_empty() {
                chunks.push(current.clone());
                current = overlap_tail(&current, config);
            }

            // An oversized piece is kept as-is, not retried against the next
            // separator (matches the ground truth's `_split_by_separator`).
            current.push_str(&piece);
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        return chunks;
    }

    hard_split(text, config)
}

/// Split `text` on `sep`, re-attaching `sep` to the end of every piece but
/// the last so concatenation reproduces the original text.
fn split_keeping_separator(text: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return vec![text.to_string()];
    }
    let parts: Vec<&str> = text.split(sep).collect();
    let n = parts.len();
    parts
        .into_iter()
        .enumerate()
        .map(|(i, p)| if i + 1 < n { format!("{p}{sep}") } else { p.to_string() })
        .collect()
}

fn overlap_tail(chunk: &str, config: &ChunkingConfig) -> String {
    if config.chunk_overlap == 0 || chunk.is_empty() {
        return String::new();
    }
    let take = config.chunk_overlap.min(chunk.len());
    let mut start = chunk.len() - take;
    while start < chunk.len() && !chunk.is_char_boundary(start) {
        start += 1;
    }
    let mut tail = chunk[start..].to_string();

    if config.preserve_sentences {
        if let Some(pos) = tail.find(char::is_whitespace) {
            tail = tail[pos + 1..].to_string();
        }
    }
    tail
}

fn hard_split(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let len = text.len();

    while start < len {
        let mut end = (start + config.chunk_size).min(len);
        while end < len && !text.is_char_boundary(end) {
            end -= 1;
        }
        chunks.push(text[start..end].to_string());
        if end >= len {
            break;
        }
        let mut next_start = end.saturating_sub(config.chunk_overlap);
        while next_start < len && !text.is_char_boundary(next_start) {
            next_start += 1;
        }
        if next_start <= start {
            next_start = end;
        }
        start = next_start;
    }
    chunks
}

fn normalize_whitespace(text: &str) -> String {
    collapse_newline_runs(&collapse_space_runs(text))
        .trim()
        .to_string()
}

fn collapse_space_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        if c == ' ' {
            if !last_was_space {
                out.push(c);
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

fn collapse_newline_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut run = 0u32;
    for c in s.chars() {
        if c == '\n' {
            run += 1;
            if run <= 2 {
                out.push(c);
            }
        } else {
            run = 0;
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(chunk_size: usize, chunk_overlap: usize) -> TextChunker {
        TextChunker::new(ChunkingConfig {
            chunk_size,
            chunk_overlap,
            min_chunk_size: 10,
            preserve_sentences: true,
            ..ChunkingConfig::default()
        })
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let c = chunker(500, 50);
        let chunks = c.chunk("Short note, well under the limit.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn long_text_produces_multiple_dense_indexed_chunks() {
        let c = chunker(300, 50);
        let paragraph = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(30);
        let chunks = c.chunk(&paragraph);
        assert!(chunks.len() >= 4, "expected >=4 chunks, got {}", chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn chunks_respect_chunk_size_budget() {
        let c = chunker(200, 20);
        let text = "word ".repeat(200);
        let chunks = c.chunk(&text);
        for chunk in &chunks {
            assert!(
                chunk.text.len() <= 200 + 20,
                "chunk exceeded budget: {} bytes",
                chunk.text.len()
            );
        }
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let c = chunker(500, 50);
        assert!(c.chunk("").is_empty());
    }

    #[test]
    fn whitespace_is_normalized() {
        let c = chunker(500, 50);
        let chunks = c.chunk("hello     world\n\n\n\n\nfoo");
        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].text.contains("     "));
        assert!(!chunks[0].text.contains("\n\n\n"));
    }

    #[test]
    fn hard_split_used_when_no_separator_progresses() {
        let c = chunker(50, 10);
        let text = "a".repeat(500);
        let chunks = c.chunk(&text);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn estimate_chunk_count_matches_formula() {
        let c = chunker(300, 50);
        assert_eq!(c.estimate_chunk_count(1200), 5);
    }

    #[test]
    fn chunks_shorter_than_min_size_are_discarded() {
        let c = TextChunker::new(ChunkingConfig {
            chunk_size: 20,
            chunk_overlap: 2,
            min_chunk_size: 15,
            preserve_sentences: false,
            separators: vec![". ".to_string()],
        });
        let chunks = c.chunk("Ok. A tiny leftover remainder sentence that is long enough.");
        assert!(chunks.iter().all(|c| c.text.len() >= 15));
    }
}
