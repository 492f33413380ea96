//! Text chunking for the offline index build.
//!
//! Splits product sheets into overlapping character windows, snapping to
//! sentence boundaries where one exists near the window end.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks
    pub chunk_overlap: usize,
    /// Maximum chunks per source document
    pub max_chunks: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            max_chunks: 50,
        }
    }
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split text into overlapping chunks. Returns chunk texts in document
    /// order; empty input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let max_chunks = self.config.max_chunks;

        let mut chunks = Vec::new();
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        if total_chars == 0 {
            return chunks;
        }

        let step = chunk_size.saturating_sub(overlap).max(1);
        let mut start = 0;

        while start < total_chars && chunks.len() < max_chunks {
            let end = (start + chunk_size).min(total_chars);
            let window: String = chars[start..end].iter().collect();

            let final_text = if end < total_chars {
                snap_to_sentence_boundary(&window)
            } else {
                window
            };

            let trimmed = final_text.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }

            start += step;
        }

        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

/// Cut the window at the last sentence ending in its final 20%, if any.
/// Works on char indices so accented text never splits mid-codepoint.
fn snap_to_sentence_boundary(text: &str) -> String {
    let endings = [". ", "! ", "? ", ".\n", "!\n", "?\n"];

    let chars: Vec<char> = text.chars().collect();
    let search_start = (chars.len() * 80) / 100;

    let mut cut: Option<usize> = None;
    for idx in (search_start..chars.len().saturating_sub(1)).rev() {
        let pair: String = chars[idx..=(idx + 1)].iter().collect();
        if endings.contains(&pair.as_str()) {
            cut = Some(idx + 2);
            break;
        }
    }

    match cut {
        Some(pos) => chars[..pos].iter().collect(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_overlapping_chunks() {
        let chunker = Chunker::new(ChunkerConfig {
            chunk_size: 100,
            chunk_overlap: 20,
            max_chunks: 10,
        });

        let text = "Esto es una prueba. ".repeat(20);
        let chunks = chunker.split(&text);

        assert!(!chunks.is_empty());
        assert!(chunks.len() <= 10);
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(Chunker::default().split("").is_empty());
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let chunks = Chunker::default().split("Dosis: 1 ml cada 50 kg.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "Dosis: 1 ml cada 50 kg.");
    }

    #[test]
    fn sentence_boundary_snapping_survives_accented_text() {
        // Multibyte chars near the window end must not panic the splitter.
        let text = "Indicación veterinaria única. ".repeat(30);
        let chunker = Chunker::new(ChunkerConfig {
            chunk_size: 120,
            chunk_overlap: 10,
            max_chunks: 20,
        });

        let chunks = chunker.split(&text);
        assert!(!chunks.is_empty());
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.ends_with('.'), "chunk should end at a sentence: {chunk:?}");
        }
    }
}
