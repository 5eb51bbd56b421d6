use crate::error::IngestError;
use crate::models::{Document, Segment};
use sha2::{Digest, Sha256};

pub const DEFAULT_CHUNK_MAX_CHARS: usize = 5_000;
pub const DEFAULT_CHUNK_OVERLAP_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_CHUNK_MAX_CHARS,
            overlap_chars: DEFAULT_CHUNK_OVERLAP_CHARS,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap_chars {} must be smaller than max_chars {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }

    fn stride(&self) -> usize {
        self.max_chars - self.overlap_chars
    }
}

/// A window into a text, measured in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Splits `text` into fixed windows of at most `max_chars` characters where
/// each window after the first repeats the last `overlap_chars` characters of
/// its predecessor.
pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<Span>, IngestError> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + config.max_chars).min(chars.len());
        spans.push(Span {
            start,
            end,
            text: chars[start..end].iter().collect(),
        });
        if end == chars.len() {
            break;
        }
        start += config.stride();
    }

    Ok(spans)
}

pub fn split_documents(
    documents: &[Document],
    config: ChunkingConfig,
) -> Result<Vec<Segment>, IngestError> {
    config.validate()?;

    let mut segments = Vec::new();
    let mut cursor = 0u64;

    for document in documents {
        if document.text.trim().is_empty() {
            continue;
        }

        for span in split_text(&document.text, config)? {
            segments.push(Segment {
                segment_id: make_segment_id(&document.source, document.page, cursor, &span.text),
                source: document.source.clone(),
                page: document.page,
                chunk_index: cursor,
                start: span.start,
                end: span.end,
                text: span.text,
            });
            cursor = cursor.saturating_add(1);
        }
    }

    Ok(segments)
}

fn make_segment_id(source: &str, page: u32, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_chars: usize, overlap_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            overlap_chars,
        }
    }

    fn reconstruct(spans: &[Span], overlap: usize) -> String {
        let mut out = String::new();
        for (index, span) in spans.iter().enumerate() {
            let skip = if index == 0 { 0 } else { overlap };
            out.extend(span.text.chars().skip(skip));
        }
        out
    }

    #[test]
    fn spans_cover_text_without_gaps() -> Result<(), IngestError> {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(7);
        let spans = split_text(&text, config(40, 8))?;

        assert_eq!(spans[0].start, 0);
        assert_eq!(spans.last().map(|span| span.end), Some(text.chars().count()));
        assert_eq!(reconstruct(&spans, 8), text);
        Ok(())
    }

    #[test]
    fn neighbours_share_exactly_the_overlap() -> Result<(), IngestError> {
        let text: String = ('a'..='z').cycle().take(203).collect();
        let spans = split_text(&text, config(50, 10))?;

        assert!(spans.len() > 2);
        for span in &spans {
            assert!(span.text.chars().count() <= 50);
        }
        for pair in spans.windows(2) {
            let previous: Vec<char> = pair[0].text.chars().collect();
            let tail: String = previous[previous.len() - 10..].iter().collect();
            let head: String = pair[1].text.chars().take(10).collect();
            assert_eq!(tail, head);
            assert_eq!(pair[1].start, pair[0].end - 10);
        }
        Ok(())
    }

    #[test]
    fn short_text_is_a_single_span() -> Result<(), IngestError> {
        let spans = split_text("The capital of France is Paris.", ChunkingConfig::default())?;
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "The capital of France is Paris.");
        Ok(())
    }

    #[test]
    fn offsets_count_characters_not_bytes() -> Result<(), IngestError> {
        let text = "ééééé ààààà";
        let spans = split_text(text, config(6, 1))?;
        assert_eq!(spans[0].text, "ééééé ");
        assert_eq!(spans[1].start, 5);
        assert_eq!(reconstruct(&spans, 1), text);
        Ok(())
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        assert!(split_text("abc", config(10, 10)).is_err());
        assert!(split_text("abc", config(0, 0)).is_err());
    }

    #[test]
    fn documents_get_global_ordered_indexes() -> Result<(), IngestError> {
        let documents = vec![
            Document {
                source: "a.pdf".to_string(),
                page: 1,
                text: "x".repeat(25),
            },
            Document {
                source: "a.pdf".to_string(),
                page: 2,
                text: "   ".to_string(),
            },
            Document {
                source: "b.pdf".to_string(),
                page: 1,
                text: "y".repeat(5),
            },
        ];

        let segments = split_documents(&documents, config(10, 2))?;
        let indexes: Vec<u64> = segments.iter().map(|segment| segment.chunk_index).collect();

        assert_eq!(indexes, (0..segments.len() as u64).collect::<Vec<_>>());
        assert!(segments.iter().all(|segment| segment.page == 1));
        assert_eq!(segments.last().map(|segment| segment.source.as_str()), Some("b.pdf"));
        Ok(())
    }
}
