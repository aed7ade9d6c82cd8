use common::error::AppError;
use text_splitter::{ChunkConfig, TextSplitter};

/// Character length above which text is split before indexing.
pub const CHUNK_THRESHOLD_CHARS: usize = 1000;
/// Characters shared between neighbouring chunks.
pub const CHUNK_OVERLAP_CHARS: usize = 100;

/// Splits `text` into overlapping character-bounded chunks.
///
/// Text at or under [`CHUNK_THRESHOLD_CHARS`] comes back as a single chunk unchanged.
pub fn split_text(text: &str) -> Result<Vec<String>, AppError> {
    if text.chars().count() <= CHUNK_THRESHOLD_CHARS {
        return Ok(vec![text.to_string()]);
    }

    let chunk_config = ChunkConfig::new(CHUNK_THRESHOLD_CHARS)
        .with_overlap(CHUNK_OVERLAP_CHARS)
        .map_err(|e| AppError::Validation(format!("invalid chunk overlap: {e}")))?;
    let splitter = TextSplitter::new(chunk_config);

    let chunks: Vec<String> = splitter.chunks(text).map(str::to_owned).collect();

    if chunks.is_empty() {
        return Ok(vec![text.to_string()]);
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_not_split() {
        let text = "Ava specializes in distributed caching.";
        assert_eq!(split_text(text).expect("split"), vec![text.to_string()]);
    }

    #[test]
    fn test_long_text_splits_within_bounds() {
        let sentence = "Caches trade memory for latency and need careful invalidation. ";
        let text = sentence.repeat(60);
        assert!(text.chars().count() > CHUNK_THRESHOLD_CHARS);

        let chunks = split_text(&text).expect("split");

        assert!(chunks.len() > 1);
        assert!(chunks
            .iter()
            .all(|c| c.chars().count() <= CHUNK_THRESHOLD_CHARS));
        let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
        // overlapping chunks cover at least the trimmed input
        assert!(total >= text.trim().chars().count());
    }
}
