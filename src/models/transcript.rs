use serde::{Deserialize, Serialize};

/// A bounded, contiguous segment of the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of this chunk in the transcript (0-based)
    pub chunk_id: usize,
    /// Chunk text with whitespace normalized
    pub text: String,
    /// Number of words in `text`
    pub word_count: usize,
    /// Offset of the first word in the whole transcript
    pub start_word: usize,
    /// Offset one past the last word
    pub end_word: usize,
}

/// A short observation extracted from one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    /// Global index of this code across all chunks
    pub code_id: usize,
    pub text: String,
    pub source_chunk_id: usize,
}

/// Count whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   \n\t "), 0);
        assert_eq!(word_count("we worried  about\nthe surgery"), 5);
    }
}
