use tracing::debug;

use crate::error::EmptyInputError;
use crate::models::Chunk;

/// Configuration for transcript chunking
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum words per chunk
    pub max_words: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { max_words: 4000 }
    }
}

/// A run of words that must stay together, tagged with its paragraph
struct Unit<'a> {
    paragraph: usize,
    words: Vec<&'a str>,
}

/// Split the transcript into chunks of at most `max_words` words
///
/// Sentences are packed greedily into chunks; a chunk only ends mid-sentence
/// when a single sentence is longer than `max_words`. Words are never split.
/// Paragraph breaks are preserved inside a chunk's text.
pub fn chunk_transcript(
    transcript: &str,
    config: &ChunkerConfig,
) -> Result<Vec<Chunk>, EmptyInputError> {
    let max_words = config.max_words.max(1);
    let units = split_units(transcript, max_words);

    if units.is_empty() {
        return Err(EmptyInputError);
    }

    let mut chunks = Vec::new();
    let mut current: Vec<Unit> = Vec::new();
    let mut current_words = 0;
    let mut start_word = 0;

    for unit in units {
        if current_words + unit.words.len() > max_words && !current.is_empty() {
            chunks.push(build_chunk(chunks.len(), &current, start_word));
            start_word += current_words;
            current.clear();
            current_words = 0;
        }
        current_words += unit.words.len();
        current.push(unit);
    }

    if !current.is_empty() {
        chunks.push(build_chunk(chunks.len(), &current, start_word));
    }

    debug!(
        "Chunked {} words into {} chunks (max {})",
        chunks.last().map_or(0, |c| c.end_word),
        chunks.len(),
        max_words
    );

    Ok(chunks)
}

/// Break the transcript into sentence units no longer than `max_words`
fn split_units(transcript: &str, max_words: usize) -> Vec<Unit<'_>> {
    let mut units = Vec::new();

    for (paragraph, text) in paragraphs(transcript).into_iter().enumerate() {
        let mut sentence: Vec<&str> = Vec::new();
        for word in text.iter().flat_map(|line| line.split_whitespace()) {
            sentence.push(word);
            if ends_sentence(word) {
                push_sentence(&mut units, paragraph, std::mem::take(&mut sentence), max_words);
            }
        }
        if !sentence.is_empty() {
            push_sentence(&mut units, paragraph, sentence, max_words);
        }
    }

    units
}

/// Group non-blank lines into paragraphs
fn paragraphs(transcript: &str) -> Vec<Vec<&str>> {
    let mut result = Vec::new();
    let mut current = Vec::new();

    for line in transcript.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        result.push(current);
    }

    result
}

fn push_sentence<'a>(
    units: &mut Vec<Unit<'a>>,
    paragraph: usize,
    sentence: Vec<&'a str>,
    max_words: usize,
) {
    for piece in sentence.chunks(max_words) {
        units.push(Unit {
            paragraph,
            words: piece.to_vec(),
        });
    }
}

fn ends_sentence(word: &str) -> bool {
    let trimmed = word.trim_end_matches(['"', '\'', ')', ']', '\u{201d}', '\u{2019}']);
    trimmed.ends_with(['.', '!', '?'])
}

fn build_chunk(chunk_id: usize, units: &[Unit], start_word: usize) -> Chunk {
    let mut text = String::new();
    let mut word_count = 0;
    let mut last_paragraph = None;

    for unit in units {
        match last_paragraph {
            Some(p) if p != unit.paragraph => text.push_str("\n\n"),
            Some(_) => text.push(' '),
            None => {}
        }
        text.push_str(&unit.words.join(" "));
        word_count += unit.words.len();
        last_paragraph = Some(unit.paragraph);
    }

    Chunk {
        chunk_id,
        text,
        word_count,
        start_word,
        end_word: start_word + word_count,
    }
}
