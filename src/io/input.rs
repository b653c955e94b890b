use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::models::word_count;

/// Read a UTF-8 transcript from disk
///
/// Empty files load fine; the chunker rejects them.
pub fn load_transcript(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript: {:?}", path))?;

    debug!("Loaded {} words from {:?}", word_count(&content), path);

    Ok(content)
}
