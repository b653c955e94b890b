use std::sync::Arc;

use tracing::{info, warn};

use crate::error::GenerationFailure;
use crate::llm::schemas::{codes_schema, themes_schema, CodesResponse, ThemesResponse};
use crate::llm::{
    build_coding_prompt, build_themes_prompt, invoke_structured, validate_codes, validate_themes,
    GatewayRequest, LlmGateway, RetryPolicy, ValidationConfig, GENERATION_SYSTEM_PROMPT,
};
use crate::models::{Chunk, Code, GenerationStats, ThemeSet};
use crate::stages::chunker::{chunk_transcript, ChunkerConfig};

/// Sampling temperature for coding and theme synthesis
pub const GENERATION_TEMPERATURE: f64 = 0.3;

/// Configuration for the generation stage
#[derive(Debug, Clone, Default)]
pub struct GenerationConfig {
    pub chunker: ChunkerConfig,
    pub validation: ValidationConfig,
    pub retry: RetryPolicy,
}

/// Result of the generation stage
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub chunks: Vec<Chunk>,
    pub codes: Vec<Code>,
    pub themes: ThemeSet,
}

impl GenerationOutput {
    pub fn stats(&self) -> GenerationStats {
        GenerationStats {
            num_chunks: self.chunks.len(),
            num_codes: self.codes.len(),
            initial_num_themes: self.themes.len(),
        }
    }
}

/// Chunks the transcript, extracts codes per chunk, then synthesizes themes
pub struct GenerationStage {
    gateway: Arc<dyn LlmGateway>,
    config: GenerationConfig,
}

impl GenerationStage {
    pub fn new(gateway: Arc<dyn LlmGateway>, config: GenerationConfig) -> Self {
        Self { gateway, config }
    }

    /// Run chunking, coding and theme synthesis
    ///
    /// Chunks are coded one at a time, in order. Any chunk that still fails
    /// after its retry aborts the whole stage.
    pub async fn generate(&self, transcript: &str) -> Result<GenerationOutput, GenerationFailure> {
        let chunks = chunk_transcript(transcript, &self.config.chunker)?;
        info!("Generation: {} chunks", chunks.len());

        let mut codes: Vec<Code> = Vec::new();
        for chunk in &chunks {
            let chunk_codes = self.extract_codes(chunk, codes.len()).await?;
            if chunk_codes.is_empty() {
                warn!("Chunk {}: no codes extracted", chunk.chunk_id);
            } else {
                info!("Chunk {}: {} codes", chunk.chunk_id, chunk_codes.len());
            }
            codes.extend(chunk_codes);
        }

        if codes.is_empty() {
            return Err(GenerationFailure::NoCodes {
                chunk_count: chunks.len(),
            });
        }

        let themes = self.synthesize_themes(&codes).await?;
        info!(
            "Generation: {} codes synthesized into {} themes",
            codes.len(),
            themes.len()
        );

        Ok(GenerationOutput {
            chunks,
            codes,
            themes,
        })
    }

    /// Extract codes from one chunk, numbering them from `first_code_id`
    async fn extract_codes(
        &self,
        chunk: &Chunk,
        first_code_id: usize,
    ) -> Result<Vec<Code>, GenerationFailure> {
        let request = GatewayRequest {
            system: GENERATION_SYSTEM_PROMPT.to_string(),
            prompt: build_coding_prompt(chunk, self.config.validation.max_code_words),
            response_schema: codes_schema(),
            temperature: GENERATION_TEMPERATURE,
        };

        let response: CodesResponse = invoke_structured(
            self.gateway.as_ref(),
            &request,
            &self.config.retry,
            |r: &CodesResponse| validate_codes(r, &self.config.validation),
        )
        .await
        .map_err(|source| GenerationFailure::Coding {
            chunk_id: chunk.chunk_id,
            word_count: chunk.word_count,
            source,
        })?;

        Ok(response
            .codes
            .into_iter()
            .enumerate()
            .map(|(offset, item)| Code {
                code_id: first_code_id + offset,
                text: item.text.trim().to_string(),
                source_chunk_id: chunk.chunk_id,
            })
            .collect())
    }

    async fn synthesize_themes(&self, codes: &[Code]) -> Result<ThemeSet, GenerationFailure> {
        let request = GatewayRequest {
            system: GENERATION_SYSTEM_PROMPT.to_string(),
            prompt: build_themes_prompt(codes, self.config.validation.max_description_words),
            response_schema: themes_schema(),
            temperature: GENERATION_TEMPERATURE,
        };

        let response: ThemesResponse = invoke_structured(
            self.gateway.as_ref(),
            &request,
            &self.config.retry,
            |r: &ThemesResponse| validate_themes(r, codes.len(), &self.config.validation),
        )
        .await
        .map_err(|source| GenerationFailure::Synthesis {
            code_count: codes.len(),
            source,
        })?;

        Ok(ThemeSet::from_drafts(response.themes))
    }
}
