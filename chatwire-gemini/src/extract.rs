use std::collections::HashSet;

use serde_json::Value;

use chatwire_core::{InlineData, PartialOutput, PipelineResult, TokenUsage};

use crate::response::GenerateContentResponse;

const FINGERPRINT_PREFIX_CHARS: usize = 100;

/// What a single chunk added to the running call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkExtraction {
    pub text: String,
    pub reasoning_text: String,
    pub continuation_signature: Option<String>,
    pub images: Vec<InlineData>,
    pub reasoning_images: Vec<InlineData>,
    pub token_usage: Option<TokenUsage>,
    pub url_context_metadata: Option<Value>,
    pub finish_reason: Option<String>,
}

impl ChunkExtraction {
    fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.reasoning_text.is_empty()
            && self.continuation_signature.is_none()
            && self.images.is_empty()
            && self.reasoning_images.is_empty()
            && self.token_usage.is_none()
            && self.url_context_metadata.is_none()
            && self.finish_reason.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timing {
    pub duration_ms: Option<u64>,
    pub time_to_first_byte_ms: Option<u64>,
}

/// Folds the chunks of one call into a single result.
///
/// Text is append-only. Signature, usage, metadata and finish reason are
/// last-write-wins: usage in particular is cumulative on the provider side,
/// so each report replaces the previous one. Images are de-duplicated per
/// bucket because providers may repeat an image in consecutive chunks.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    text: String,
    reasoning_text: String,
    continuation_signature: Option<String>,
    images: Vec<InlineData>,
    reasoning_images: Vec<InlineData>,
    token_usage: Option<TokenUsage>,
    url_context_metadata: Option<Value>,
    finish_reason: Option<String>,
    seen_images: HashSet<String>,
    seen_reasoning_images: HashSet<String>,
    chunk_count: usize,
}

fn fingerprint(image: &InlineData) -> String {
    let mut key = image.mime_type.clone();
    key.extend(image.data.chars().take(FINGERPRINT_PREFIX_CHARS));
    key
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorbs a chunk and returns its contribution, or `None` if it added nothing.
    ///
    /// Only the first candidate is considered.
    pub fn ingest(&mut self, chunk: &GenerateContentResponse) -> Option<ChunkExtraction> {
        self.chunk_count += 1;
        let mut delta = ChunkExtraction {
            token_usage: chunk.usage_metadata.map(TokenUsage::from),
            url_context_metadata: chunk.url_context_metadata.clone(),
            ..Default::default()
        };

        if let Some(candidate) = chunk.first_candidate() {
            delta.finish_reason = candidate.finish_reason.clone();
            if delta.url_context_metadata.is_none() {
                delta.url_context_metadata = candidate.url_context_metadata.clone();
            }

            let parts = candidate
                .content
                .as_ref()
                .map(|content| content.parts.as_slice())
                .unwrap_or_default();

            for part in parts {
                let thought = part.is_thought();

                if let Some(text) = &part.text {
                    if thought {
                        delta.reasoning_text.push_str(text);
                    } else {
                        delta.text.push_str(text);
                    }
                }

                if let Some(signature) = &part.thought_signature {
                    delta.continuation_signature = Some(signature.clone());
                }

                if let Some(inline) = &part.inline_data {
                    if !inline.mime_type.starts_with("image/") {
                        continue;
                    }
                    let image = InlineData::new(inline.mime_type.clone(), inline.data.clone());
                    let (seen, bucket) = if thought {
                        (&mut self.seen_reasoning_images, &mut delta.reasoning_images)
                    } else {
                        (&mut self.seen_images, &mut delta.images)
                    };
                    if seen.insert(fingerprint(&image)) {
                        bucket.push(image);
                    }
                }
            }
        }

        if delta.is_empty() {
            return None;
        }

        self.apply(&delta);
        Some(delta)
    }

    fn apply(&mut self, delta: &ChunkExtraction) {
        self.text.push_str(&delta.text);
        self.reasoning_text.push_str(&delta.reasoning_text);
        self.images.extend(delta.images.iter().cloned());
        self.reasoning_images
            .extend(delta.reasoning_images.iter().cloned());
        if delta.continuation_signature.is_some() {
            self.continuation_signature = delta.continuation_signature.clone();
        }
        if delta.token_usage.is_some() {
            self.token_usage = delta.token_usage;
        }
        if delta.url_context_metadata.is_some() {
            self.url_context_metadata = delta.url_context_metadata.clone();
        }
        if delta.finish_reason.is_some() {
            self.finish_reason = delta.finish_reason.clone();
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reasoning_text(&self) -> &str {
        &self.reasoning_text
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn partial(&self) -> PartialOutput {
        PartialOutput {
            text: self.text.clone(),
            reasoning_text: self.reasoning_text.clone(),
            images: self.images.clone(),
            reasoning_images: self.reasoning_images.clone(),
        }
    }

    pub fn into_result(self, timing: Timing) -> PipelineResult {
        PipelineResult {
            text: self.text,
            reasoning_text: (!self.reasoning_text.is_empty()).then_some(self.reasoning_text),
            continuation_signature: self.continuation_signature,
            images: self.images,
            reasoning_images: self.reasoning_images,
            duration_ms: timing.duration_ms,
            time_to_first_byte_ms: timing.time_to_first_byte_ms,
            token_usage: self.token_usage,
            finish_reason: self.finish_reason,
            url_context_metadata: self.url_context_metadata,
        }
    }
}
