use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::InlineData;

/// Cumulative token counts as reported by the provider.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub candidates_tokens: u32,
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,
}

/// Output gathered before a call was cancelled.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PartialOutput {
    pub text: String,
    pub reasoning_text: String,
    #[serde(default)]
    pub images: Vec<InlineData>,
    #[serde(default)]
    pub reasoning_images: Vec<InlineData>,
}

impl PartialOutput {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.reasoning_text.is_empty()
            && self.images.is_empty()
            && self.reasoning_images.is_empty()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<InlineData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoning_images: Vec<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_first_byte_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_context_metadata: Option<Value>,
}
