//! Request payloads for `generateContent` / `streamGenerateContent`.
//!
//! [`build_body`] assembles an immutable [`GenerateContentRequest`] in one
//! pass; optional sections are `None` unless at least one of their fields is
//! set, so an empty section never reaches the wire.

use secrecy::ExposeSecret;
use serde::Serialize;

use chatwire_core::{
    AdvancedConfig, BuiltinTool, ChatRequest, Content, ContentPart, InlineData, MediaResolution,
    ModelCapability, ReasoningLevel, ReasoningShape, SafetySetting, UploadedFile,
};

use crate::config::ApiConfig;

pub const DEFAULT_REASONING_LEVEL: ReasoningLevel = ReasoningLevel::High;
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";
pub const DEFAULT_IMAGE_SIZE: &str = "1K";

const GENERATE_METHOD: &str = "generateContent";
const STREAM_METHOD: &str = "streamGenerateContent";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<WireGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_settings: Option<Vec<SafetySetting>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<WirePart>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<WireInlineData>,
    #[serde(rename = "file_data", skip_serializing_if = "Option::is_none")]
    pub file_data: Option<WireFileData>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireInlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WireFileData {
    pub file_uri: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<WireImageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_resolution: Option<MediaResolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_level: Option<ReasoningLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_thoughts: Option<bool>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireImageConfig {
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum WireTool {
    GoogleSearch(EmptyConfig),
    UrlContext(EmptyConfig),
    CodeExecution(EmptyConfig),
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct EmptyConfig {}

impl WireGenerationConfig {
    fn is_empty(&self) -> bool {
        self == &WireGenerationConfig::default()
    }
}

fn model_name(model: &str) -> &str {
    let model = model.trim();
    model.strip_prefix("models/").unwrap_or(model)
}

/// `{endpoint}/models/{model}:{method}?key=...` plus `&alt=sse` when streaming.
pub fn build_url(config: &ApiConfig, streaming: bool) -> String {
    let method = if streaming { STREAM_METHOD } else { GENERATE_METHOD };
    let key: String =
        url::form_urlencoded::byte_serialize(config.api_key.expose_secret().as_bytes()).collect();
    let mut url = format!(
        "{}/models/{}:{}?key={}",
        config.normalized_endpoint(),
        model_name(&config.model),
        method,
        key
    );
    if streaming {
        url.push_str("&alt=sse");
    }
    url
}

pub fn build_body(
    request: &ChatRequest,
    model_id: &str,
    capability: &ModelCapability,
) -> GenerateContentRequest {
    let default_advanced = AdvancedConfig::default();
    let advanced = request.advanced.as_ref().unwrap_or(&default_advanced);

    GenerateContentRequest {
        contents: map_contents(&request.contents),
        generation_config: generation_config(request, advanced, model_id, capability),
        safety_settings: (!request.safety_settings.is_empty())
            .then(|| request.safety_settings.clone()),
        system_instruction: system_instruction(request.system_instruction.as_deref()),
        tools: map_tools(&request.tools),
    }
}

fn generation_config(
    request: &ChatRequest,
    advanced: &AdvancedConfig,
    model_id: &str,
    capability: &ModelCapability,
) -> Option<WireGenerationConfig> {
    let sampling = request.generation.clone().unwrap_or_default();
    let (response_modalities, image_config) = image_section(advanced, capability);

    let config = WireGenerationConfig {
        temperature: sampling.temperature,
        top_p: sampling.top_p,
        top_k: sampling.top_k,
        max_output_tokens: sampling.max_output_tokens,
        stop_sequences: sampling.stop_sequences.filter(|stops| !stops.is_empty()),
        candidate_count: sampling.candidate_count,
        response_mime_type: sampling.response_mime_type,
        thinking_config: thinking_config(advanced, capability),
        image_config,
        media_resolution: advanced.media_resolution,
        response_modalities,
    };

    if config.is_empty() {
        tracing::debug!(model = model_id, "no generationConfig fields set");
        None
    } else {
        Some(config)
    }
}

/// The capability decides the shape: a budget set on a level model (or the
/// reverse) is dropped in favour of the model's own default.
pub fn thinking_config(
    advanced: &AdvancedConfig,
    capability: &ModelCapability,
) -> Option<ThinkingConfig> {
    let mut config = match capability.reasoning {
        ReasoningShape::None => ThinkingConfig::default(),
        ReasoningShape::Level => ThinkingConfig {
            thinking_level: Some(advanced.reasoning_level.unwrap_or(DEFAULT_REASONING_LEVEL)),
            ..Default::default()
        },
        ReasoningShape::Budget { default_budget } => ThinkingConfig {
            thinking_budget: Some(advanced.reasoning_budget.unwrap_or(default_budget)),
            ..Default::default()
        },
    };

    if capability.supports_reasoning_trace && advanced.include_reasoning_trace == Some(true) {
        config.include_thoughts = Some(true);
    }

    (config != ThinkingConfig::default()).then_some(config)
}

fn image_section(
    advanced: &AdvancedConfig,
    capability: &ModelCapability,
) -> (Option<Vec<String>>, Option<WireImageConfig>) {
    if !capability.image_output {
        return (None, None);
    }

    let requested = advanced.image_config.clone().unwrap_or_default();
    let image_size = capability.image_resolution.then(|| {
        requested
            .image_size
            .unwrap_or_else(|| DEFAULT_IMAGE_SIZE.to_string())
    });

    (
        Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
        Some(WireImageConfig {
            aspect_ratio: requested
                .aspect_ratio
                .unwrap_or_else(|| DEFAULT_ASPECT_RATIO.to_string()),
            image_size,
        }),
    )
}

fn system_instruction(instruction: Option<&str>) -> Option<WireContent> {
    let text = instruction.map(str::trim).filter(|text| !text.is_empty())?;
    Some(WireContent {
        role: None,
        parts: vec![WirePart {
            text: Some(text.to_string()),
            ..Default::default()
        }],
    })
}

fn map_tools(tools: &[BuiltinTool]) -> Option<Vec<WireTool>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|tool| match tool {
                BuiltinTool::GoogleSearch => WireTool::GoogleSearch(EmptyConfig {}),
                BuiltinTool::UrlContext => WireTool::UrlContext(EmptyConfig {}),
                BuiltinTool::CodeExecution => WireTool::CodeExecution(EmptyConfig {}),
            })
            .collect(),
    )
}

fn map_contents(contents: &[Content]) -> Vec<WireContent> {
    contents
        .iter()
        .map(|content| WireContent {
            role: Some(content.role.as_str().to_string()),
            parts: content.parts.iter().map(map_part).collect(),
        })
        .collect()
}

fn map_part(part: &ContentPart) -> WirePart {
    match part {
        ContentPart::Text { text } => WirePart {
            text: Some(text.clone()),
            ..Default::default()
        },
        ContentPart::InlineBinary { mime_type, data } => WirePart {
            inline_data: Some(WireInlineData {
                mime_type: mime_type.clone(),
                data: data.clone(),
            }),
            ..Default::default()
        },
        ContentPart::FileReference { uri, mime_type } => WirePart {
            file_data: Some(WireFileData {
                file_uri: uri.clone(),
                mime_type: mime_type.clone(),
            }),
            ..Default::default()
        },
        ContentPart::ReasoningText { text } => WirePart {
            text: Some(text.clone()),
            thought: Some(true),
            ..Default::default()
        },
        ContentPart::ContinuationSignature { signature } => WirePart {
            thought_signature: Some(signature.clone()),
            ..Default::default()
        },
    }
}

/// Builds a user turn: ready file references, then inline data, then text.
/// Files still uploading (or that failed) are left out.
pub fn assemble_user_content(text: &str, inline: &[InlineData], files: &[UploadedFile]) -> Content {
    let mut parts: Vec<ContentPart> = files
        .iter()
        .filter(|file| file.is_ready())
        .map(|file| ContentPart::file_reference(file.uri.clone(), file.mime_type.clone()))
        .collect();

    parts.extend(
        inline
            .iter()
            .map(|blob| ContentPart::inline_binary(blob.mime_type.clone(), blob.data.clone())),
    );

    if !text.is_empty() {
        parts.push(ContentPart::text(text));
    }

    Content::user(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatwire_core::{FileState, GenerationConfig, ImageConfig};
    use serde_json::json;

    fn level_model() -> ModelCapability {
        ModelCapability {
            reasoning: ReasoningShape::Level,
            supports_reasoning_trace: true,
            ..Default::default()
        }
    }

    fn budget_model(default_budget: i32) -> ModelCapability {
        ModelCapability {
            reasoning: ReasoningShape::Budget { default_budget },
            supports_reasoning_trace: true,
            ..Default::default()
        }
    }

    fn body_json(request: &ChatRequest, capability: &ModelCapability) -> serde_json::Value {
        serde_json::to_value(build_body(request, "test-model", capability)).unwrap()
    }

    #[test]
    fn url_selects_method_and_carries_key_once() {
        let config = ApiConfig::new("k-123", "models/gemini-2.5-flash")
            .with_endpoint("https://proxy.example.com/");

        let buffered = build_url(&config, false);
        let streaming = build_url(&config, true);

        assert_eq!(
            buffered,
            "https://proxy.example.com/v1beta/models/gemini-2.5-flash:generateContent?key=k-123"
        );
        assert_eq!(
            streaming,
            "https://proxy.example.com/v1beta/models/gemini-2.5-flash:streamGenerateContent?key=k-123&alt=sse"
        );
        assert_eq!(streaming.matches("k-123").count(), 1);
    }

    #[test]
    fn url_encodes_reserved_characters_in_key() {
        let config = ApiConfig::new("a&b=c", "gemini-2.5-flash");
        let url = build_url(&config, false);
        assert!(url.ends_with(":generateContent?key=a%26b%3Dc"));
    }

    #[test]
    fn minimal_request_has_only_contents() {
        let request = ChatRequest::new(vec![Content::user_text("hi")]);
        assert_eq!(
            body_json(&request, &ModelCapability::default()),
            json!({"contents": [{"role": "user", "parts": [{"text": "hi"}]}]})
        );
    }

    #[test]
    fn empty_optional_sections_are_omitted() {
        let request = ChatRequest::new(vec![Content::user_text("hi")])
            .with_generation(GenerationConfig {
                stop_sequences: Some(vec![]),
                ..Default::default()
            })
            .with_system_instruction("   ")
            .with_advanced(AdvancedConfig::default());

        let body = build_body(&request, "test-model", &ModelCapability::default());
        assert!(body.generation_config.is_none());
        assert!(body.system_instruction.is_none());
        assert!(body.safety_settings.is_none());
        assert!(body.tools.is_none());
    }

    #[test]
    fn level_models_default_to_high() {
        let request = ChatRequest::new(vec![Content::user_text("hi")]);
        let body = body_json(&request, &level_model());
        assert_eq!(
            body["generationConfig"]["thinkingConfig"],
            json!({"thinkingLevel": "high"})
        );
    }

    #[test]
    fn budget_models_default_to_declared_budget() {
        let request = ChatRequest::new(vec![Content::user_text("hi")]);
        let body = body_json(&request, &budget_model(24576));
        assert_eq!(
            body["generationConfig"]["thinkingConfig"],
            json!({"thinkingBudget": 24576})
        );
    }

    #[test]
    fn capability_overrides_caller_shape() {
        let advanced = AdvancedConfig {
            reasoning_budget: Some(1024),
            ..Default::default()
        };
        let config = thinking_config(&advanced, &level_model()).unwrap();
        assert_eq!(config.thinking_level, Some(ReasoningLevel::High));
        assert_eq!(config.thinking_budget, None);

        let advanced = AdvancedConfig {
            reasoning_level: Some(ReasoningLevel::Low),
            ..Default::default()
        };
        let config = thinking_config(&advanced, &budget_model(-1)).unwrap();
        assert_eq!(config.thinking_level, None);
        assert_eq!(config.thinking_budget, Some(-1));
    }

    #[test]
    fn trace_flag_needs_both_request_and_support() {
        let advanced = AdvancedConfig {
            include_reasoning_trace: Some(true),
            ..Default::default()
        };
        let unsupported = ModelCapability::default();
        assert_eq!(thinking_config(&advanced, &unsupported), None);

        let trace_only = ModelCapability {
            supports_reasoning_trace: true,
            ..Default::default()
        };
        assert_eq!(
            thinking_config(&advanced, &trace_only),
            Some(ThinkingConfig {
                include_thoughts: Some(true),
                ..Default::default()
            })
        );

        let with_budget = thinking_config(&advanced, &budget_model(512)).unwrap();
        assert_eq!(with_budget.thinking_budget, Some(512));
        assert_eq!(with_budget.include_thoughts, Some(true));
    }

    #[test]
    fn image_models_force_modalities_and_defaults() {
        let capability = ModelCapability {
            image_output: true,
            ..Default::default()
        };
        let request = ChatRequest::new(vec![Content::user_text("draw")]);
        let body = body_json(&request, &capability);
        assert_eq!(
            body["generationConfig"],
            json!({
                "imageConfig": {"aspectRatio": "1:1"},
                "responseModalities": ["TEXT", "IMAGE"]
            })
        );
    }

    #[test]
    fn image_size_only_with_resolution_support() {
        let advanced = AdvancedConfig {
            image_config: Some(ImageConfig {
                aspect_ratio: Some("16:9".to_string()),
                image_size: Some("2K".to_string()),
            }),
            ..Default::default()
        };
        let request = ChatRequest::new(vec![Content::user_text("draw")]).with_advanced(advanced);

        let without = body_json(
            &request,
            &ModelCapability {
                image_output: true,
                ..Default::default()
            },
        );
        assert_eq!(
            without["generationConfig"]["imageConfig"],
            json!({"aspectRatio": "16:9"})
        );

        let with = body_json(
            &request,
            &ModelCapability {
                image_output: true,
                image_resolution: true,
                ..Default::default()
            },
        );
        assert_eq!(
            with["generationConfig"]["imageConfig"],
            json!({"aspectRatio": "16:9", "imageSize": "2K"})
        );
    }

    #[test]
    fn image_config_ignored_for_text_models() {
        let advanced = AdvancedConfig {
            image_config: Some(ImageConfig {
                aspect_ratio: Some("4:3".to_string()),
                image_size: None,
            }),
            ..Default::default()
        };
        let request = ChatRequest::new(vec![Content::user_text("hi")]).with_advanced(advanced);
        let body = build_body(&request, "test-model", &ModelCapability::default());
        assert!(body.generation_config.is_none());
    }

    #[test]
    fn full_request_maps_every_section() {
        let request = ChatRequest::new(vec![
            Content::user(vec![
                ContentPart::file_reference("https://files/abc", "application/pdf"),
                ContentPart::text("summarize"),
            ]),
            Content::model(vec![
                ContentPart::reasoning_text("thinking"),
                ContentPart::text("done"),
                ContentPart::continuation_signature("sig-1"),
            ]),
        ])
        .with_generation(GenerationConfig {
            temperature: Some(0.5),
            max_output_tokens: Some(256),
            ..Default::default()
        })
        .with_safety_settings(vec![SafetySetting::new(
            "HARM_CATEGORY_HARASSMENT",
            "BLOCK_NONE",
        )])
        .with_system_instruction("Be brief.")
        .with_advanced(AdvancedConfig {
            media_resolution: Some(MediaResolution::Low),
            ..Default::default()
        })
        .with_tools(vec![BuiltinTool::GoogleSearch, BuiltinTool::UrlContext]);

        assert_eq!(
            body_json(&request, &ModelCapability::default()),
            json!({
                "contents": [
                    {
                        "role": "user",
                        "parts": [
                            {"file_data": {"file_uri": "https://files/abc", "mime_type": "application/pdf"}},
                            {"text": "summarize"}
                        ]
                    },
                    {
                        "role": "model",
                        "parts": [
                            {"text": "thinking", "thought": true},
                            {"text": "done"},
                            {"thoughtSignature": "sig-1"}
                        ]
                    }
                ],
                "generationConfig": {
                    "temperature": 0.5,
                    "maxOutputTokens": 256,
                    "mediaResolution": "MEDIA_RESOLUTION_LOW"
                },
                "safetySettings": [
                    {"category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE"}
                ],
                "systemInstruction": {"parts": [{"text": "Be brief."}]},
                "tools": [{"googleSearch": {}}, {"urlContext": {}}]
            })
        );
    }

    #[test]
    fn assembly_orders_files_inline_text_and_skips_unready() {
        let files = vec![
            UploadedFile::ready("files/a", "application/pdf"),
            UploadedFile {
                uri: "files/b".to_string(),
                mime_type: "video/mp4".to_string(),
                state: FileState::Uploading,
            },
            UploadedFile {
                uri: "files/c".to_string(),
                mime_type: "audio/mp3".to_string(),
                state: FileState::Failed,
            },
        ];
        let inline = vec![InlineData::new("image/png", "iVBOR")];

        let content = assemble_user_content("describe", &inline, &files);
        assert_eq!(
            content.parts,
            vec![
                ContentPart::file_reference("files/a", "application/pdf"),
                ContentPart::inline_binary("image/png", "iVBOR"),
                ContentPart::text("describe"),
            ]
        );
    }
}
