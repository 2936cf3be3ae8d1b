//! Provider-neutral types for the chatwire request/response pipeline.

mod capability;
mod content;
mod error;
mod pipeline;
mod request;
mod result;

pub use capability::{CapabilityResolver, ModelCapability, ReasoningShape, StaticCapabilities};
pub use content::{Content, ContentPart, FileState, InlineData, Role, UploadedFile};
pub use error::PipelineError;
pub use pipeline::{ChatPipeline, StreamDelta};
pub use request::{
    AdvancedConfig, BuiltinTool, ChatRequest, GenerationConfig, ImageConfig, MediaResolution,
    ReasoningLevel, SafetySetting,
};
pub use result::{PartialOutput, PipelineResult, TokenUsage};

pub use serde_json::Value;
