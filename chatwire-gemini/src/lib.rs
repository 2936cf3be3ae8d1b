//! Google Gemini request/response pipeline.
//!
//! [`GeminiClient`] validates an [`ApiConfig`], builds the request body from
//! a [`chatwire_core::ChatRequest`], and either buffers the reply or parses
//! the `alt=sse` event stream chunk by chunk, with cancellation through a
//! [`tokio_util::sync::CancellationToken`].

mod client;
mod config;
pub mod debug;
pub mod endpoint;
pub mod extract;
pub mod request;
pub mod response;
pub mod sse;

pub use client::{CallPhase, GeminiClient};
pub use config::{ApiConfig, DEFAULT_MODEL};
pub use debug::{DebugRecord, DebugRecorder};
pub use endpoint::{normalize_endpoint, validate_endpoint, DEFAULT_ENDPOINT};
pub use extract::{ChunkExtraction, ResponseAccumulator, Timing};
pub use request::{assemble_user_content, build_body, build_url, GenerateContentRequest};
pub use sse::{parse_event_line, parse_response_body, EventStreamParser};

pub use chatwire_core::{
    ChatPipeline, ChatRequest, Content, ContentPart, PipelineError, PipelineResult, StreamDelta,
};
