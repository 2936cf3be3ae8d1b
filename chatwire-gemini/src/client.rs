//! Gemini transport: validate, build, send, then stream or buffer the reply.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use chatwire_core::{
    CapabilityResolver, ChatPipeline, ChatRequest, PartialOutput, PipelineError, PipelineResult,
    StaticCapabilities, StreamDelta,
};

use crate::config::ApiConfig;
use crate::debug::DebugRecorder;
use crate::extract::{ChunkExtraction, ResponseAccumulator, Timing};
use crate::request::{build_body, build_url, GenerateContentRequest};
use crate::response::{error_message, GenerateContentResponse};
use crate::sse::{parse_response_body, EventStreamParser};

/// Lifecycle of a single call, reported through `tracing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Validating,
    Building,
    Sending,
    StreamingReceiving,
    BufferedReceiving,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Buffered,
    Streaming,
}

impl Mode {
    fn is_streaming(self) -> bool {
        self == Mode::Streaming
    }
}

/// Per-call bookkeeping for the debug recorder and timing.
struct CallContext<'a> {
    recorder: &'a DebugRecorder,
    record_id: Option<uuid::Uuid>,
    started: Instant,
    ttfb: Option<Duration>,
}

impl CallContext<'_> {
    fn fail(
        &self,
        error: PipelineError,
        status: Option<u16>,
        raw_response: Option<String>,
    ) -> PipelineError {
        tracing::warn!(phase = ?CallPhase::Failed, error = %error, "gemini call failed");
        self.recorder.record_failure(
            self.record_id,
            &error.to_string(),
            status,
            raw_response,
            self.started.elapsed(),
        );
        error
    }

    fn cancel(&self, partial: PartialOutput) -> PipelineError {
        tracing::info!(
            phase = ?CallPhase::Cancelled,
            text_len = partial.text.len(),
            reasoning_len = partial.reasoning_text.len(),
            "gemini call cancelled"
        );
        let error = PipelineError::Cancelled(partial);
        self.recorder.record_failure(
            self.record_id,
            &error.to_string(),
            None,
            None,
            self.started.elapsed(),
        );
        error
    }

    fn timing(&self) -> Timing {
        Timing {
            duration_ms: Some(millis(self.started.elapsed())),
            time_to_first_byte_ms: self.ttfb.map(millis),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn network_error(err: reqwest::Error) -> PipelineError {
    PipelineError::Network(err.to_string())
}

fn http_error(status: StatusCode, body: &str) -> PipelineError {
    let message = error_message(body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            body.to_string()
        }
    });
    PipelineError::Http {
        status: status.as_u16(),
        message,
    }
}

fn emit(extraction: &ChunkExtraction, on_delta: &mut (dyn for<'a> FnMut(StreamDelta<'a>) + Send)) {
    if !extraction.reasoning_text.is_empty() {
        on_delta(StreamDelta::Reasoning(&extraction.reasoning_text));
    }
    if !extraction.text.is_empty() {
        on_delta(StreamDelta::Text(&extraction.text));
    }
    for image in &extraction.reasoning_images {
        on_delta(StreamDelta::ReasoningImage(image));
    }
    for image in &extraction.images {
        on_delta(StreamDelta::Image(image));
    }
}

fn to_debug_value(chunk: &GenerateContentResponse) -> Value {
    serde_json::to_value(chunk).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "debug recorder could not serialize chunk");
        Value::Null
    })
}

#[derive(Clone)]
pub struct GeminiClient {
    config: ApiConfig,
    http: Client,
    capabilities: Arc<dyn CapabilityResolver>,
    recorder: Arc<DebugRecorder>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("config", &self.config)
            .field("debug_enabled", &self.recorder.is_enabled())
            .finish()
    }
}

impl GeminiClient {
    /// No request timeout is configured: callers own timeout policy through
    /// the cancellation token.
    pub fn new(config: ApiConfig) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .build()
            .map_err(|err| PipelineError::Unknown(err.to_string()))?;
        Ok(Self {
            config,
            http,
            capabilities: Arc::new(StaticCapabilities),
            recorder: Arc::new(DebugRecorder::disabled()),
        })
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Arc<dyn CapabilityResolver>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_debug_recorder(mut self, recorder: Arc<DebugRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn debug_recorder(&self) -> &Arc<DebugRecorder> {
        &self.recorder
    }

    /// Buffered call: one request, one full-body read.
    pub async fn generate(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        self.execute(request, cancel, Mode::Buffered, &mut |_| {}).await
    }

    /// Streaming call; `on_delta` sees every text, reasoning and image delta
    /// in arrival order before the assembled result is returned.
    pub async fn stream<F>(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        mut on_delta: F,
    ) -> Result<PipelineResult, PipelineError>
    where
        F: for<'a> FnMut(StreamDelta<'a>) + Send,
    {
        self.execute(request, cancel, Mode::Streaming, &mut on_delta).await
    }

    async fn execute(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        mode: Mode,
        on_delta: &mut (dyn for<'a> FnMut(StreamDelta<'a>) + Send),
    ) -> Result<PipelineResult, PipelineError> {
        let span = tracing::info_span!(
            "gemini_call",
            model = %self.config.model,
            streaming = mode.is_streaming(),
        );
        self.run(request, cancel, mode, on_delta).instrument(span).await
    }

    async fn run(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        mode: Mode,
        on_delta: &mut (dyn for<'a> FnMut(StreamDelta<'a>) + Send),
    ) -> Result<PipelineResult, PipelineError> {
        tracing::debug!(phase = ?CallPhase::Validating);
        if let Err(err) = self.config.validate() {
            tracing::warn!(phase = ?CallPhase::Failed, error = %err, "configuration rejected");
            return Err(err);
        }

        tracing::debug!(phase = ?CallPhase::Building);
        let url = build_url(&self.config, mode.is_streaming());
        let capability = self.capabilities.resolve(&self.config.model);
        let body = build_body(request, &self.config.model, &capability);
        let headers = vec![(
            CONTENT_TYPE.as_str().to_string(),
            "application/json".to_string(),
        )];

        let mut ctx = CallContext {
            recorder: &self.recorder,
            record_id: self.recorder.record_start(&url, "POST", &headers, &body),
            started: Instant::now(),
            ttfb: None,
        };

        if cancel.is_cancelled() {
            return Err(ctx.cancel(PartialOutput::default()));
        }

        tracing::debug!(phase = ?CallPhase::Sending);
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ctx.cancel(PartialOutput::default())),
            sent = self.send(&url, &body) => sent.map_err(|err| ctx.fail(network_error(err), None, None))?,
        };

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let error = http_error(status, &raw);
            return Err(ctx.fail(error, Some(status.as_u16()), Some(raw)));
        }

        match mode {
            Mode::Streaming => {
                ctx.ttfb = Some(ctx.started.elapsed());
                self.receive_stream(response, cancel, &ctx, on_delta).await
            }
            Mode::Buffered => self.receive_buffered(response, cancel, &mut ctx).await,
        }
    }

    async fn send(
        &self,
        url: &str,
        body: &GenerateContentRequest,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
    }

    async fn receive_stream(
        &self,
        response: reqwest::Response,
        cancel: &CancellationToken,
        ctx: &CallContext<'_>,
        on_delta: &mut (dyn for<'a> FnMut(StreamDelta<'a>) + Send),
    ) -> Result<PipelineResult, PipelineError> {
        tracing::debug!(phase = ?CallPhase::StreamingReceiving);
        let status = response.status().as_u16();
        let mut bytes = response.bytes_stream();
        let mut parser = EventStreamParser::new();
        let mut accumulator = ResponseAccumulator::new();
        let mut recorded_chunks = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return Err(ctx.cancel(accumulator.partial()));
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ctx.cancel(accumulator.partial())),
                next = bytes.next() => next,
            };

            let read = match next {
                Some(Ok(read)) => read,
                Some(Err(err)) => return Err(ctx.fail(network_error(err), Some(status), None)),
                None => break,
            };

            for chunk in parser.feed(&read) {
                if cancel.is_cancelled() {
                    return Err(ctx.cancel(accumulator.partial()));
                }
                if self.recorder.is_enabled() {
                    recorded_chunks.push(to_debug_value(&chunk));
                }
                if let Some(extraction) = accumulator.ingest(&chunk) {
                    emit(&extraction, on_delta);
                }
            }
        }

        if let Some(chunk) = parser.finish() {
            if self.recorder.is_enabled() {
                recorded_chunks.push(to_debug_value(&chunk));
            }
            if let Some(extraction) = accumulator.ingest(&chunk) {
                emit(&extraction, on_delta);
            }
        }

        tracing::info!(
            phase = ?CallPhase::Completed,
            chunks = accumulator.chunk_count(),
            text_len = accumulator.text().len(),
            "gemini stream completed"
        );
        let timing = ctx.timing();
        self.recorder.record_success(
            ctx.record_id,
            status,
            Value::Array(recorded_chunks),
            ctx.started.elapsed(),
            ctx.ttfb,
        );
        Ok(accumulator.into_result(timing))
    }

    async fn receive_buffered(
        &self,
        response: reqwest::Response,
        cancel: &CancellationToken,
        ctx: &mut CallContext<'_>,
    ) -> Result<PipelineResult, PipelineError> {
        tracing::debug!(phase = ?CallPhase::BufferedReceiving);
        let status = response.status().as_u16();
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ctx.cancel(PartialOutput::default())),
            body = response.text() => body.map_err(|err| ctx.fail(network_error(err), Some(status), None))?,
        };
        ctx.ttfb = Some(ctx.started.elapsed());

        let chunk = match parse_response_body(&raw) {
            Ok(chunk) => chunk,
            Err(err) => {
                let error = PipelineError::Unknown(format!("malformed response: {err}"));
                return Err(ctx.fail(error, Some(status), Some(raw)));
            }
        };

        let mut accumulator = ResponseAccumulator::new();
        accumulator.ingest(&chunk);

        tracing::info!(
            phase = ?CallPhase::Completed,
            text_len = accumulator.text().len(),
            "gemini call completed"
        );
        let timing = ctx.timing();
        if self.recorder.is_enabled() {
            self.recorder.record_success(
                ctx.record_id,
                status,
                to_debug_value(&chunk),
                ctx.started.elapsed(),
                ctx.ttfb,
            );
        }
        Ok(accumulator.into_result(timing))
    }
}

#[async_trait::async_trait]
impl ChatPipeline for GeminiClient {
    async fn generate(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        GeminiClient::generate(self, request, cancel).await
    }

    async fn stream(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        on_delta: &mut (dyn for<'a> FnMut(StreamDelta<'a>) + Send),
    ) -> Result<PipelineResult, PipelineError> {
        self.execute(request, cancel, Mode::Streaming, on_delta).await
    }
}
