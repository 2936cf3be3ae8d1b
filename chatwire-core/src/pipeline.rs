use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{ChatRequest, InlineData, PipelineError, PipelineResult};

/// Incremental notification emitted while a streaming call is receiving.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamDelta<'a> {
    Text(&'a str),
    Reasoning(&'a str),
    Image(&'a InlineData),
    ReasoningImage(&'a InlineData),
}

/// A request/response pipeline against one configured model.
///
/// Each call owns its accumulator state; `cancel` is polled between reads
/// and a fired token yields [`PipelineError::Cancelled`] with the partial
/// output. Delta callbacks run on the calling task in arrival order.
#[async_trait]
pub trait ChatPipeline: Send + Sync {
    async fn generate(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError>;

    async fn stream(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        on_delta: &mut (dyn for<'a> FnMut(StreamDelta<'a>) + Send),
    ) -> Result<PipelineResult, PipelineError>;
}
