//! Per-model request-shaping metadata.
//!
//! Request building consults a [`CapabilityResolver`] instead of inspecting
//! model names itself, so callers can plug in a registry that knows about
//! models released after this crate.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReasoningShape {
    #[default]
    None,
    /// Discrete effort levels (`thinkingLevel`).
    Level,
    /// Token budget (`thinkingBudget`), with the value used when the caller sets none.
    Budget { default_budget: i32 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModelCapability {
    pub reasoning: ReasoningShape,
    pub supports_reasoning_trace: bool,
    pub image_output: bool,
    pub image_resolution: bool,
}

pub trait CapabilityResolver: Send + Sync {
    fn resolve(&self, model: &str) -> ModelCapability;
}

impl<F> CapabilityResolver for F
where
    F: Fn(&str) -> ModelCapability + Send + Sync,
{
    fn resolve(&self, model: &str) -> ModelCapability {
        self(model)
    }
}

/// Built-in table for the Gemini model family, matched by name prefix.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticCapabilities;

impl CapabilityResolver for StaticCapabilities {
    fn resolve(&self, model: &str) -> ModelCapability {
        let model = model.trim();
        let model = model.strip_prefix("models/").unwrap_or(model);
        let is_image = model.contains("image");

        if model.starts_with("gemini-3") {
            if is_image {
                return ModelCapability {
                    reasoning: ReasoningShape::None,
                    supports_reasoning_trace: true,
                    image_output: true,
                    image_resolution: true,
                };
            }
            return ModelCapability {
                reasoning: ReasoningShape::Level,
                supports_reasoning_trace: true,
                ..Default::default()
            };
        }

        if is_image {
            return ModelCapability {
                image_output: true,
                ..Default::default()
            };
        }

        let default_budget = if model.starts_with("gemini-2.5-pro") {
            32768
        } else if model.starts_with("gemini-2.5-flash-lite") {
            512
        } else if model.starts_with("gemini-2.5-flash") {
            24576
        } else {
            return ModelCapability::default();
        };

        ModelCapability {
            reasoning: ReasoningShape::Budget { default_budget },
            supports_reasoning_trace: true,
            ..Default::default()
        }
    }
}
