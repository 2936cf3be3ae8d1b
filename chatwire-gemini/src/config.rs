use secrecy::{ExposeSecret, SecretString};

use chatwire_core::PipelineError;

use crate::endpoint::{normalize_endpoint, validate_endpoint};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Endpoint, credential and model for one provider account.
///
/// An empty endpoint means "use the public default".
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub endpoint: String,
    pub api_key: SecretString,
    pub model: String,
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: String::new(),
            api_key: SecretString::new(api_key.into()),
            model: model.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Reads `GEMINI_API_KEY` (required), `GEMINI_ENDPOINT` and `GEMINI_MODEL`.
    pub fn from_env() -> Result<Self, PipelineError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| PipelineError::Validation("GEMINI_API_KEY is not set".to_string()))?;
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let mut config = Self::new(api_key, model);
        if let Ok(endpoint) = std::env::var("GEMINI_ENDPOINT") {
            config.endpoint = endpoint;
        }
        Ok(config)
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_endpoint(&self.endpoint)
    }

    /// Local checks run before any request is built.
    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_endpoint(&self.endpoint)?;
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(PipelineError::Validation(
                "api_key cannot be empty".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(PipelineError::Validation("model cannot be empty".to_string()));
        }
        Ok(())
    }
}
