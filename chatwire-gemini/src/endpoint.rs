use chatwire_core::PipelineError;

pub const API_VERSION: &str = "v1beta";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Canonical base URL: no trailing slash, always ending in the API version.
pub fn normalize_endpoint(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_ENDPOINT.to_string();
    }
    let base = trimmed.trim_end_matches('/');
    let suffix = format!("/{API_VERSION}");
    if base.ends_with(&suffix) {
        base.to_string()
    } else {
        format!("{base}{suffix}")
    }
}

/// An empty endpoint is valid and selects [`DEFAULT_ENDPOINT`].
pub fn validate_endpoint(raw: &str) -> Result<(), PipelineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    let url = url::Url::parse(trimmed)
        .map_err(|err| PipelineError::Validation(format!("invalid endpoint URL: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PipelineError::Validation(format!(
            "endpoint must use http or https, got '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(PipelineError::Validation(
            "endpoint must include a host".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_selects_default() {
        assert_eq!(normalize_endpoint(""), DEFAULT_ENDPOINT);
        assert_eq!(normalize_endpoint("   "), DEFAULT_ENDPOINT);
    }

    #[test]
    fn appends_version_once() {
        assert_eq!(
            normalize_endpoint("https://proxy.example.com/"),
            "https://proxy.example.com/v1beta"
        );
        assert_eq!(
            normalize_endpoint("https://proxy.example.com/v1beta//"),
            "https://proxy.example.com/v1beta"
        );
    }

    #[test]
    fn validation_accepts_blank_and_http_urls() {
        assert!(validate_endpoint("").is_ok());
        assert!(validate_endpoint("http://localhost:8080").is_ok());
        assert!(validate_endpoint("https://proxy.example.com/gemini").is_ok());
    }

    #[test]
    fn validation_rejects_relative_and_foreign_schemes() {
        assert!(matches!(
            validate_endpoint("proxy.example.com"),
            Err(PipelineError::Validation(message)) if message.starts_with("invalid endpoint URL")
        ));
        assert!(matches!(
            validate_endpoint("ws://proxy.example.com"),
            Err(PipelineError::Validation(message)) if message.contains("'ws'")
        ));
    }

    #[test]
    fn validation_rejects_missing_host() {
        assert!(validate_endpoint("http://").is_err());
    }
}
