//! Gemini `generateContent` backend

use crate::backend::AnalysisBackend;
use crate::client::{HttpClientConfig, create_client};
use crate::retry_after::{parse_retry_after, retry_delay_from_error_body};
use crate::{AnalysisError, BackendError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};
use trailguard_core::AnalysisRequest;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Upper bound on pages fetched by `list_models`
const MAX_MODEL_PAGES: usize = 10;

/// Gemini backend configuration
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`
    pub api_key: String,

    /// Base URL without the version path
    pub base_url: String,

    /// Model identifier, without the `models/` prefix
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// HTTP client configuration
    pub client_config: HttpClientConfig,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("client_config", &self.client_config)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            client_config: HttpClientConfig::default(),
        }
    }

    /// Read the key from `GEMINI_API_KEY`
    pub fn from_env() -> Result<Self> {
        let api_key =
            std::env::var(API_KEY_ENV).map_err(|_| AnalysisError::MissingCredential(API_KEY_ENV))?;
        Ok(Self::new(api_key))
    }

    /// Set the base URL (for custom endpoints)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_client_config(mut self, client_config: HttpClientConfig) -> Self {
        self.client_config = client_config;
        self
    }
}

/// A model that can serve `generateContent`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// Resource name, e.g. `models/gemini-flash-latest`
    pub name: String,
    pub display_name: String,
}

/// Gemini backend
pub struct GeminiBackend {
    config: GeminiConfig,
    client: Client,
}

impl fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("config", &self.config)
            .finish()
    }
}

impl GeminiBackend {
    /// Create a backend. Fails before any network activity when the API key
    /// is empty.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AnalysisError::MissingCredential(API_KEY_ENV));
        }
        if config.model.trim().is_empty() {
            return Err(AnalysisError::Config("model must not be empty".to_string()));
        }

        let client = create_client(&config.client_config)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn model_path(&self) -> String {
        let model = self.config.model.trim();
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/v1beta/{}:generateContent", self.base_url(), self.model_path())
    }

    fn build_body(&self, request: &AnalysisRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part {
                        text: request.instruction.clone(),
                    },
                    Part {
                        text: request.context.clone(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
            },
        }
    }

    /// Models available to this key that support `generateContent`
    #[instrument(skip(self))]
    pub async fn list_models(&self) -> std::result::Result<Vec<ModelInfo>, BackendError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_MODEL_PAGES {
            let url = format!("{}/v1beta/models", self.base_url());
            let mut request = self
                .client
                .get(&url)
                .header("x-goog-api-key", &self.config.api_key)
                .query(&[("pageSize", "100")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await?;
            let page: ListModelsResponse = read_success(response).await?;

            models.extend(
                page.models
                    .into_iter()
                    .filter(|m| {
                        m.supported_generation_methods
                            .iter()
                            .any(|method| method == "generateContent")
                    })
                    .map(|m| ModelInfo {
                        display_name: m.display_name.unwrap_or_else(|| m.name.clone()),
                        name: m.name,
                    }),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = models.len(), "Listed generateContent models");
        Ok(models)
    }
}

#[async_trait]
impl AnalysisBackend for GeminiBackend {
    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn generate(&self, request: AnalysisRequest) -> std::result::Result<String, BackendError> {
        let body = self.build_body(&request);

        debug!(
            payload_bytes = request.payload_bytes(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let parsed: GenerateContentResponse = read_success(response).await?;
        parsed.into_text()
    }
}

/// Map a non-success response to an error, otherwise decode the body
async fn read_success<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> std::result::Result<T, BackendError> {
    let status = response.status();
    let header_hint = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);

    let body = response.text().await?;

    if !status.is_success() {
        return Err(classify_error(status.as_u16(), &body, header_hint));
    }

    serde_json::from_str(&body).map_err(|e| BackendError::Parse(e.to_string()))
}

fn classify_error(status_code: u16, body: &str, header_hint: Option<u64>) -> BackendError {
    let json: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let api_status = json
        .as_ref()
        .and_then(|v| v.pointer("/error/status"))
        .and_then(|v| v.as_str());
    let message = json
        .as_ref()
        .and_then(|v| v.pointer("/error/message"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());

    if status_code == 429 || api_status == Some("RESOURCE_EXHAUSTED") {
        let body_hint = json.as_ref().and_then(retry_delay_from_error_body);
        return BackendError::RateLimited {
            retry_after_secs: header_hint.or(body_hint),
        };
    }

    match status_code {
        400 => BackendError::InvalidRequest(message),
        401 | 403 => BackendError::Authentication(message),
        _ => BackendError::Provider {
            status_code,
            message,
        },
    }
}

// Wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> std::result::Result<String, BackendError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(BackendError::Blocked(reason));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Parse("response has no candidates".to_string()))?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();

        if text.is_empty() {
            return Err(match candidate.finish_reason {
                Some(reason) if reason != "STOP" => BackendError::Blocked(reason),
                _ => BackendError::Parse("candidate has no text".to_string()),
            });
        }

        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<RemoteModel>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteModel {
    name: String,
    display_name: Option<String>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            instruction: "Review these logs".to_string(),
            context: "<PERSON_1> deleted file".to_string(),
            template_version: "di-audit/1".to_string(),
            question: None,
        }
    }

    #[test]
    fn test_missing_key_rejected_at_construction() {
        let err = GeminiBackend::new(GeminiConfig::new("  ")).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingCredential(API_KEY_ENV)));
    }

    #[test]
    fn test_config_debug_hides_key() {
        let config = GeminiConfig::new("secret-key-123");
        assert!(!format!("{:?}", config).contains("secret-key-123"));
    }

    #[test]
    fn test_generate_url() {
        let backend = GeminiBackend::new(
            GeminiConfig::new("k").with_base_url("http://localhost:9000/"),
        )
        .unwrap();
        assert_eq!(
            backend.generate_url(),
            "http://localhost:9000/v1beta/models/gemini-flash-latest:generateContent"
        );

        let backend = GeminiBackend::new(GeminiConfig::new("k").with_model("models/custom")).unwrap();
        assert!(backend.generate_url().ends_with("/v1beta/models/custom:generateContent"));
    }

    #[test]
    fn test_body_has_two_parts_and_temperature() {
        let backend = GeminiBackend::new(GeminiConfig::new("k")).unwrap();
        let body = serde_json::to_value(backend.build_body(&request())).unwrap();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "Review these logs");
        assert_eq!(body["contents"][0]["parts"][1]["text"], "<PERSON_1> deleted file");
        let temperature = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_classify_errors() {
        assert!(matches!(
            classify_error(429, "", Some(3)),
            BackendError::RateLimited {
                retry_after_secs: Some(3)
            }
        ));
        assert!(matches!(
            classify_error(
                503,
                r#"{"error": {"status": "RESOURCE_EXHAUSTED", "message": "quota"}}"#,
                None
            ),
            BackendError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_error(400, r#"{"error": {"message": "bad field"}}"#, None),
            BackendError::InvalidRequest(m) if m == "bad field"
        ));
        assert!(matches!(
            classify_error(403, "denied", None),
            BackendError::Authentication(_)
        ));
        assert!(matches!(
            classify_error(500, "boom", None),
            BackendError::Provider {
                status_code: 500,
                ..
            }
        ));
    }

    #[test]
    fn test_response_text_joined_across_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r###"{"candidates": [{"content": {"role": "model", "parts": [{"text": "## Report"}, {"text": "\nAll clear"}]}, "finishReason": "STOP"}]}"###,
        )
        .unwrap();
        assert_eq!(response.into_text().unwrap(), "## Report\nAll clear");
    }

    #[test]
    fn test_blocked_prompt() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(matches!(response.into_text(), Err(BackendError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn test_empty_candidates() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(response.into_text(), Err(BackendError::Parse(_))));
    }
}
