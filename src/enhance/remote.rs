//! Remote inference service client.
//!
//! The service contract is `invoke({model, inputs, parameters}) →
//! {generated_text}`. [`HttpRemoteInference`] speaks the Hugging Face
//! inference API shape. HTTP failures are classified into the
//! [`PlanError`] remote variants so the orchestrator can decide between
//! cool-down, alternate model, and fallthrough:
//!
//! - 429 → `RemoteRateLimited` (with `Retry-After` when given)
//! - 402, or 403 mentioning a quota/limit → `RemoteQuotaExceeded`
//! - 5xx → `RemoteInfrastructureOutage`
//! - other 4xx and network errors → `RemoteTransport`
//! - unparseable bodies → `RemoteInvalidResponse`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RemoteServiceConfig;
use crate::error::PlanError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParameters {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub return_full_text: bool,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            max_new_tokens: 600,
            temperature: 0.7,
            return_full_text: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRequest {
    /// Not part of the request body; selects the endpoint.
    #[serde(skip)]
    pub model: String,
    pub inputs: String,
    pub parameters: GenerationParameters,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InferenceResponse {
    pub generated_text: String,
}

#[async_trait]
pub trait RemoteInference: Send + Sync {
    async fn invoke(&self, request: &InferenceRequest) -> Result<InferenceResponse, PlanError>;

    /// Whether the service is authenticated and responding.
    async fn probe(&self) -> bool;
}

pub struct HttpRemoteInference {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    probe_model: Option<String>,
}

impl HttpRemoteInference {
    pub fn new(config: &RemoteServiceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            probe_model: config.model.clone(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/{}", self.base_url, model)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

/// Map a non-success status and body to an error.
pub fn classify_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> PlanError {
    let lower = body.to_lowercase();
    match status.as_u16() {
        429 => PlanError::RemoteRateLimited {
            retry_after_secs: retry_after,
        },
        402 => PlanError::RemoteQuotaExceeded(body_summary(body)),
        403 if lower.contains("quota") || lower.contains("limit") => {
            PlanError::RemoteQuotaExceeded(body_summary(body))
        }
        s if (500..600).contains(&s) => {
            PlanError::RemoteInfrastructureOutage(format!("HTTP {}: {}", s, body_summary(body)))
        }
        s => PlanError::RemoteTransport(format!("HTTP {}: {}", s, body_summary(body))),
    }
}

fn body_summary(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(200) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Accepts `[{"generated_text": ..}]` and `{"generated_text": ..}`.
pub fn parse_response(body: &str) -> Result<InferenceResponse, PlanError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| PlanError::RemoteInvalidResponse(format!("not JSON: {e}")))?;
    let item = match &value {
        serde_json::Value::Array(items) => items.first().cloned().unwrap_or_default(),
        other => other.clone(),
    };
    if let Some(err) = item.get("error").and_then(|e| e.as_str()) {
        return Err(PlanError::RemoteInvalidResponse(err.to_string()));
    }
    serde_json::from_value(item)
        .map_err(|e| PlanError::RemoteInvalidResponse(format!("missing generated_text: {e}")))
}

#[async_trait]
impl RemoteInference for HttpRemoteInference {
    async fn invoke(&self, request: &InferenceRequest) -> Result<InferenceResponse, PlanError> {
        let url = self.endpoint(&request.model);
        debug!(model = %request.model, "Remote inference call");
        let response = self
            .authorized(self.client.post(&url).json(request))
            .send()
            .await
            .map_err(|e| PlanError::RemoteTransport(e.to_string()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response
            .text()
            .await
            .map_err(|e| PlanError::RemoteTransport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status, retry_after, &body));
        }
        parse_response(&body)
    }

    async fn probe(&self) -> bool {
        let (Some(_), Some(model)) = (&self.api_key, &self.probe_model) else {
            return false;
        };
        match self.authorized(self.client.get(self.endpoint(model))).send().await {
            Ok(response) => {
                let status = response.status();
                !(status.is_server_error()
                    || status == StatusCode::UNAUTHORIZED
                    || status == StatusCode::FORBIDDEN)
            }
            Err(_) => false,
        }
    }
}
