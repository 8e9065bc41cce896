//! On-device inference engine.
//!
//! The engine contract is `enhance_session(session, profile) →
//! {enhanced_session, improvements, confidence}`. [`OllamaEngine`] runs it
//! against a local Ollama instance (`POST /api/generate`) using the same
//! prompt as the remote tier.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use plan_harness_core::enrich::{build_prompt, parse_generated_text};
use plan_harness_core::knowledge::intensity_for;
use plan_harness_core::models::{AthleteProfile, EnhancedSession, SessionRecord};

use crate::config::LocalEngineConfig;
use crate::error::PlanError;

/// Confidence of a fully generated on-device enhancement.
pub const LOCAL_BASE_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, PartialEq)]
pub struct LocalOutput {
    pub enhanced_session: EnhancedSession,
    pub improvements: Vec<String>,
    pub confidence: f64,
}

#[async_trait]
pub trait LocalEngine: Send + Sync {
    async fn enhance_session(
        &self,
        session: &SessionRecord,
        profile: &AthleteProfile,
    ) -> Result<LocalOutput, PlanError>;

    /// Whether the engine is loaded and answering.
    async fn probe(&self) -> bool;
}

pub struct OllamaEngine {
    client: reqwest::Client,
    url: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaEngine {
    pub fn new(config: &LocalEngineConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("enhancement.local.model required for Ollama engine"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl LocalEngine for OllamaEngine {
    async fn enhance_session(
        &self,
        session: &SessionRecord,
        profile: &AthleteProfile,
    ) -> Result<LocalOutput, PlanError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": build_prompt(session, profile),
            "stream": false,
        });
        debug!(session = %session.id, model = %self.model, "Local engine call");
        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                PlanError::RemoteTransport(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PlanError::RemoteTransport(format!(
                "Ollama API error {}: {}",
                status, text
            )));
        }
        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PlanError::RemoteInvalidResponse(e.to_string()))?;

        let partial = parse_generated_text(&generated.response);
        if partial.is_empty() {
            return Err(PlanError::RemoteInvalidResponse(
                "local engine returned no recognizable sections".to_string(),
            ));
        }
        // Sections the model left out stay empty; the orchestrator fills
        // and penalizes them.
        let enhanced_session = EnhancedSession {
            session: session.clone(),
            objectives: partial.objectives,
            warm_up: partial.warm_up,
            drills: partial.drills,
            coaching_points: partial.coaching_points,
            cool_down: partial.cool_down,
            equipment: partial.equipment,
            intensity: intensity_for(profile.difficulty, profile.age_group).to_string(),
        };
        let improvements = vec![format!("Generated on-device with {}", self.model)];
        Ok(LocalOutput {
            enhanced_session,
            improvements,
            confidence: LOCAL_BASE_CONFIDENCE,
        })
    }

    async fn probe(&self) -> bool {
        match self.client.get(format!("{}/api/tags", self.url)).send().await {
            Ok(response) if response.status().is_success() => {
                let Ok(json) = response.json::<serde_json::Value>().await else {
                    return false;
                };
                json.get("models")
                    .and_then(|m| m.as_array())
                    .is_some_and(|models| {
                        models.iter().any(|m| {
                            m.get("name")
                                .and_then(|n| n.as_str())
                                .is_some_and(|n| n == self.model || n.starts_with(&format!("{}:", self.model)))
                        })
                    })
            }
            _ => false,
        }
    }
}
