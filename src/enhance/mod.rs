//! Enhancement orchestration across the three tiers.
//!
//! Each request walks a small state machine:
//!
//! ```text
//! SelectService ─Selected(Local)────▶ LocalInfer  ─┬─Succeeded─▶ Merge ─Merged─▶ Done
//!               ─Selected(Remote)───▶ RemoteInfer ─┤
//!               ─Selected(RuleBased)▶ RuleBased  ──┘
//! LocalInfer / RemoteInfer ─Failed─▶ SelectService
//! ```
//!
//! [`transition`] is the whole table. The route of tiers tried in
//! `SelectService` comes from [`plan_route`]: the configured [`Policy`],
//! the [`TaskKind`], and the live availability flags. The rule-based tier
//! ends every route, so every request produces a record.
//!
//! Remote calls go through the global [`RemoteQueue`]; local calls are
//! batched by [`Orchestrator::enhance_sessions`].

pub mod local;
pub mod queue;
pub mod remote;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use plan_harness_core::enrich::{
    build_prompt, from_generated_text, from_structured, rule_based, REMOTE_BASE_CONFIDENCE,
};
use plan_harness_core::models::{
    clamp_confidence, AthleteProfile, EnhancementRecord, EnhancementSource, SessionRecord,
};

use crate::config::EnhancementConfig;
use local::{LocalEngine, OllamaEngine};
use queue::{QueueSettings, RemoteQueue};
use remote::{GenerationParameters, HttpRemoteInference, InferenceRequest, RemoteInference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    LocalFirst,
    RemoteFirst,
    /// Per task: single sessions prefer the remote service, bulk work
    /// prefers the on-device engine.
    Balanced,
}

impl Policy {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "local-first" | "local" => Some(Self::LocalFirst),
            "remote-first" | "remote" => Some(Self::RemoteFirst),
            "balanced" => Some(Self::Balanced),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalFirst => "local-first",
            Self::RemoteFirst => "remote-first",
            Self::Balanced => "balanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// One session, interactively.
    Session,
    /// Many sessions at once (a week or a whole plan).
    Bulk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Local,
    Remote,
    RuleBased,
}

/// Live availability of the optional tiers. The rule-based tier is
/// always available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    pub local: bool,
    pub remote: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SelectService,
    LocalInfer,
    RemoteInfer,
    RuleBased,
    Merge,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Selected(Tier),
    Succeeded,
    Failed,
    Merged,
}

/// The transition table. `None` marks an event the stage cannot accept.
pub fn transition(stage: Stage, event: Event) -> Option<Stage> {
    use Event::*;
    use Stage::*;
    match (stage, event) {
        (SelectService, Selected(Tier::Local)) => Some(LocalInfer),
        (SelectService, Selected(Tier::Remote)) => Some(RemoteInfer),
        (SelectService, Selected(Tier::RuleBased)) => Some(RuleBased),
        (LocalInfer | RemoteInfer | RuleBased, Succeeded) => Some(Merge),
        (LocalInfer | RemoteInfer, Failed) => Some(SelectService),
        (Merge, Merged) => Some(Done),
        _ => None,
    }
}

/// Tiers to try in order. Unavailable tiers are skipped; the rule-based
/// tier is always last.
pub fn plan_route(policy: Policy, task: TaskKind, available: Capabilities) -> Vec<Tier> {
    let preferred: [Tier; 2] = match (policy, task) {
        (Policy::LocalFirst, _) | (Policy::Balanced, TaskKind::Bulk) => [Tier::Local, Tier::Remote],
        (Policy::RemoteFirst, _) | (Policy::Balanced, TaskKind::Session) => {
            [Tier::Remote, Tier::Local]
        }
    };
    let mut route: Vec<Tier> = preferred
        .into_iter()
        .filter(|tier| match tier {
            Tier::Local => available.local,
            Tier::Remote => available.remote,
            Tier::RuleBased => true,
        })
        .collect();
    route.push(Tier::RuleBased);
    route
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub policy: Policy,
    pub probe_timeout: Duration,
    pub local_batch_size: usize,
    pub inter_batch_delay: Duration,
    /// Primary remote model first, then the alternates.
    pub remote_models: Vec<String>,
    pub queue: QueueSettings,
}

impl OrchestratorSettings {
    pub fn from_config(config: &EnhancementConfig) -> Self {
        Self {
            policy: Policy::parse(&config.policy).unwrap_or(Policy::Balanced),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            local_batch_size: config.local_batch_size.max(1),
            inter_batch_delay: Duration::from_millis(config.inter_batch_delay_ms),
            remote_models: config.remote.models(),
            queue: QueueSettings::from_config(&config.remote),
        }
    }
}

pub struct Orchestrator {
    settings: OrchestratorSettings,
    local: Option<Arc<dyn LocalEngine>>,
    remote: Option<Arc<dyn RemoteInference>>,
    queue: Option<RemoteQueue>,
    local_available: AtomicBool,
    remote_available: AtomicBool,
}

impl Orchestrator {
    /// Build with explicit tiers. Spawns the remote queue worker, so a
    /// tokio runtime must be running when a remote tier is given.
    pub fn new(
        settings: OrchestratorSettings,
        local: Option<Arc<dyn LocalEngine>>,
        remote: Option<Arc<dyn RemoteInference>>,
    ) -> Self {
        let queue = remote
            .as_ref()
            .map(|client| RemoteQueue::spawn(client.clone(), settings.queue));
        Self {
            settings,
            local,
            remote,
            queue,
            local_available: AtomicBool::new(false),
            remote_available: AtomicBool::new(false),
        }
    }

    /// Build the tiers named in the configuration.
    pub fn from_config(config: &EnhancementConfig) -> Result<Self> {
        let local: Option<Arc<dyn LocalEngine>> = if config.local.is_enabled() {
            Some(Arc::new(OllamaEngine::new(&config.local)?))
        } else {
            None
        };
        let remote: Option<Arc<dyn RemoteInference>> = if config.remote.is_enabled() {
            Some(Arc::new(HttpRemoteInference::new(&config.remote)?))
        } else {
            None
        };
        Ok(Self::new(OrchestratorSettings::from_config(config), local, remote))
    }

    pub fn policy(&self) -> Policy {
        self.settings.policy
    }

    pub fn set_policy(&mut self, policy: Policy) {
        self.settings.policy = policy;
    }

    /// Probe each configured tier once, bounded by the probe timeout. A
    /// probe that times out leaves its tier unavailable.
    pub async fn init(&self) -> Capabilities {
        let timeout = self.settings.probe_timeout;
        let local = match &self.local {
            Some(engine) => probe_with_timeout("local", timeout, engine.probe()).await,
            None => false,
        };
        let remote = match &self.remote {
            Some(client) => probe_with_timeout("remote", timeout, client.probe()).await,
            None => false,
        };
        self.local_available.store(local, Ordering::SeqCst);
        self.remote_available.store(remote, Ordering::SeqCst);
        let caps = self.capabilities();
        info!(local = caps.local, remote = caps.remote, policy = self.policy().as_str(), "Enhancement tiers ready");
        caps
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            local: self.local.is_some() && self.local_available.load(Ordering::SeqCst),
            remote: self.queue.is_some() && self.remote_available.load(Ordering::SeqCst),
        }
    }

    /// Override the local engine's availability at runtime.
    pub fn set_local_available(&self, available: bool) {
        self.local_available.store(available, Ordering::SeqCst);
    }

    /// Override the remote service's availability at runtime.
    pub fn set_remote_available(&self, available: bool) {
        self.remote_available.store(available, Ordering::SeqCst);
    }

    /// Enhance one session. Never fails: the rule-based tier ends every route.
    pub async fn enhance(
        &self,
        session: &SessionRecord,
        profile: &AthleteProfile,
        task: TaskKind,
    ) -> EnhancementRecord {
        let mut route = plan_route(self.policy(), task, self.capabilities()).into_iter();
        let mut stage = Stage::SelectService;
        let mut candidate: Option<EnhancementRecord> = None;

        loop {
            let event = match stage {
                Stage::SelectService => Event::Selected(route.next().unwrap_or(Tier::RuleBased)),
                Stage::LocalInfer => {
                    candidate = self.run_local(session, profile).await;
                    outcome(&candidate)
                }
                Stage::RemoteInfer => {
                    candidate = self.run_remote(session, profile).await;
                    outcome(&candidate)
                }
                Stage::RuleBased => {
                    candidate = Some(rule_based(session, profile, Utc::now()));
                    Event::Succeeded
                }
                Stage::Merge => Event::Merged,
                Stage::Done => break,
            };
            stage = match transition(stage, event) {
                Some(next) => next,
                None => {
                    warn!(?stage, ?event, "Invalid enhancement transition; using rule-based tier");
                    Stage::RuleBased
                }
            };
        }

        let mut record = candidate.unwrap_or_else(|| rule_based(session, profile, Utc::now()));
        record.confidence = clamp_confidence(record.confidence);
        debug!(
            session = %session.id,
            source = record.source.as_str(),
            confidence = record.confidence,
            "Session enhanced"
        );
        record
    }

    /// Enhance many sessions in order. Work proceeds in batches of
    /// `local_batch_size`; batches run one after another with the
    /// inter-batch delay when the on-device engine is on the route. A
    /// failed item falls through on its own.
    pub async fn enhance_sessions(
        &self,
        sessions: &[SessionRecord],
        profile: &AthleteProfile,
    ) -> Vec<EnhancementRecord> {
        let task = if sessions.len() > 1 {
            TaskKind::Bulk
        } else {
            TaskKind::Session
        };
        let uses_local = plan_route(self.policy(), task, self.capabilities()).contains(&Tier::Local);

        let mut records = Vec::with_capacity(sessions.len());
        for (i, batch) in sessions.chunks(self.settings.local_batch_size).enumerate() {
            if i > 0 && uses_local && !self.settings.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_batch_delay).await;
            }
            let results = join_all(batch.iter().map(|s| self.enhance(s, profile, task))).await;
            records.extend(results);
        }
        records
    }

    async fn run_local(&self, session: &SessionRecord, profile: &AthleteProfile) -> Option<EnhancementRecord> {
        let engine = self.local.as_ref()?;
        match engine.enhance_session(session, profile).await {
            Ok(output) => {
                let record = from_structured(
                    session,
                    profile,
                    &output.enhanced_session,
                    output.improvements,
                    output.confidence,
                    EnhancementSource::Local,
                    Utc::now(),
                );
                if record.is_none() {
                    warn!(session = %session.id, "Local engine returned empty content");
                }
                record
            }
            Err(e) => {
                warn!(session = %session.id, error = %e, "Local engine failed; falling through");
                None
            }
        }
    }

    async fn run_remote(&self, session: &SessionRecord, profile: &AthleteProfile) -> Option<EnhancementRecord> {
        let queue = self.queue.as_ref()?;
        let prompt = build_prompt(session, profile);
        for model in &self.settings.remote_models {
            let request = InferenceRequest {
                model: model.clone(),
                inputs: prompt.clone(),
                parameters: GenerationParameters::default(),
            };
            match queue.submit(request).await {
                Ok(response) => {
                    let record = from_generated_text(
                        session,
                        profile,
                        &response.generated_text,
                        EnhancementSource::Remote,
                        REMOTE_BASE_CONFIDENCE,
                        Utc::now(),
                    );
                    if record.is_none() {
                        warn!(session = %session.id, model = %model, "Remote response had no usable sections");
                    }
                    return record;
                }
                Err(e) if e.is_throttle() => {
                    warn!(session = %session.id, model = %model, error = %e, "Remote model throttled; trying next model");
                }
                Err(e) => {
                    warn!(session = %session.id, model = %model, error = %e, "Remote call failed; falling through");
                    return None;
                }
            }
        }
        warn!(session = %session.id, "All remote models throttled; falling through");
        None
    }
}

fn outcome(candidate: &Option<EnhancementRecord>) -> Event {
    if candidate.is_some() {
        Event::Succeeded
    } else {
        Event::Failed
    }
}

async fn probe_with_timeout(
    tier: &str,
    timeout: Duration,
    probe: impl std::future::Future<Output = bool>,
) -> bool {
    match tokio::time::timeout(timeout, probe).await {
        Ok(available) => {
            if !available {
                warn!(tier, "Enhancement tier unavailable");
            }
            available
        }
        Err(_) => {
            warn!(tier, timeout_secs = timeout.as_secs(), "Probe timed out; continuing without this tier");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: Capabilities = Capabilities {
        local: true,
        remote: true,
    };

    #[test]
    fn transition_table() {
        assert_eq!(
            transition(Stage::SelectService, Event::Selected(Tier::Local)),
            Some(Stage::LocalInfer)
        );
        assert_eq!(
            transition(Stage::SelectService, Event::Selected(Tier::Remote)),
            Some(Stage::RemoteInfer)
        );
        assert_eq!(
            transition(Stage::SelectService, Event::Selected(Tier::RuleBased)),
            Some(Stage::RuleBased)
        );
        assert_eq!(transition(Stage::LocalInfer, Event::Succeeded), Some(Stage::Merge));
        assert_eq!(transition(Stage::RemoteInfer, Event::Succeeded), Some(Stage::Merge));
        assert_eq!(transition(Stage::RuleBased, Event::Succeeded), Some(Stage::Merge));
        assert_eq!(transition(Stage::LocalInfer, Event::Failed), Some(Stage::SelectService));
        assert_eq!(transition(Stage::RemoteInfer, Event::Failed), Some(Stage::SelectService));
        assert_eq!(transition(Stage::Merge, Event::Merged), Some(Stage::Done));
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        assert_eq!(transition(Stage::RuleBased, Event::Failed), None);
        assert_eq!(transition(Stage::Done, Event::Merged), None);
        assert_eq!(transition(Stage::SelectService, Event::Succeeded), None);
        assert_eq!(transition(Stage::Merge, Event::Selected(Tier::Local)), None);
    }

    #[test]
    fn routes_follow_policy_and_task() {
        assert_eq!(
            plan_route(Policy::LocalFirst, TaskKind::Session, BOTH),
            vec![Tier::Local, Tier::Remote, Tier::RuleBased]
        );
        assert_eq!(
            plan_route(Policy::RemoteFirst, TaskKind::Bulk, BOTH),
            vec![Tier::Remote, Tier::Local, Tier::RuleBased]
        );
        assert_eq!(
            plan_route(Policy::Balanced, TaskKind::Session, BOTH),
            vec![Tier::Remote, Tier::Local, Tier::RuleBased]
        );
        assert_eq!(
            plan_route(Policy::Balanced, TaskKind::Bulk, BOTH),
            vec![Tier::Local, Tier::Remote, Tier::RuleBased]
        );
    }

    #[test]
    fn availability_overrides_policy() {
        let remote_only = Capabilities {
            local: false,
            remote: true,
        };
        assert_eq!(
            plan_route(Policy::LocalFirst, TaskKind::Bulk, remote_only),
            vec![Tier::Remote, Tier::RuleBased]
        );
        assert_eq!(
            plan_route(Policy::RemoteFirst, TaskKind::Session, Capabilities::default()),
            vec![Tier::RuleBased]
        );
    }

    #[test]
    fn policy_names() {
        assert_eq!(Policy::parse("Local-First"), Some(Policy::LocalFirst));
        assert_eq!(Policy::parse("balanced"), Some(Policy::Balanced));
        assert_eq!(Policy::parse("cheapest"), None);
    }
}
