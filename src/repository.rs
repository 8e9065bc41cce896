//! Typed access to the persisted collections.
//!
//! Documents, plan versions, payloads and session caches all live as JSON
//! (or base64) under well-known keys in a [`KvStore`]. Collections are
//! read-modify-written under one write lock so concurrent pipelines never
//! lose each other's updates.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::Engine;
use tokio::sync::Mutex;

use plan_harness_core::models::{DocumentRecord, SessionRecord, TrainingPlan};
use plan_harness_core::store::{
    get_json, payload_key, put_json, session_cache_key, KvStore, DOCUMENTS_KEY,
    TRAINING_PLANS_KEY,
};

pub struct Repository {
    store: Arc<dyn KvStore>,
    write_lock: Mutex<()>,
}

impl Repository {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    // ── Documents ──

    pub async fn documents(&self) -> Result<Vec<DocumentRecord>> {
        Ok(get_json(self.store.as_ref(), DOCUMENTS_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.documents().await?.into_iter().find(|d| d.id == id))
    }

    /// Insert or replace the record with the same id.
    pub async fn save_document(&self, document: &DocumentRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut documents = self.documents().await?;
        match documents.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document.clone(),
            None => documents.push(document.clone()),
        }
        put_json(self.store.as_ref(), DOCUMENTS_KEY, &documents).await
    }

    // ── Payloads ──

    pub async fn put_payload(&self, document_id: &str, bytes: &[u8]) -> Result<()> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.store.put(&payload_key(document_id), &encoded).await
    }

    /// The stored bytes, `None` when no payload exists. A payload that is
    /// not valid base64 is an error.
    pub async fn payload(&self, document_id: &str) -> Result<Option<Vec<u8>>> {
        let Some(encoded) = self.store.get(&payload_key(document_id)).await? else {
            return Ok(None);
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .with_context(|| format!("Payload for document {document_id} is not valid base64"))?;
        Ok(Some(bytes))
    }

    // ── Plans ──

    /// Every stored version of every plan.
    pub async fn plan_versions_all(&self) -> Result<Vec<TrainingPlan>> {
        Ok(get_json(self.store.as_ref(), TRAINING_PLANS_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Versions of one plan, oldest first.
    pub async fn plan_versions(&self, plan_id: &str) -> Result<Vec<TrainingPlan>> {
        let mut versions: Vec<TrainingPlan> = self
            .plan_versions_all()
            .await?
            .into_iter()
            .filter(|p| p.id == plan_id)
            .collect();
        versions.sort_by_key(|p| p.version);
        Ok(versions)
    }

    pub async fn latest_plan(&self, plan_id: &str) -> Result<Option<TrainingPlan>> {
        Ok(self.plan_versions(plan_id).await?.pop())
    }

    pub async fn latest_plan_for_document(&self, document_id: &str) -> Result<Option<TrainingPlan>> {
        Ok(self
            .plan_versions_all()
            .await?
            .into_iter()
            .filter(|p| p.source_document == document_id)
            .max_by_key(|p| p.version))
    }

    /// The newest version of each plan, oldest plan first.
    pub async fn latest_plans(&self) -> Result<Vec<TrainingPlan>> {
        let mut latest: Vec<TrainingPlan> = Vec::new();
        for plan in self.plan_versions_all().await? {
            match latest.iter_mut().find(|p| p.id == plan.id) {
                Some(existing) if existing.version < plan.version => *existing = plan,
                Some(_) => {}
                None => latest.push(plan),
            }
        }
        latest.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(latest)
    }

    /// Append a new plan version. Existing versions are never rewritten.
    pub async fn append_plan(&self, plan: &TrainingPlan) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut plans = self.plan_versions_all().await?;
        if plans
            .iter()
            .any(|p| p.id == plan.id && p.version == plan.version)
        {
            bail!("Plan {} version {} already exists", plan.id, plan.version);
        }
        plans.push(plan.clone());
        put_json(self.store.as_ref(), TRAINING_PLANS_KEY, &plans).await
    }

    // ── Session caches ──

    pub async fn put_session_cache(&self, document_id: &str, sessions: &[SessionRecord]) -> Result<()> {
        put_json(self.store.as_ref(), &session_cache_key(document_id), sessions).await
    }

    pub async fn session_cache(&self, document_id: &str) -> Result<Option<Vec<SessionRecord>>> {
        get_json(self.store.as_ref(), &session_cache_key(document_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use plan_harness_core::models::{Difficulty, IntegrityStatus, OrganizationLevel, Schedule};
    use plan_harness_core::store::memory::InMemoryStore;

    fn repo() -> Repository {
        Repository::new(Arc::new(InMemoryStore::new()))
    }

    fn document(id: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            original_name: "plan.txt".to_string(),
            declared_type: "text/plain".to_string(),
            size: 4,
            uploaded_at: None,
            processed: false,
            platform_tag: None,
            integrity_status: IntegrityStatus::Unchecked,
            checksum: None,
        }
    }

    fn plan(id: &str, doc: &str, version: u32) -> TrainingPlan {
        TrainingPlan {
            id: id.to_string(),
            title: "Plan".to_string(),
            category: "general".to_string(),
            difficulty: Difficulty::Intermediate,
            duration: 4,
            sessions_count: 12,
            tags: vec!["general".to_string()],
            source_document: doc.to_string(),
            weeks: Vec::new(),
            version,
            created_at: Utc.with_ymd_and_hms(2024, 1, version, 0, 0, 0).unwrap(),
            age_group: None,
            schedule: Schedule::default(),
            organization_level: OrganizationLevel::Unstructured,
            confidence: 0.0,
        }
    }

    #[tokio::test]
    async fn documents_are_upserted_by_id() {
        let repo = repo();
        repo.save_document(&document("d1")).await.unwrap();
        let mut updated = document("d1");
        updated.processed = true;
        repo.save_document(&updated).await.unwrap();
        repo.save_document(&document("d2")).await.unwrap();

        let docs = repo.documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(repo.document("d1").await.unwrap().unwrap().processed);
    }

    #[tokio::test]
    async fn payload_roundtrip_and_corruption() {
        let repo = repo();
        repo.put_payload("d1", b"Week 1").await.unwrap();
        assert_eq!(repo.payload("d1").await.unwrap().unwrap(), b"Week 1");
        assert!(repo.payload("missing").await.unwrap().is_none());

        repo.store().put(&payload_key("d2"), "!!not base64!!").await.unwrap();
        assert!(repo.payload("d2").await.is_err());
    }

    #[tokio::test]
    async fn plan_versions_append_only() {
        let repo = repo();
        repo.append_plan(&plan("p1", "d1", 1)).await.unwrap();
        repo.append_plan(&plan("p1", "d1", 2)).await.unwrap();
        repo.append_plan(&plan("p2", "d2", 1)).await.unwrap();
        assert!(repo.append_plan(&plan("p1", "d1", 2)).await.is_err());

        assert_eq!(repo.plan_versions("p1").await.unwrap().len(), 2);
        assert_eq!(repo.latest_plan("p1").await.unwrap().unwrap().version, 2);
        assert_eq!(
            repo.latest_plan_for_document("d1").await.unwrap().unwrap().version,
            2
        );
        let latest = repo.latest_plans().await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].id, "p2");
    }
}
