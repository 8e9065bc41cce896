//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for one document: payload → extraction →
//! normalization → structural analysis (with pattern hints) → assembly →
//! plan version + session cache → pattern fingerprint. A document id is
//! never processed by two callers at once; independent documents run
//! concurrently.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use plan_harness_core::analyze::{StructuralAnalysis, StructuralAnalyzer};
use plan_harness_core::assemble::assemble;
use plan_harness_core::models::{
    DocumentRecord, FormatFamily, IntegrityStatus, SessionRecord, TrainingPlan,
};
use plan_harness_core::normalize::normalize_text;
use plan_harness_core::patterns::fingerprint;
use plan_harness_core::store::KvStore;

use crate::config::Config;
use crate::error::PlanError;
use crate::extract::{
    family_from_extension, DocumentInput, Extractor, MIME_CSV, MIME_DOCX, MIME_PDF, MIME_PPTX,
    MIME_TEXT, MIME_XLSX,
};
use crate::integrity::{sha256_hex, IntegrityChecker, IntegrityReport};
use crate::patterns::PatternLibrary;
use crate::repository::Repository;
use crate::sqlite_store::SqliteKvStore;

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub original_name: String,
    pub declared_type: String,
}

impl Upload {
    /// Read a file from disk. Without `mime` the type is guessed from the
    /// extension.
    pub fn from_path(path: &Path, mime: Option<&str>) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let declared_type = mime
            .map(str::to_string)
            .unwrap_or_else(|| mime_for_name(&original_name).to_string());
        Ok(Self {
            bytes,
            original_name,
            declared_type,
        })
    }
}

/// Mime type conventionally used for a file name.
pub fn mime_for_name(name: &str) -> &'static str {
    match family_from_extension(name) {
        Some(FormatFamily::WordProcessor) => MIME_DOCX,
        Some(FormatFamily::Spreadsheet) => MIME_XLSX,
        Some(FormatFamily::Presentation) => MIME_PPTX,
        Some(FormatFamily::Pdf) => MIME_PDF,
        Some(FormatFamily::Csv) => MIME_CSV,
        Some(FormatFamily::PlainText) => MIME_TEXT,
        Some(FormatFamily::LegacyOffice) => {
            let lower = name.to_ascii_lowercase();
            if lower.ends_with(".xls") {
                "application/vnd.ms-excel"
            } else if lower.ends_with(".ppt") {
                "application/vnd.ms-powerpoint"
            } else {
                "application/msword"
            }
        }
        _ => "application/octet-stream",
    }
}

/// Result of one processing pass.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub document: DocumentRecord,
    pub plan: TrainingPlan,
    pub analysis: StructuralAnalysis,
    pub family: FormatFamily,
    /// The plan was assembled from a fallback block, not document content.
    pub fallback: bool,
    pub issues: Vec<PlanError>,
}

/// Per-document async locks.
#[derive(Default)]
pub struct DocumentLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `document_id`.
    pub async fn acquire(&self, document_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(document_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub struct Pipeline {
    repo: Repository,
    patterns: PatternLibrary,
    extractor: Extractor,
    analyzer: StructuralAnalyzer,
    integrity: IntegrityChecker,
    locks: DocumentLocks,
    platform_tag: String,
}

impl Pipeline {
    pub fn new(config: &Config, store: Arc<dyn KvStore>) -> Self {
        Self::with_parts(
            config,
            store,
            Extractor::new(config.extraction.max_bytes),
            StructuralAnalyzer::new(),
        )
    }

    pub fn with_parts(
        config: &Config,
        store: Arc<dyn KvStore>,
        extractor: Extractor,
        analyzer: StructuralAnalyzer,
    ) -> Self {
        Self {
            repo: Repository::new(store.clone()),
            patterns: PatternLibrary::new(store, &config.patterns),
            extractor,
            analyzer,
            integrity: IntegrityChecker::new(config.extraction.platform_tag.clone()),
            locks: DocumentLocks::new(),
            platform_tag: config.extraction.platform_tag.clone(),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn patterns(&self) -> &PatternLibrary {
        &self.patterns
    }

    /// Store the payload and a new document record.
    pub async fn register(&self, upload: &Upload) -> Result<DocumentRecord> {
        let document = DocumentRecord {
            id: Uuid::new_v4().to_string(),
            original_name: upload.original_name.clone(),
            declared_type: upload.declared_type.clone(),
            size: upload.bytes.len() as u64,
            uploaded_at: Some(Utc::now()),
            processed: false,
            platform_tag: Some(self.platform_tag.clone()),
            integrity_status: IntegrityStatus::Unchecked,
            checksum: Some(sha256_hex(&upload.bytes)),
        };
        self.repo.put_payload(&document.id, &upload.bytes).await?;
        self.repo.save_document(&document).await?;
        info!(document = %document.id, name = %document.original_name, size = document.size, "Registered document");
        Ok(document)
    }

    /// Register and process a new upload.
    pub async fn ingest(&self, upload: &Upload) -> Result<ProcessOutcome> {
        let document = self.register(upload).await?;
        self.process(&document.id).await
    }

    /// Check a stored document, repair what can be repaired, then process
    /// it again as a new plan version.
    pub async fn reprocess(&self, document_id: &str) -> Result<(IntegrityReport, ProcessOutcome)> {
        let _guard = self.locks.acquire(document_id).await;
        let report = self
            .integrity
            .check_document(&self.repo, document_id, true)
            .await?;
        if let Some(failure) = report.failure() {
            return Err(failure.into());
        }
        let outcome = self.process_locked(document_id).await?;
        Ok((report, outcome))
    }

    /// Run the pipeline for a stored document and append a plan version.
    pub async fn process(&self, document_id: &str) -> Result<ProcessOutcome> {
        let _guard = self.locks.acquire(document_id).await;
        self.process_locked(document_id).await
    }

    /// The caller holds the document's lock.
    async fn process_locked(&self, document_id: &str) -> Result<ProcessOutcome> {
        let Some(mut document) = self.repo.document(document_id).await? else {
            bail!("Document not found: {}", document_id);
        };
        let Some(bytes) = self.repo.payload(document_id).await? else {
            return Err(PlanError::StorageIntegrityFailure(format!(
                "document {document_id}: stored file content is missing"
            ))
            .into());
        };

        let extraction = self.extractor.extract(&DocumentInput {
            bytes: &bytes,
            original_name: &document.original_name,
            declared_type: &document.declared_type,
            size: document.size,
        });
        let text = normalize_text(&extraction.text);

        let hints = if extraction.fallback {
            None
        } else {
            self.patterns.hints(extraction.family).await
        };
        let analysis = self.analyzer.analyze(&text, hints.as_ref());

        let previous = self.repo.latest_plan_for_document(document_id).await?;
        let now = Utc::now();
        let plan = assemble(&text, &document, &analysis, previous.as_ref(), now);

        self.repo.append_plan(&plan).await?;
        let sessions: Vec<SessionRecord> = plan
            .weeks
            .iter()
            .flat_map(|w| w.daily_sessions.iter().cloned())
            .collect();
        self.repo.put_session_cache(document_id, &sessions).await?;

        if extraction.fallback {
            warn!(document = document_id, "Plan assembled from fallback text; fingerprint not recorded");
        } else {
            self.patterns
                .record_or_warn(fingerprint(extraction.family, &analysis, &plan, now))
                .await;
        }

        document.processed = true;
        self.repo.save_document(&document).await?;

        info!(
            document = document_id,
            plan = %plan.id,
            version = plan.version,
            weeks = plan.weeks.len(),
            sessions = sessions.len(),
            level = analysis.organization_level.as_str(),
            confidence = analysis.confidence,
            "Assembled training plan"
        );

        Ok(ProcessOutcome {
            document,
            plan,
            analysis,
            family: extraction.family,
            fallback: extraction.fallback,
            issues: extraction.issues,
        })
    }
}

fn print_outcome(outcome: &ProcessOutcome) {
    let plan = &outcome.plan;
    println!("  document: {}", outcome.document.id);
    println!("  format: {}", outcome.family);
    if outcome.fallback {
        println!("  extraction: fallback");
        for issue in &outcome.issues {
            println!("  issue: {}", issue);
        }
    }
    println!("  plan: {} (version {})", plan.id, plan.version);
    println!("  title: {}", plan.title);
    println!("  category: {}", plan.category);
    println!("  difficulty: {}", plan.difficulty.as_str());
    println!("  weeks: {}", plan.duration);
    println!("  sessions: {}", plan.sessions_count);
    println!(
        "  organization: {} (confidence {:.2})",
        outcome.analysis.organization_level.as_str(),
        outcome.analysis.confidence
    );
}

pub async fn run_ingest(config: &Config, path: &Path, mime: Option<&str>) -> Result<()> {
    let upload = Upload::from_path(path, mime)?;
    let store: Arc<dyn KvStore> = Arc::new(SqliteKvStore::connect(config).await?);
    let pipeline = Pipeline::new(config, store);
    let outcome = pipeline.ingest(&upload).await?;

    println!("ingest {}", path.display());
    print_outcome(&outcome);
    println!("ok");
    Ok(())
}

pub async fn run_reprocess(config: &Config, document_id: &str) -> Result<()> {
    let store: Arc<dyn KvStore> = Arc::new(SqliteKvStore::connect(config).await?);
    let pipeline = Pipeline::new(config, store);
    let (report, outcome) = pipeline.reprocess(document_id).await?;

    println!("reprocess {}", document_id);
    println!("  integrity: {}", report.status.as_str());
    for issue in &report.repaired {
        println!("  repaired: {}", issue.describe());
    }
    print_outcome(&outcome);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_guessing() {
        assert_eq!(mime_for_name("plan.DOCX"), MIME_DOCX);
        assert_eq!(mime_for_name("plan.csv"), MIME_CSV);
        assert_eq!(mime_for_name("plan.xls"), "application/vnd.ms-excel");
        assert_eq!(mime_for_name("plan"), "application/octet-stream");
    }

    #[tokio::test]
    async fn locks_serialize_one_document() {
        let locks = Arc::new(DocumentLocks::new());
        let guard = locks.acquire("d1").await;

        let other = locks.acquire("d2").await;
        drop(other);

        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = locks2.acquire("d1").await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn reprocess_runs_check_and_assembly_under_one_lock() {
        use plan_harness_core::store::memory::InMemoryStore;

        let pipeline = Arc::new(Pipeline::new(
            &Config::minimal(),
            Arc::new(InMemoryStore::new()),
        ));
        let first = pipeline
            .ingest(&Upload {
                bytes: b"Week 1\nWeek 2\n".to_vec(),
                original_name: "block.txt".to_string(),
                declared_type: MIME_TEXT.to_string(),
            })
            .await
            .unwrap();
        let id = first.document.id.clone();

        let held = pipeline.locks.acquire(&id).await;
        let task = {
            let pipeline = pipeline.clone();
            let id = id.clone();
            tokio::spawn(async move { pipeline.reprocess(&id).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // Neither the integrity check nor the assembly ran while the lock was held.
        let stored = pipeline.repository().document(&id).await.unwrap().unwrap();
        assert_eq!(stored.integrity_status, IntegrityStatus::Unchecked);
        assert!(pipeline
            .repository()
            .plan_versions(&first.plan.id)
            .await
            .unwrap()
            .iter()
            .all(|p| p.version == 1));

        drop(held);
        let (report, outcome) = task.await.unwrap().unwrap();
        assert!(report.ready_for_processing);
        assert_eq!(outcome.plan.version, 2);
        assert_eq!(outcome.document.integrity_status, report.status);
    }
}
