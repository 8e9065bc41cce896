//! Stored-document integrity checks.
//!
//! Before a stored document is (re)processed its metadata, payload,
//! readability and processing readiness are verified. Missing timestamps
//! and platform tags are repaired in place; a missing or undecodable
//! payload can only be fixed by uploading again and is reported as such.
//! Nothing here fails hard: the result is an [`IntegrityReport`].

use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use plan_harness_core::models::{DocumentRecord, IntegrityStatus};
use plan_harness_core::store::KvStore;

use crate::config::Config;
use crate::error::PlanError;
use crate::extract::{resolve_family, DocumentInput};
use crate::repository::Repository;
use crate::sqlite_store::SqliteKvStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    MissingTimestamp,
    MissingPlatformTag,
    MissingPayload,
    UnreadablePayload { detail: String },
    EmptyPayload,
    SizeMismatch { recorded: u64, actual: u64 },
    ChecksumMismatch { expected: String, actual: String },
    MissingChecksum,
    UnreadableFormat { detail: String },
}

impl IntegrityIssue {
    /// Fixed automatically by [`IntegrityChecker::repair`].
    pub fn is_repairable(&self) -> bool {
        matches!(
            self,
            Self::MissingTimestamp | Self::MissingPlatformTag | Self::MissingChecksum
        )
    }

    /// Only a new upload resolves these.
    pub fn requires_reupload(&self) -> bool {
        matches!(self, Self::MissingPayload | Self::UnreadablePayload { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            Self::MissingTimestamp => "upload timestamp is missing".to_string(),
            Self::MissingPlatformTag => "platform tag is missing".to_string(),
            Self::MissingPayload => "stored file content is missing".to_string(),
            Self::UnreadablePayload { detail } => format!("stored file content is unreadable: {detail}"),
            Self::EmptyPayload => "stored file is empty".to_string(),
            Self::SizeMismatch { recorded, actual } => {
                format!("recorded size {recorded} bytes but stored content is {actual} bytes")
            }
            Self::ChecksumMismatch { expected, actual } => {
                format!("checksum mismatch (expected {expected}, found {actual})")
            }
            Self::MissingChecksum => "checksum was never recorded".to_string(),
            Self::UnreadableFormat { detail } => format!("format cannot be read: {detail}"),
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::MissingTimestamp | Self::MissingPlatformTag | Self::MissingChecksum => {
                "Run the check with --repair to fill in the missing metadata"
            }
            Self::MissingPayload | Self::UnreadablePayload { .. } => {
                "Upload the original document again"
            }
            Self::EmptyPayload => "Upload a non-empty version of the document",
            Self::SizeMismatch { .. } | Self::ChecksumMismatch { .. } => {
                "The stored content changed after upload; upload the original document again if the plan looks wrong"
            }
            Self::UnreadableFormat { .. } => {
                "Re-save the document as .docx, .csv or .txt and upload it again"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub document_id: String,
    pub status: IntegrityStatus,
    /// Issues that remain after any repairs.
    pub issues: Vec<IntegrityIssue>,
    pub repaired: Vec<IntegrityIssue>,
    pub recommendations: Vec<String>,
    pub ready_for_processing: bool,
    pub checked_at: DateTime<Utc>,
}

impl IntegrityReport {
    /// The storage failure blocking processing, if any.
    pub fn failure(&self) -> Option<PlanError> {
        if self.ready_for_processing {
            return None;
        }
        let detail: Vec<String> = self
            .issues
            .iter()
            .filter(|i| i.requires_reupload())
            .map(IntegrityIssue::describe)
            .collect();
        Some(PlanError::StorageIntegrityFailure(format!(
            "document {}: {}",
            self.document_id,
            detail.join("; ")
        )))
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub struct IntegrityChecker {
    platform_tag: String,
}

impl IntegrityChecker {
    pub fn new(platform_tag: impl Into<String>) -> Self {
        Self {
            platform_tag: platform_tag.into(),
        }
    }

    /// Inspect a record against its payload. `payload` is `Err` when the
    /// stored value exists but could not be decoded.
    pub fn inspect(
        &self,
        document: &DocumentRecord,
        payload: Result<Option<&[u8]>, String>,
    ) -> Vec<IntegrityIssue> {
        let mut issues = Vec::new();
        if document.uploaded_at.is_none() {
            issues.push(IntegrityIssue::MissingTimestamp);
        }
        if document
            .platform_tag
            .as_deref()
            .map_or(true, |t| t.trim().is_empty())
        {
            issues.push(IntegrityIssue::MissingPlatformTag);
        }

        let bytes = match payload {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                issues.push(IntegrityIssue::MissingPayload);
                return issues;
            }
            Err(detail) => {
                issues.push(IntegrityIssue::UnreadablePayload { detail });
                return issues;
            }
        };

        if bytes.is_empty() {
            issues.push(IntegrityIssue::EmptyPayload);
        }
        if document.size != bytes.len() as u64 {
            issues.push(IntegrityIssue::SizeMismatch {
                recorded: document.size,
                actual: bytes.len() as u64,
            });
        }
        let actual = sha256_hex(bytes);
        match &document.checksum {
            Some(expected) if !expected.eq_ignore_ascii_case(&actual) => {
                issues.push(IntegrityIssue::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
            Some(_) => {}
            None => issues.push(IntegrityIssue::MissingChecksum),
        }

        if !bytes.is_empty() {
            let input = DocumentInput {
                bytes,
                original_name: &document.original_name,
                declared_type: &document.declared_type,
                size: bytes.len() as u64,
            };
            if let Err((_, err)) = resolve_family(&input) {
                issues.push(IntegrityIssue::UnreadableFormat {
                    detail: err.to_string(),
                });
            }
        }
        issues
    }

    /// Apply the bounded repairs. Returns the repaired record and the
    /// issues that were fixed.
    pub fn repair(
        &self,
        document: &DocumentRecord,
        issues: &[IntegrityIssue],
        payload: Option<&[u8]>,
        now: DateTime<Utc>,
    ) -> (DocumentRecord, Vec<IntegrityIssue>) {
        let mut repaired = document.clone();
        let mut fixed = Vec::new();
        for issue in issues {
            match issue {
                IntegrityIssue::MissingTimestamp => {
                    repaired.uploaded_at = Some(now);
                    fixed.push(issue.clone());
                }
                IntegrityIssue::MissingPlatformTag => {
                    repaired.platform_tag = Some(self.platform_tag.clone());
                    fixed.push(issue.clone());
                }
                IntegrityIssue::MissingChecksum => {
                    if let Some(bytes) = payload {
                        repaired.checksum = Some(sha256_hex(bytes));
                        fixed.push(issue.clone());
                    }
                }
                _ => {}
            }
        }
        (repaired, fixed)
    }

    /// Build the report for the issues left after repair.
    pub fn report(
        &self,
        document_id: &str,
        remaining: Vec<IntegrityIssue>,
        repaired: Vec<IntegrityIssue>,
        now: DateTime<Utc>,
    ) -> IntegrityReport {
        let status = if remaining.iter().any(IntegrityIssue::requires_reupload) {
            IntegrityStatus::RequiresReupload
        } else if remaining.iter().any(|i| !i.is_repairable()) {
            IntegrityStatus::Degraded
        } else if !repaired.is_empty() {
            IntegrityStatus::Repaired
        } else if remaining.is_empty() {
            IntegrityStatus::Healthy
        } else {
            IntegrityStatus::Degraded
        };

        let mut recommendations: Vec<String> = Vec::new();
        for issue in &remaining {
            let rec = issue.recommendation().to_string();
            if !recommendations.contains(&rec) {
                recommendations.push(rec);
            }
        }

        IntegrityReport {
            document_id: document_id.to_string(),
            ready_for_processing: status != IntegrityStatus::RequiresReupload,
            status,
            issues: remaining,
            repaired,
            recommendations,
            checked_at: now,
        }
    }

    /// Check a stored document and persist the outcome. With `repair` the
    /// repairable issues are fixed and the record saved.
    pub async fn check_document(
        &self,
        repo: &Repository,
        document_id: &str,
        repair: bool,
    ) -> Result<IntegrityReport> {
        let Some(document) = repo.document(document_id).await? else {
            bail!("Document not found: {}", document_id);
        };
        let payload = repo.payload(document_id).await.map_err(|e| format!("{e:#}"));
        let bytes: Option<Vec<u8>> = payload.as_ref().ok().cloned().flatten();
        let issues = self.inspect(
            &document,
            payload.as_ref().map(|p| p.as_deref()).map_err(String::clone),
        );

        let now = Utc::now();
        let (mut record, fixed) = if repair {
            self.repair(&document, &issues, bytes.as_deref(), now)
        } else {
            (document.clone(), Vec::new())
        };
        let remaining: Vec<IntegrityIssue> = issues.into_iter().filter(|i| !fixed.contains(i)).collect();
        let report = self.report(document_id, remaining, fixed, now);

        for issue in &report.issues {
            warn!(document = document_id, issue = %issue.describe(), "Integrity issue");
        }
        if !report.repaired.is_empty() {
            info!(document = document_id, repaired = report.repaired.len(), "Repaired document metadata");
        }

        record.integrity_status = report.status;
        if record != document {
            repo.save_document(&record).await?;
        }
        Ok(report)
    }
}

pub async fn run_check(config: &Config, document_id: &str, repair: bool, json: bool) -> Result<()> {
    let store: Arc<dyn KvStore> = Arc::new(SqliteKvStore::connect(config).await?);
    let repo = Repository::new(store);
    let checker = IntegrityChecker::new(config.extraction.platform_tag.clone());
    let report = checker.check_document(&repo, document_id, repair).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("check {}", document_id);
    println!("  status: {}", report.status.as_str());
    println!("  ready for processing: {}", report.ready_for_processing);
    for issue in &report.repaired {
        println!("  repaired: {}", issue.describe());
    }
    for issue in &report.issues {
        println!("  issue: {}", issue.describe());
    }
    for rec in &report.recommendations {
        println!("  recommendation: {}", rec);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_harness_core::store::memory::InMemoryStore;

    const BODY: &[u8] = b"Week 1\nMonday: 45 min run";

    fn document(id: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            original_name: "plan.txt".to_string(),
            declared_type: "text/plain".to_string(),
            size: BODY.len() as u64,
            uploaded_at: Some(Utc::now()),
            processed: false,
            platform_tag: Some("linux".to_string()),
            integrity_status: IntegrityStatus::Unchecked,
            checksum: Some(sha256_hex(BODY)),
        }
    }

    fn repo() -> Repository {
        Repository::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn healthy_document() {
        let repo = repo();
        repo.save_document(&document("d1")).await.unwrap();
        repo.put_payload("d1", BODY).await.unwrap();

        let report = IntegrityChecker::new("linux")
            .check_document(&repo, "d1", false)
            .await
            .unwrap();
        assert_eq!(report.status, IntegrityStatus::Healthy);
        assert!(report.ready_for_processing);
        assert!(report.failure().is_none());
        assert_eq!(
            repo.document("d1").await.unwrap().unwrap().integrity_status,
            IntegrityStatus::Healthy
        );
    }

    #[tokio::test]
    async fn missing_metadata_is_repaired() {
        let repo = repo();
        let mut doc = document("d1");
        doc.uploaded_at = None;
        doc.platform_tag = None;
        repo.save_document(&doc).await.unwrap();
        repo.put_payload("d1", BODY).await.unwrap();

        let report = IntegrityChecker::new("macos")
            .check_document(&repo, "d1", true)
            .await
            .unwrap();
        assert_eq!(report.status, IntegrityStatus::Repaired);
        assert_eq!(report.repaired.len(), 2);
        assert!(report.issues.is_empty());

        let stored = repo.document("d1").await.unwrap().unwrap();
        assert!(stored.uploaded_at.is_some());
        assert_eq!(stored.platform_tag.as_deref(), Some("macos"));
    }

    #[tokio::test]
    async fn without_repair_metadata_issues_are_reported() {
        let repo = repo();
        let mut doc = document("d1");
        doc.platform_tag = None;
        repo.save_document(&doc).await.unwrap();
        repo.put_payload("d1", BODY).await.unwrap();

        let report = IntegrityChecker::new("linux")
            .check_document(&repo, "d1", false)
            .await
            .unwrap();
        assert_eq!(report.issues, vec![IntegrityIssue::MissingPlatformTag]);
        assert!(report.ready_for_processing);
        assert!(report.recommendations[0].contains("--repair"));
    }

    #[tokio::test]
    async fn missing_payload_requires_reupload() {
        let repo = repo();
        repo.save_document(&document("d1")).await.unwrap();

        let report = IntegrityChecker::new("linux")
            .check_document(&repo, "d1", true)
            .await
            .unwrap();
        assert_eq!(report.status, IntegrityStatus::RequiresReupload);
        assert!(!report.ready_for_processing);
        assert!(matches!(
            report.failure(),
            Some(PlanError::StorageIntegrityFailure(_))
        ));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("Upload the original document again")));
    }

    #[tokio::test]
    async fn changed_content_is_degraded() {
        let repo = repo();
        repo.save_document(&document("d1")).await.unwrap();
        repo.put_payload("d1", b"Week 2\nTuesday: 30 min swim").await.unwrap();

        let report = IntegrityChecker::new("linux")
            .check_document(&repo, "d1", true)
            .await
            .unwrap();
        assert_eq!(report.status, IntegrityStatus::Degraded);
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, IntegrityIssue::ChecksumMismatch { .. })));
        assert!(report.ready_for_processing);
    }

    #[tokio::test]
    async fn unknown_document_is_an_error() {
        let checker = IntegrityChecker::new("linux");
        assert!(checker.check_document(&repo(), "nope", false).await.is_err());
    }
}
