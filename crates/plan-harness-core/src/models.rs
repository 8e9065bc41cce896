//! Core data models used throughout Plan Harness.
//!
//! These types represent the uploaded documents, the training plans
//! assembled from them, pattern fingerprints, and enhancement results.
//! All persisted records serialize with camelCase keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an uploaded document.
pub type DocumentId = String;

/// Clamp a confidence value into `[0, 1]`. NaN becomes `0.0`.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Broad format family of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatFamily {
    WordProcessor,
    Spreadsheet,
    Presentation,
    Csv,
    PlainText,
    Pdf,
    LegacyOffice,
    Unknown,
}

impl FormatFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WordProcessor => "docx",
            Self::Spreadsheet => "xlsx",
            Self::Presentation => "pptx",
            Self::Csv => "csv",
            Self::PlainText => "text",
            Self::Pdf => "pdf",
            Self::LegacyOffice => "legacy_office",
            Self::Unknown => "unknown",
        }
    }

    /// Parse the short name produced by [`as_str`](Self::as_str).
    pub fn parse(name: &str) -> Option<Self> {
        let family = match name.trim().to_ascii_lowercase().as_str() {
            "docx" => Self::WordProcessor,
            "xlsx" => Self::Spreadsheet,
            "pptx" => Self::Presentation,
            "csv" => Self::Csv,
            "text" | "txt" => Self::PlainText,
            "pdf" => Self::Pdf,
            "legacy_office" => Self::LegacyOffice,
            "unknown" => Self::Unknown,
            _ => return None,
        };
        Some(family)
    }

    /// Two families are interchangeable when one can be read as the other.
    /// CSV is plain text with separators, so the pair is accepted.
    pub fn is_compatible_with(&self, other: &FormatFamily) -> bool {
        self == other
            || matches!(
                (self, other),
                (Self::Csv, Self::PlainText) | (Self::PlainText, Self::Csv)
            )
    }
}

impl std::fmt::Display for FormatFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the most recent integrity check on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    #[default]
    Unchecked,
    Healthy,
    Repaired,
    Degraded,
    RequiresReupload,
}

impl IntegrityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchecked => "unchecked",
            Self::Healthy => "healthy",
            Self::Repaired => "repaired",
            Self::Degraded => "degraded",
            Self::RequiresReupload => "requires_reupload",
        }
    }
}

/// Metadata for one uploaded file. The byte payload is stored separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub original_name: String,
    pub declared_type: String,
    pub size: u64,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processed: bool,
    #[serde(default)]
    pub platform_tag: Option<String>,
    #[serde(default)]
    pub integrity_status: IntegrityStatus,
    /// SHA-256 hex digest of the payload taken at upload time.
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Beginner, Self::Intermediate, Self::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Ordinal used to compare a drill's minimum level against a plan's level.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Beginner => 0,
            Self::Intermediate => 1,
            Self::Advanced => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Youth,
    Teen,
    Adult,
    Masters,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 4] = [Self::Youth, Self::Teen, Self::Adult, Self::Masters];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Youth => "youth",
            Self::Teen => "teen",
            Self::Adult => "adult",
            Self::Masters => "masters",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Map a numeric age (e.g. from "U12") to a group.
    pub fn from_age(age: u32) -> Self {
        match age {
            0..=12 => Self::Youth,
            13..=18 => Self::Teen,
            19..=39 => Self::Adult,
            _ => Self::Masters,
        }
    }
}

/// Coarse classification of how explicitly a document encodes structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationLevel {
    #[default]
    Unstructured,
    BasicStructure,
    ModeratelyStructured,
    HighlyStructured,
}

impl OrganizationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unstructured => "unstructured",
            Self::BasicStructure => "basic_structure",
            Self::ModeratelyStructured => "moderately_structured",
            Self::HighlyStructured => "highly_structured",
        }
    }
}

/// One session inside a week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Unique within its week, e.g. `w2-s3`.
    pub id: String,
    /// Day label as written in the document ("Monday", "Day 3").
    #[serde(default)]
    pub date: Option<String>,
    /// Time of day normalized to `HH:MM`.
    #[serde(default)]
    pub time: Option<String>,
    /// Planned length in minutes.
    pub duration: u32,
    #[serde(default)]
    pub focus: Vec<String>,
    #[serde(default)]
    pub raw_excerpts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekRecord {
    pub week_number: u32,
    pub title: String,
    pub daily_sessions: Vec<SessionRecord>,
}

/// How often and on which days the plan trains.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(default)]
    pub sessions_per_week: Option<u32>,
    #[serde(default)]
    pub days: Vec<String>,
}

/// The canonical structured program derived from one document.
///
/// Reprocessing a document appends a new record with the same `id` and
/// `version + 1`; earlier versions are never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingPlan {
    pub id: String,
    pub title: String,
    pub category: String,
    pub difficulty: Difficulty,
    /// Program length in weeks.
    pub duration: u32,
    pub sessions_count: u32,
    pub tags: Vec<String>,
    pub source_document: DocumentId,
    pub weeks: Vec<WeekRecord>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub age_group: Option<AgeGroup>,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default)]
    pub organization_level: OrganizationLevel,
    #[serde(default)]
    pub confidence: f64,
}

impl TrainingPlan {
    pub fn session_total(&self) -> usize {
        self.weeks.iter().map(|w| w.daily_sessions.len()).sum()
    }

    pub fn week(&self, number: u32) -> Option<&WeekRecord> {
        self.weeks.iter().find(|w| w.week_number == number)
    }
}

/// Compact record of a past successful analysis, reused as a hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternFingerprint {
    pub format: FormatFamily,
    pub organization_level: OrganizationLevel,
    pub week_count: u32,
    pub session_count: u32,
    pub marker_samples: Vec<String>,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// Which tier produced an enhancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementSource {
    Local,
    Remote,
    RuleBased,
}

impl EnhancementSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::RuleBased => "rule_based",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drill {
    pub name: String,
    pub minutes: u32,
    pub description: String,
}

/// A session with generated coaching content attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedSession {
    pub session: SessionRecord,
    pub objectives: Vec<String>,
    pub warm_up: Vec<String>,
    pub drills: Vec<Drill>,
    pub coaching_points: Vec<String>,
    pub cool_down: Vec<String>,
    pub equipment: Vec<String>,
    pub intensity: String,
}

/// Result of enriching one session. References the original; never replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementRecord {
    pub original_session: SessionRecord,
    pub enhanced_session: EnhancedSession,
    pub improvements: Vec<String>,
    pub confidence: f64,
    pub source: EnhancementSource,
    pub timestamp: DateTime<Utc>,
}

/// Who the session is for. Drives knowledge-table lookups and prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AthleteProfile {
    pub sport: String,
    #[serde(default)]
    pub age_group: Option<AgeGroup>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl AthleteProfile {
    pub fn for_plan(plan: &TrainingPlan) -> Self {
        Self {
            sport: plan.category.clone(),
            age_group: plan.age_group,
            difficulty: plan.difficulty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_confidence_bounds() {
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        assert_eq!(clamp_confidence(0.42), 0.42);
    }

    #[test]
    fn csv_and_text_are_compatible() {
        assert!(FormatFamily::Csv.is_compatible_with(&FormatFamily::PlainText));
        assert!(!FormatFamily::Spreadsheet.is_compatible_with(&FormatFamily::WordProcessor));
    }

    #[test]
    fn document_record_uses_camel_case_keys() {
        let doc = DocumentRecord {
            id: "d1".to_string(),
            original_name: "plan.txt".to_string(),
            declared_type: "text/plain".to_string(),
            size: 10,
            uploaded_at: None,
            processed: false,
            platform_tag: None,
            integrity_status: IntegrityStatus::Unchecked,
            checksum: None,
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("originalName").is_some());
        assert!(json.get("integrityStatus").is_some());
    }

    #[test]
    fn age_from_number() {
        assert_eq!(AgeGroup::from_age(10), AgeGroup::Youth);
        assert_eq!(AgeGroup::from_age(16), AgeGroup::Teen);
        assert_eq!(AgeGroup::from_age(45), AgeGroup::Masters);
    }
}
