//! Structural analysis of normalized plan text.
//!
//! The [`StructuralAnalyzer`] runs an ordered list of [`MarkerRule`]s over
//! the text, resolves overlapping matches, de-duplicates by normalized
//! value, and scores the presence of four kinds of structure:
//!
//! | Structure | Weight |
//! |-----------|--------|
//! | weeks     | 0.30   |
//! | days      | 0.25   |
//! | sessions  | 0.25   |
//! | durations | 0.20   |
//!
//! The weighted sum, capped at 1.0, is the confidence. The organization
//! level is a fixed banding of the same sum, so it is a pure function of
//! the four sub-scores.
//!
//! Pattern hints only populate [`StructuralAnalysis::expected`]. They never
//! remove or add detected markers.

pub mod rules;

use std::cmp::Reverse;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{clamp_confidence, OrganizationLevel};
use crate::patterns::PatternHints;

pub use rules::{
    default_rules, Marker, MarkerKind, MarkerRule, MarkerValue, RegexRule, Weekday,
};

pub const WEEK_WEIGHT: f64 = 0.30;
pub const DAY_WEIGHT: f64 = 0.25;
pub const SESSION_WEIGHT: f64 = 0.25;
pub const DURATION_WEIGHT: f64 = 0.20;

const BAND_EPSILON: f64 = 1e-9;

/// Map a weighted structure score to its organization level.
pub fn classify(total: f64) -> OrganizationLevel {
    let total = total + BAND_EPSILON;
    if total >= 0.75 {
        OrganizationLevel::HighlyStructured
    } else if total >= 0.50 {
        OrganizationLevel::ModeratelyStructured
    } else if total >= 0.25 {
        OrganizationLevel::BasicStructure
    } else {
        OrganizationLevel::Unstructured
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekStructure {
    /// Distinct week markers, first occurrence of each value.
    pub markers: Vec<Marker>,
    /// Distinct week numbers, ascending. Gaps are allowed.
    pub week_numbers: Vec<u32>,
    pub total_weeks: u32,
    /// Largest "N weeks" phrase, if any.
    pub declared_weeks: Option<u32>,
    /// True when the week numbers are exactly `1..=N`.
    pub sequential: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStructure {
    pub markers: Vec<Marker>,
    /// Canonical day labels in order of first appearance.
    pub days: Vec<String>,
    pub total_days: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStructure {
    pub markers: Vec<Marker>,
    pub total_sessions: u32,
    pub highest_numbered: Option<u32>,
    pub declared_sessions: Option<u32>,
    pub frequency_per_week: Option<u32>,
    /// Distinct times of day as `HH:MM`.
    pub times: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationAnalysis {
    pub markers: Vec<Marker>,
    pub min_minutes: Option<u32>,
    pub max_minutes: Option<u32>,
    pub average_minutes: Option<u32>,
    /// First duration phrased as "per session".
    pub per_session_minutes: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureScores {
    pub weeks: f64,
    pub days: f64,
    pub sessions: f64,
    pub durations: f64,
}

impl StructureScores {
    pub fn total(&self) -> f64 {
        self.weeks + self.days + self.sessions + self.durations
    }
}

/// Result of one analysis pass. Immutable once assembled into a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralAnalysis {
    pub week_structure: WeekStructure,
    pub day_structure: DayStructure,
    pub session_structure: SessionStructure,
    pub duration_analysis: DurationAnalysis,
    pub scores: StructureScores,
    pub organization_level: OrganizationLevel,
    pub confidence: f64,
    /// Every marker occurrence in text order, duplicates included.
    pub occurrences: Vec<Marker>,
    /// Counts suggested by past analyses of the same format.
    #[serde(default)]
    pub expected: Option<PatternHints>,
}

impl StructuralAnalysis {
    /// Occurrences of one kind, in text order.
    pub fn occurrences_of(&self, kind: MarkerKind) -> impl Iterator<Item = &Marker> {
        self.occurrences.iter().filter(move |m| m.kind == kind)
    }
}

/// Runs the rule list and scores the result.
pub struct StructuralAnalyzer {
    rules: Vec<Box<dyn MarkerRule>>,
}

impl Default for StructuralAnalyzer {
    fn default() -> Self {
        Self::with_rules(default_rules())
    }
}

impl StructuralAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<Box<dyn MarkerRule>>) -> Self {
        Self { rules }
    }

    /// Append a rule after the built-in ones.
    pub fn push_rule(&mut self, rule: Box<dyn MarkerRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// All markers in text order with same-kind overlaps resolved. When two
    /// markers of one kind overlap, the earlier one wins, then the longer.
    pub fn detect(&self, text: &str) -> Vec<Marker> {
        let mut candidates: Vec<(usize, Marker)> = self
            .rules
            .iter()
            .enumerate()
            .flat_map(|(order, rule)| rule.detect(text).into_iter().map(move |m| (order, m)))
            .collect();
        candidates.sort_by_key(|(order, m)| (m.start, Reverse(m.end - m.start), *order));

        let mut kept: Vec<Marker> = Vec::with_capacity(candidates.len());
        for (_, marker) in candidates {
            let overlaps = kept.iter().any(|k| {
                k.kind == marker.kind && marker.start < k.end && marker.end > k.start
            });
            if !overlaps {
                kept.push(marker);
            }
        }
        kept
    }

    pub fn analyze(&self, text: &str, hints: Option<&PatternHints>) -> StructuralAnalysis {
        let occurrences = self.detect(text);

        let week_structure = week_structure(&occurrences);
        let day_structure = day_structure(&occurrences);
        let session_structure = session_structure(&occurrences);
        let duration_analysis = duration_analysis(&occurrences);

        let present = |kind: MarkerKind| occurrences.iter().any(|m| m.kind == kind);
        let scores = StructureScores {
            weeks: if present(MarkerKind::Week) { WEEK_WEIGHT } else { 0.0 },
            days: if present(MarkerKind::Day) { DAY_WEIGHT } else { 0.0 },
            sessions: if present(MarkerKind::Session) || present(MarkerKind::Frequency) {
                SESSION_WEIGHT
            } else {
                0.0
            },
            durations: if present(MarkerKind::Duration) {
                DURATION_WEIGHT
            } else {
                0.0
            },
        };
        let total = scores.total();

        StructuralAnalysis {
            week_structure,
            day_structure,
            session_structure,
            duration_analysis,
            scores,
            organization_level: classify(total),
            confidence: clamp_confidence(total.min(1.0)),
            occurrences,
            expected: hints.cloned(),
        }
    }
}

/// First occurrence of each normalized value.
fn distinct<'a>(markers: impl Iterator<Item = &'a Marker>) -> Vec<Marker> {
    let mut seen = BTreeSet::new();
    markers
        .filter(|m| seen.insert(m.key.clone()))
        .cloned()
        .collect()
}

fn week_structure(occurrences: &[Marker]) -> WeekStructure {
    let markers = distinct(occurrences.iter().filter(|m| m.kind == MarkerKind::Week));
    let week_numbers: Vec<u32> = markers
        .iter()
        .filter_map(|m| match m.value {
            MarkerValue::Week { number } => Some(number),
            _ => None,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let declared_weeks = markers
        .iter()
        .filter_map(|m| match m.value {
            MarkerValue::WeekCount { count } => Some(count),
            _ => None,
        })
        .max();
    let sequential = !week_numbers.is_empty()
        && week_numbers
            .iter()
            .enumerate()
            .all(|(i, n)| *n as usize == i + 1);

    WeekStructure {
        total_weeks: week_numbers.len() as u32,
        markers,
        week_numbers,
        declared_weeks,
        sequential,
    }
}

fn day_structure(occurrences: &[Marker]) -> DayStructure {
    let markers = distinct(occurrences.iter().filter(|m| m.kind == MarkerKind::Day));
    let days: Vec<String> = markers.iter().filter_map(|m| m.value.day_label()).collect();
    DayStructure {
        total_days: days.len() as u32,
        markers,
        days,
    }
}

fn session_structure(occurrences: &[Marker]) -> SessionStructure {
    let markers = distinct(occurrences.iter().filter(|m| {
        matches!(
            m.kind,
            MarkerKind::Session | MarkerKind::Frequency | MarkerKind::Time
        )
    }));

    let mut total_sessions = 0;
    let mut highest_numbered = None;
    let mut declared_sessions = None;
    let mut frequency_per_week = None;
    let mut times = Vec::new();
    for m in &markers {
        match m.value {
            MarkerValue::Session { number } => {
                total_sessions += 1;
                if let Some(n) = number {
                    highest_numbered = highest_numbered.max(Some(n));
                }
            }
            MarkerValue::SessionCount { count } => {
                declared_sessions = declared_sessions.max(Some(count));
            }
            MarkerValue::Frequency { per_week } => {
                frequency_per_week = frequency_per_week.max(Some(per_week));
            }
            MarkerValue::Time { hour, minute } => times.push(format!("{hour:02}:{minute:02}")),
            _ => {}
        }
    }

    SessionStructure {
        markers,
        total_sessions,
        highest_numbered,
        declared_sessions,
        frequency_per_week,
        times,
    }
}

fn duration_analysis(occurrences: &[Marker]) -> DurationAnalysis {
    let markers = distinct(occurrences.iter().filter(|m| m.kind == MarkerKind::Duration));
    let ranges: Vec<(u32, u32, bool)> = markers
        .iter()
        .filter_map(|m| match m.value {
            MarkerValue::Duration {
                min_minutes,
                max_minutes,
                per_session,
            } => Some((min_minutes, max_minutes, per_session)),
            _ => None,
        })
        .collect();

    let average_minutes = if ranges.is_empty() {
        None
    } else {
        let sum: u32 = ranges.iter().map(|(lo, hi, _)| (lo + hi) / 2).sum();
        Some(sum / ranges.len() as u32)
    };

    DurationAnalysis {
        min_minutes: ranges.iter().map(|r| r.0).min(),
        max_minutes: ranges.iter().map(|r| r.1).max(),
        average_minutes,
        per_session_minutes: ranges
            .iter()
            .find(|r| r.2)
            .map(|(lo, hi, _)| (lo + hi) / 2),
        markers,
    }
}
