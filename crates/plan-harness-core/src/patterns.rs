//! Pattern fingerprints and the hints derived from them.
//!
//! A fingerprint is a compact summary of one successful assembly. The
//! library keeps an append-only list per format, capped to the most recent
//! entries; persistence lives in the application crate. Everything here is
//! pure list manipulation so it can be tested without a store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::StructuralAnalysis;
use crate::models::{clamp_confidence, FormatFamily, OrganizationLevel, PatternFingerprint, TrainingPlan};

pub const MAX_FINGERPRINTS_PER_FORMAT: usize = 50;
pub const HINT_LIMIT: usize = 5;
const MARKER_SAMPLE_LIMIT: usize = 5;

/// Persisted shape of the library: fingerprints keyed by format name.
pub type PatternLibraryState = BTreeMap<String, Vec<PatternFingerprint>>;

/// Soft expectations for a new document of a known format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternHints {
    pub expected_weeks: Option<u32>,
    pub expected_sessions: Option<u32>,
    pub probable_level: Option<OrganizationLevel>,
    /// Number of fingerprints the hints were computed from.
    pub sample_size: usize,
}

/// Summarize an assembled plan and the analysis it came from.
pub fn fingerprint(
    format: FormatFamily,
    analysis: &StructuralAnalysis,
    plan: &TrainingPlan,
    timestamp: DateTime<Utc>,
) -> PatternFingerprint {
    let mut marker_samples: Vec<String> = Vec::new();
    for marker in &analysis.occurrences {
        if marker_samples.len() >= MARKER_SAMPLE_LIMIT {
            break;
        }
        if !marker_samples.contains(&marker.text) {
            marker_samples.push(marker.text.clone());
        }
    }

    PatternFingerprint {
        format,
        organization_level: analysis.organization_level,
        week_count: plan.duration,
        session_count: plan.sessions_count,
        marker_samples,
        confidence: clamp_confidence(analysis.confidence),
        timestamp,
    }
}

/// Append to a per-format list, evicting the oldest entries beyond `cap`.
pub fn append_capped(list: &mut Vec<PatternFingerprint>, entry: PatternFingerprint, cap: usize) {
    list.push(entry);
    if list.len() > cap {
        let excess = list.len() - cap;
        list.drain(..excess);
    }
}

/// Best fingerprints first: confidence descending, then most recent.
pub fn rank(list: &[PatternFingerprint], limit: usize) -> Vec<PatternFingerprint> {
    let mut ranked = list.to_vec();
    ranked.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
    ranked.truncate(limit);
    ranked
}

/// Mean counts and the modal organization level of ranked fingerprints.
/// Ties on the level go to the higher-ranked fingerprint.
pub fn hints_from(ranked: &[PatternFingerprint]) -> Option<PatternHints> {
    if ranked.is_empty() {
        return None;
    }
    let n = ranked.len() as f64;
    let mean = |f: fn(&PatternFingerprint) -> u32| {
        let sum: f64 = ranked.iter().map(|fp| f64::from(f(fp))).sum();
        (sum / n).round() as u32
    };

    let mut counts: Vec<(OrganizationLevel, usize)> = Vec::new();
    for fp in ranked {
        match counts.iter_mut().find(|(level, _)| *level == fp.organization_level) {
            Some((_, c)) => *c += 1,
            None => counts.push((fp.organization_level, 1)),
        }
    }
    let mut probable_level = None;
    let mut best = 0;
    for (level, c) in counts {
        if c > best {
            best = c;
            probable_level = Some(level);
        }
    }

    let positive = |v: u32| (v > 0).then_some(v);
    Some(PatternHints {
        expected_weeks: positive(mean(|fp| fp.week_count)),
        expected_sessions: positive(mean(|fp| fp.session_count)),
        probable_level,
        sample_size: ranked.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fp(confidence: f64, secs: i64, weeks: u32, level: OrganizationLevel) -> PatternFingerprint {
        PatternFingerprint {
            format: FormatFamily::PlainText,
            organization_level: level,
            week_count: weeks,
            session_count: weeks * 3,
            marker_samples: vec![],
            confidence,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn cap_is_never_exceeded_and_oldest_go_first() {
        let mut list = Vec::new();
        for i in 0..120 {
            append_capped(&mut list, fp(0.5, i, 4, OrganizationLevel::BasicStructure), 50);
            assert!(list.len() <= 50);
        }
        assert_eq!(list.len(), 50);
        assert_eq!(list[0].timestamp.timestamp(), 70);
        assert_eq!(list[49].timestamp.timestamp(), 119);
    }

    #[test]
    fn rank_by_confidence_then_recency() {
        let list = vec![
            fp(0.5, 1, 4, OrganizationLevel::BasicStructure),
            fp(0.9, 2, 8, OrganizationLevel::HighlyStructured),
            fp(0.9, 3, 6, OrganizationLevel::HighlyStructured),
            fp(0.7, 4, 4, OrganizationLevel::ModeratelyStructured),
        ];
        let ranked = rank(&list, 3);
        let order: Vec<i64> = ranked.iter().map(|f| f.timestamp.timestamp()).collect();
        assert_eq!(order, vec![3, 2, 4]);
    }

    #[test]
    fn hints_average_counts() {
        let ranked = vec![
            fp(0.9, 3, 6, OrganizationLevel::HighlyStructured),
            fp(0.9, 2, 8, OrganizationLevel::HighlyStructured),
            fp(0.7, 4, 4, OrganizationLevel::ModeratelyStructured),
        ];
        let hints = hints_from(&ranked).unwrap();
        assert_eq!(hints.expected_weeks, Some(6));
        assert_eq!(hints.expected_sessions, Some(18));
        assert_eq!(hints.probable_level, Some(OrganizationLevel::HighlyStructured));
        assert_eq!(hints.sample_size, 3);
    }

    #[test]
    fn no_fingerprints_no_hints() {
        assert!(hints_from(&[]).is_none());
    }
}
