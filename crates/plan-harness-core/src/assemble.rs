//! Plan assembly: derive a [`TrainingPlan`] from normalized text and its
//! [`StructuralAnalysis`].
//!
//! Every derived field is a deterministic function of `(text, document
//! metadata, analysis)`. Only the plan id (on first assembly), the version
//! and the creation timestamp depend on prior state.
//!
//! The analysis must come from the same text passed here: marker offsets
//! are byte positions into it.
//!
//! # Weeks and sessions
//!
//! Weeks are split at week markers that start a line (or at every week
//! marker when none do). A week number that appears more than once is
//! merged into a single week; the later section's sessions are appended
//! after the earlier ones, keeping their order. Inside a week, sessions are
//! split at day or session markers that start a line.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::analyze::{Marker, MarkerKind, MarkerValue, StructuralAnalysis};
use crate::models::{
    AgeGroup, Difficulty, DocumentRecord, Schedule, SessionRecord, TrainingPlan, WeekRecord,
};

pub const DEFAULT_DURATION_WEEKS: u32 = 4;
pub const SESSIONS_PER_WEEK_ESTIMATE: u32 = 3;
pub const MIN_SESSIONS_ESTIMATE: u32 = 12;
pub const DEFAULT_SESSION_MINUTES: u32 = 60;
pub const MAX_TAGS: usize = 5;
const MAX_FOCUS: usize = 3;
const TITLE_SCAN_LINES: usize = 10;
const MAX_TITLE_CHARS: usize = 80;
const MAX_TITLE_WORDS: usize = 10;
const MAX_EXCERPTS: usize = 12;
const MAX_EXCERPT_CHARS: usize = 200;

/// Closed category taxonomy in declaration order. Order breaks ties.
/// The last entry, `general`, is also the default when nothing matches.
pub const CATEGORIES: &[(&str, &[&str])] = &[
    ("soccer", &["soccer", "football", "futbol", "fútbol", "goalkeeper", "striker", "midfield", "midfielder", "offside", "corner kick", "penalty kick"]),
    ("basketball", &["basketball", "layup", "layups", "rebound", "rebounding", "free throw", "free throws", "jump shot", "pick and roll", "hoop"]),
    ("tennis", &["tennis", "forehand", "backhand", "racquet", "racket", "baseline"]),
    ("volleyball", &["volleyball", "spike", "setter", "libero"]),
    ("baseball", &["baseball", "softball", "pitching", "batting", "inning", "infield"]),
    ("hockey", &["hockey", "puck", "skating", "stickhandling"]),
    ("rugby", &["rugby", "scrum", "lineout", "ruck", "maul"]),
    ("swimming", &["swimming", "swim", "freestyle", "backstroke", "breaststroke", "butterfly", "pool", "laps"]),
    ("running", &["running", "run", "runs", "marathon", "half marathon", "5k", "10k", "jog", "jogging", "tempo run", "track"]),
    ("cycling", &["cycling", "bike", "ride", "rides", "cyclist", "peloton"]),
    ("fitness", &["fitness", "strength training", "squat", "squats", "deadlift", "push-ups", "pushups", "hiit", "gym", "kettlebell", "circuit"]),
    ("general", &["multi-sport", "multisport", "all-round", "athletic development", "conditioning"]),
];

pub const DEFAULT_CATEGORY: &str = "general";

const DIFFICULTY_KEYWORDS: &[(Difficulty, &[&str])] = &[
    (Difficulty::Beginner, &["beginner", "beginners", "novice", "introductory", "intro", "foundation", "foundations", "entry level", "entry-level", "easy"]),
    (Difficulty::Intermediate, &["intermediate", "moderate", "developing", "improver"]),
    (Difficulty::Advanced, &["advanced", "elite", "expert", "competitive", "high performance", "high-performance"]),
];

/// Fixed tag vocabulary. Session focus uses the same list.
pub const TAG_VOCABULARY: &[&str] = &[
    "endurance",
    "strength",
    "speed",
    "agility",
    "technique",
    "tactics",
    "conditioning",
    "flexibility",
    "mobility",
    "recovery",
    "passing",
    "shooting",
    "dribbling",
    "defending",
    "finishing",
    "possession",
    "serve",
    "power",
    "plyometrics",
    "teamwork",
];

fn keyword_regex(words: &[&str]) -> Regex {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("keyword list builds a valid regex")
}

static CATEGORY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    CATEGORIES
        .iter()
        .map(|(name, words)| (*name, keyword_regex(words)))
        .collect()
});

static DIFFICULTY_PATTERNS: LazyLock<Vec<(Difficulty, Regex)>> = LazyLock::new(|| {
    DIFFICULTY_KEYWORDS
        .iter()
        .map(|(d, words)| (*d, keyword_regex(words)))
        .collect()
});

static TAG_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    TAG_VOCABULARY
        .iter()
        .map(|tag| {
            let plural = format!("{tag}s");
            (*tag, keyword_regex(&[*tag, plural.as_str()]))
        })
        .collect()
});

static TITLE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:training plan|title|program|programme|plan)\s*[:\-]\s*(\S.*)$")
        .expect("valid title regex")
});

static AGE_NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:u|under[- ]?)(\d{1,2})s?\b").expect("valid age regex")
});

static AGE_WORDS: LazyLock<Vec<(AgeGroup, Regex)>> = LazyLock::new(|| {
    vec![
        (AgeGroup::Youth, keyword_regex(&["youth", "kids", "children", "junior", "juniors"])),
        (AgeGroup::Teen, keyword_regex(&["teen", "teens", "teenagers", "high school"])),
        (AgeGroup::Adult, keyword_regex(&["adult", "adults"])),
        (AgeGroup::Masters, keyword_regex(&["masters", "veterans", "seniors"])),
    ]
});

/// Everything derived from the inputs, without identity or versioning.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFields {
    pub title: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub duration: u32,
    pub sessions_count: u32,
    pub tags: Vec<String>,
    pub age_group: Option<AgeGroup>,
    pub schedule: Schedule,
    pub weeks: Vec<WeekRecord>,
}

pub fn derive_fields(
    text: &str,
    document: &DocumentRecord,
    analysis: &StructuralAnalysis,
) -> DerivedFields {
    let category = derive_category(text);
    let duration = derive_duration(analysis);
    let weeks = assemble_weeks(text, analysis);
    DerivedFields {
        title: derive_title(text, &document.original_name, analysis),
        tags: derive_tags(text, &category),
        difficulty: derive_difficulty(text),
        sessions_count: derive_sessions_count(analysis, duration, &weeks),
        age_group: derive_age_group(text),
        schedule: derive_schedule(analysis),
        weeks,
        category,
        duration,
    }
}

/// Assemble a plan. With a `previous` version the id is kept and the
/// version incremented; the previous record itself is left untouched.
pub fn assemble(
    text: &str,
    document: &DocumentRecord,
    analysis: &StructuralAnalysis,
    previous: Option<&TrainingPlan>,
    created_at: DateTime<Utc>,
) -> TrainingPlan {
    let fields = derive_fields(text, document, analysis);
    let (id, version) = match previous {
        Some(prev) => (prev.id.clone(), prev.version + 1),
        None => (uuid::Uuid::new_v4().to_string(), 1),
    };
    TrainingPlan {
        id,
        title: fields.title,
        category: fields.category,
        difficulty: fields.difficulty,
        duration: fields.duration,
        sessions_count: fields.sessions_count,
        tags: fields.tags,
        source_document: document.id.clone(),
        weeks: fields.weeks,
        version,
        created_at,
        age_group: fields.age_group,
        schedule: fields.schedule,
        organization_level: analysis.organization_level,
        confidence: analysis.confidence,
    }
}

pub fn derive_title(text: &str, file_name: &str, analysis: &StructuralAnalysis) -> String {
    let marker_lines: Vec<usize> = analysis
        .occurrences
        .iter()
        .filter(|m| matches!(m.kind, MarkerKind::Week | MarkerKind::Day | MarkerKind::Session))
        .filter(|m| starts_line(text, m))
        .map(|m| m.line)
        .collect();

    let candidates = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i, l.trim()))
        .filter(|(_, l)| !l.is_empty())
        .take(TITLE_SCAN_LINES);
    for (index, line) in candidates {
        if let Some(caps) = TITLE_PREFIX.captures(line) {
            if let Some(title) = caps.get(1) {
                return truncate_chars(title.as_str().trim(), MAX_TITLE_CHARS);
            }
        }
        if !marker_lines.contains(&index) && is_heading_line(line) {
            return line.to_string();
        }
    }
    title_from_file_name(file_name)
}

fn is_heading_line(line: &str) -> bool {
    let first_alpha = line.chars().find(|c| c.is_alphabetic());
    line.chars().count() <= MAX_TITLE_CHARS
        && line.split_whitespace().count() <= MAX_TITLE_WORDS
        && first_alpha.is_some_and(|c| c.is_uppercase())
        && line.chars().next().is_some_and(|c| c.is_alphanumeric())
        && !line.ends_with(['.', ',', ':', ';'])
}

pub fn title_from_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    let words: Vec<String> = stem
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    if words.is_empty() {
        "Untitled Training Plan".to_string()
    } else {
        words.join(" ")
    }
}

/// Highest keyword count wins; ties go to the earlier category.
pub fn derive_category(text: &str) -> String {
    let mut best: Option<(&str, usize)> = None;
    for (name, pattern) in CATEGORY_PATTERNS.iter() {
        let hits = pattern.find_iter(text).count();
        if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((name, hits));
        }
    }
    best.map(|(name, _)| name)
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string()
}

/// A strict keyword winner, otherwise intermediate.
pub fn derive_difficulty(text: &str) -> Difficulty {
    let counts: Vec<(Difficulty, usize)> = DIFFICULTY_PATTERNS
        .iter()
        .map(|(d, p)| (*d, p.find_iter(text).count()))
        .collect();
    let max = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
    let winners: Vec<Difficulty> = counts
        .iter()
        .filter(|(_, c)| *c == max && max > 0)
        .map(|(d, _)| *d)
        .collect();
    match winners.as_slice() {
        [single] => *single,
        _ => Difficulty::default(),
    }
}

/// Longest of the highest week number and any declared week count.
pub fn derive_duration(analysis: &StructuralAnalysis) -> u32 {
    let weeks = &analysis.week_structure;
    weeks
        .week_numbers
        .iter()
        .copied()
        .chain(weeks.declared_weeks)
        .max()
        .unwrap_or(DEFAULT_DURATION_WEEKS)
}

/// Never fewer than the sessions assembled. With explicit session evidence
/// (session markers, numbers, a declared count) the largest of those wins;
/// otherwise the duration estimate, floored at [`MIN_SESSIONS_ESTIMATE`].
pub fn derive_sessions_count(analysis: &StructuralAnalysis, duration: u32, weeks: &[WeekRecord]) -> u32 {
    let sessions = &analysis.session_structure;
    let assembled = weeks.iter().map(|w| w.daily_sessions.len() as u32).sum::<u32>();
    let explicit = sessions
        .highest_numbered
        .into_iter()
        .chain(sessions.declared_sessions)
        .max();
    match explicit {
        Some(n) => n.max(assembled),
        None if sessions.total_sessions > 0 => assembled,
        None => (duration * SESSIONS_PER_WEEK_ESTIMATE)
            .max(MIN_SESSIONS_ESTIMATE)
            .max(assembled),
    }
}

fn vocabulary_hits(text: &str) -> Vec<&'static str> {
    let mut hits: Vec<(usize, usize, &str)> = TAG_PATTERNS
        .iter()
        .enumerate()
        .map(|(order, (tag, p))| (p.find_iter(text).count(), order, *tag))
        .filter(|(count, _, _)| *count > 0)
        .collect();
    hits.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    hits.into_iter().map(|(_, _, tag)| tag).collect()
}

/// Category first, then vocabulary hits by frequency.
pub fn derive_tags(text: &str, category: &str) -> Vec<String> {
    let mut tags = vec![category.to_string()];
    for tag in vocabulary_hits(text) {
        if tags.len() >= MAX_TAGS {
            break;
        }
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Earliest age reference in the text.
pub fn derive_age_group(text: &str) -> Option<AgeGroup> {
    let mut found: Vec<(usize, AgeGroup)> = Vec::new();
    for caps in AGE_NUMERIC.captures_iter(text) {
        let (Some(whole), Some(age)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if let Ok(age) = age.as_str().parse::<u32>() {
            if (5..=99).contains(&age) {
                found.push((whole.start(), AgeGroup::from_age(age)));
                break;
            }
        }
    }
    for (group, pattern) in AGE_WORDS.iter() {
        if let Some(m) = pattern.find(text) {
            found.push((m.start(), *group));
        }
    }
    found.into_iter().min_by_key(|(pos, _)| *pos).map(|(_, g)| g)
}

pub fn derive_schedule(analysis: &StructuralAnalysis) -> Schedule {
    let days = analysis
        .day_structure
        .markers
        .iter()
        .filter_map(|m| match m.value {
            MarkerValue::Day { day } => Some(day.as_str().to_string()),
            _ => None,
        })
        .collect();
    Schedule {
        sessions_per_week: analysis.session_structure.frequency_per_week,
        days,
    }
}

/// Byte offset where the line containing `pos` starts.
fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |i| i + 1)
}

/// Byte offset just past the line containing `pos`.
fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map_or(text.len(), |i| pos + i + 1)
}

/// A marker starts its line when only whitespace or list bullets precede it.
fn starts_line(text: &str, marker: &Marker) -> bool {
    text[line_start(text, marker.start)..marker.start]
        .chars()
        .all(|c| c.is_whitespace() || matches!(c, '#' | '*' | '-' | '•' | '>' | '|'))
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn excerpts(span: &str) -> Vec<String> {
    span.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(MAX_EXCERPTS)
        .map(|l| truncate_chars(l, MAX_EXCERPT_CHARS))
        .collect()
}

struct WeekSection {
    number: u32,
    title: String,
    /// Byte range of the week's body, after its title line.
    body: (usize, usize),
}

fn week_sections(text: &str, analysis: &StructuralAnalysis) -> Vec<WeekSection> {
    let week_markers: Vec<&Marker> = analysis
        .occurrences_of(MarkerKind::Week)
        .filter(|m| matches!(m.value, MarkerValue::Week { .. }))
        .collect();
    let at_line_start: Vec<&Marker> = week_markers
        .iter()
        .copied()
        .filter(|m| starts_line(text, m))
        .collect();
    let boundaries = if at_line_start.is_empty() {
        week_markers
    } else {
        at_line_start
    };

    if boundaries.is_empty() {
        return vec![WeekSection {
            number: 1,
            title: "Week 1".to_string(),
            body: (0, text.len()),
        }];
    }

    boundaries
        .iter()
        .enumerate()
        .filter_map(|(i, m)| {
            let MarkerValue::Week { number } = m.value else {
                return None;
            };
            let title_end = line_end(text, m.start);
            let next = boundaries.get(i + 1).map_or(text.len(), |n| n.start);
            let title_line = text[line_start(text, m.start)..title_end].trim();
            Some(WeekSection {
                number,
                title: truncate_chars(title_line, MAX_TITLE_CHARS),
                body: (title_end.min(next), next.max(title_end.min(next))),
            })
        })
        .collect()
}

fn first_in<'a>(
    analysis: &'a StructuralAnalysis,
    kind: MarkerKind,
    (start, end): (usize, usize),
) -> Option<&'a Marker> {
    analysis
        .occurrences_of(kind)
        .find(|m| m.start >= start && m.start < end)
}

fn session_duration(analysis: &StructuralAnalysis, span: (usize, usize)) -> u32 {
    let explicit = first_in(analysis, MarkerKind::Duration, span).and_then(|m| match m.value {
        MarkerValue::Duration {
            min_minutes,
            max_minutes,
            ..
        } => Some((min_minutes + max_minutes) / 2),
        _ => None,
    });
    explicit
        .or(analysis.duration_analysis.per_session_minutes)
        .or(analysis.duration_analysis.average_minutes)
        .unwrap_or(DEFAULT_SESSION_MINUTES)
}

fn build_session(
    text: &str,
    analysis: &StructuralAnalysis,
    id: String,
    span: (usize, usize),
) -> SessionRecord {
    let body = &text[span.0..span.1];
    SessionRecord {
        id,
        date: first_in(analysis, MarkerKind::Day, span).and_then(|m| m.value.day_label()),
        time: first_in(analysis, MarkerKind::Time, span).and_then(|m| match m.value {
            MarkerValue::Time { hour, minute } => Some(format!("{hour:02}:{minute:02}")),
            _ => None,
        }),
        duration: session_duration(analysis, span),
        focus: vocabulary_hits(body)
            .into_iter()
            .take(MAX_FOCUS)
            .map(str::to_string)
            .collect(),
        raw_excerpts: excerpts(body),
    }
}

/// Session spans inside a week body, split at line-start day/session markers.
fn session_spans(text: &str, analysis: &StructuralAnalysis, body: (usize, usize)) -> Vec<(usize, usize)> {
    let mut starts: Vec<usize> = Vec::new();
    let mut last_line = None;
    for m in &analysis.occurrences {
        let is_boundary = match m.value {
            MarkerValue::Day { .. } | MarkerValue::DayIndex { .. } => true,
            MarkerValue::Session { .. } => true,
            _ => false,
        };
        if !is_boundary || m.start < body.0 || m.start >= body.1 || !starts_line(text, m) {
            continue;
        }
        if last_line == Some(m.line) {
            continue;
        }
        last_line = Some(m.line);
        starts.push(line_start(text, m.start).max(body.0));
    }

    if starts.is_empty() {
        return vec![body];
    }
    let mut spans: Vec<(usize, usize)> = starts
        .iter()
        .enumerate()
        .map(|(i, s)| (*s, starts.get(i + 1).copied().unwrap_or(body.1)))
        .collect();
    // Text between the week title and the first session belongs to it.
    if let Some(first) = spans.first_mut() {
        if text[body.0..first.0].trim().is_empty() {
            first.0 = body.0;
        }
    }
    spans
}

pub fn assemble_weeks(text: &str, analysis: &StructuralAnalysis) -> Vec<WeekRecord> {
    let mut weeks: BTreeMap<u32, WeekRecord> = BTreeMap::new();
    for section in week_sections(text, analysis) {
        let week = weeks.entry(section.number).or_insert_with(|| WeekRecord {
            week_number: section.number,
            title: section.title.clone(),
            daily_sessions: Vec::new(),
        });
        for span in session_spans(text, analysis, section.body) {
            let id = format!("w{}-s{}", section.number, week.daily_sessions.len() + 1);
            week.daily_sessions.push(build_session(text, analysis, id, span));
        }
    }
    weeks.into_values().collect()
}
