//! Session enrichment content: the rule-based generator, prompt building
//! for inference tiers, and parsing/merging of generated text.
//!
//! The rule-based generator is deterministic. Selections rotate through the
//! knowledge tables by a stable hash of the session id, so the same session
//! always receives the same content.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::knowledge::{age_guidance, drills_for, intensity_for, sport_profile, SportProfile};
use crate::models::{
    clamp_confidence, AthleteProfile, Drill, EnhancedSession, EnhancementRecord,
    EnhancementSource, SessionRecord,
};

/// Confidence floor of rule-based enhancements.
pub const RULE_BASED_CONFIDENCE: f64 = 0.8;
/// Confidence of a fully generated remote enhancement.
pub const REMOTE_BASE_CONFIDENCE: f64 = 0.9;
/// Confidence lost for each section filled in from the rules.
pub const FILLED_SECTION_PENALTY: f64 = 0.05;

const WARM_UP_MINUTES: u32 = 10;
const COOL_DOWN_MINUTES: u32 = 10;

static DRILL_MINUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(?\s*(\d{1,3})\s*(?:minutes|mins|min|')\s*\)?").expect("valid drill-minutes regex")
});

/// FNV-1a, stable across runs and platforms.
fn stable_hash(input: &str) -> u64 {
    input.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Up to `n` items starting at `seed % len`, wrapping around.
fn rotate<T: Copy>(items: &[T], seed: u64, n: usize) -> Vec<T> {
    if items.is_empty() {
        return Vec::new();
    }
    let start = (seed % items.len() as u64) as usize;
    items
        .iter()
        .cycle()
        .skip(start)
        .take(n.min(items.len()))
        .copied()
        .collect()
}

fn owned(items: Vec<&str>) -> Vec<String> {
    items.into_iter().map(str::to_string).collect()
}

/// Build the deterministic enhanced session.
pub fn rule_based_session(session: &SessionRecord, profile: &AthleteProfile) -> EnhancedSession {
    let sport = sport_profile(&profile.sport);
    let seed = stable_hash(&session.id);

    let mut objectives: Vec<String> = session
        .focus
        .iter()
        .take(1)
        .map(|f| format!("Develop {f} in a game-realistic setting"))
        .collect();
    objectives.extend(owned(rotate(sport.objectives, seed, 2)));

    let budget = session
        .duration
        .saturating_sub(WARM_UP_MINUTES + COOL_DOWN_MINUTES)
        .max(10);
    let mut remaining = budget;
    let mut drills = Vec::new();
    let candidates = drills_for(sport, profile.difficulty, &session.focus);
    for template in candidates {
        if remaining == 0 {
            break;
        }
        let minutes = template.minutes.min(remaining);
        remaining -= minutes;
        drills.push(Drill {
            name: template.name.to_string(),
            minutes,
            description: template.description.to_string(),
        });
    }

    EnhancedSession {
        session: session.clone(),
        objectives,
        warm_up: owned(rotate(sport.warm_ups, seed, 2)),
        drills,
        coaching_points: owned(rotate(sport.coaching_points, seed, 3)),
        cool_down: owned(rotate(sport.cool_downs, seed, 1)),
        equipment: owned(sport.equipment.to_vec()),
        intensity: intensity_for(profile.difficulty, profile.age_group).to_string(),
    }
}

fn rule_improvements(enhanced: &EnhancedSession, profile: &AthleteProfile) -> Vec<String> {
    let mut improvements = vec![
        format!(
            "Added {} drills sized to a {}-minute session",
            enhanced.drills.len(),
            enhanced.session.duration
        ),
        "Added a structured warm-up and cool-down".to_string(),
        format!("Added {} coaching points", enhanced.coaching_points.len()),
    ];
    if let Some(group) = profile.age_group {
        let guidance = age_guidance(group);
        if enhanced.session.duration > guidance.max_session_minutes {
            improvements.push(format!(
                "Session exceeds the recommended {} minutes for {} athletes",
                guidance.max_session_minutes,
                group.as_str()
            ));
        }
        improvements.extend(guidance.notes.iter().map(|n| n.to_string()));
    }
    improvements
}

/// Rule-based enhancement record. Always non-empty, confidence at the floor.
pub fn rule_based(
    session: &SessionRecord,
    profile: &AthleteProfile,
    timestamp: DateTime<Utc>,
) -> EnhancementRecord {
    let enhanced = rule_based_session(session, profile);
    EnhancementRecord {
        original_session: session.clone(),
        improvements: rule_improvements(&enhanced, profile),
        enhanced_session: enhanced,
        confidence: RULE_BASED_CONFIDENCE,
        source: EnhancementSource::RuleBased,
        timestamp,
    }
}

/// Prompt for an inference tier, using the same tables as the rule-based
/// generator.
pub fn build_prompt(session: &SessionRecord, profile: &AthleteProfile) -> String {
    let sport: &SportProfile = sport_profile(&profile.sport);
    let age = profile.age_group.map(|g| g.as_str()).unwrap_or("mixed-age");
    let mut prompt = format!(
        "You are an experienced {} coach. Enhance this training session for {} athletes at {} level.\n",
        sport.sport,
        age,
        profile.difficulty.as_str()
    );

    prompt.push_str(&format!("Session length: {} minutes.\n", session.duration));
    if let Some(day) = &session.date {
        prompt.push_str(&format!("Day: {day}.\n"));
    }
    if let Some(time) = &session.time {
        prompt.push_str(&format!("Start time: {time}.\n"));
    }
    if !session.focus.is_empty() {
        prompt.push_str(&format!("Focus: {}.\n", session.focus.join(", ")));
    }
    if !session.raw_excerpts.is_empty() {
        prompt.push_str("Coach notes:\n");
        for line in &session.raw_excerpts {
            prompt.push_str(&format!("- {line}\n"));
        }
    }
    let drills: Vec<&str> = drills_for(sport, profile.difficulty, &session.focus)
        .iter()
        .map(|d| d.name)
        .collect();
    prompt.push_str(&format!("Suitable drills: {}.\n", drills.join(", ")));
    prompt.push_str(&format!("Available equipment: {}.\n", sport.equipment.join(", ")));
    prompt.push_str(
        "Respond with the sections Objectives:, Warm-up:, Drills:, Coaching Points:, \
         Cool-down: and Equipment:, one item per line starting with \"- \". \
         Write drills as \"Name (N min): description\".",
    );
    prompt
}

/// Sections recovered from generated text. Any of them may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialContent {
    pub objectives: Vec<String>,
    pub warm_up: Vec<String>,
    pub drills: Vec<Drill>,
    pub coaching_points: Vec<String>,
    pub cool_down: Vec<String>,
    pub equipment: Vec<String>,
}

impl PartialContent {
    pub fn is_empty(&self) -> bool {
        self.present_sections() == 0
    }

    pub fn present_sections(&self) -> usize {
        [
            !self.objectives.is_empty(),
            !self.warm_up.is_empty(),
            !self.drills.is_empty(),
            !self.coaching_points.is_empty(),
            !self.cool_down.is_empty(),
            !self.equipment.is_empty(),
        ]
        .iter()
        .filter(|p| **p)
        .count()
    }
}

impl From<&EnhancedSession> for PartialContent {
    fn from(session: &EnhancedSession) -> Self {
        Self {
            objectives: session.objectives.clone(),
            warm_up: session.warm_up.clone(),
            drills: session.drills.clone(),
            coaching_points: session.coaching_points.clone(),
            cool_down: session.cool_down.clone(),
            equipment: session.equipment.clone(),
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Objectives,
    WarmUp,
    Drills,
    CoachingPoints,
    CoolDown,
    Equipment,
}

const SECTION_NAMES: [(&[&str], Section); 6] = [
    (&["objectives", "goals"], Section::Objectives),
    (&["warm-up", "warm up", "warmup"], Section::WarmUp),
    (&["drills", "main set", "activities"], Section::Drills),
    (&["coaching points", "key points", "coaching cues"], Section::CoachingPoints),
    (&["cool-down", "cool down", "cooldown"], Section::CoolDown),
    (&["equipment"], Section::Equipment),
];

/// Heading names are ASCII, so the match is made on the original line and
/// the inline content is sliced from it directly.
fn section_heading(line: &str) -> Option<(Section, &str)> {
    let trimmed = line.trim().trim_start_matches(['#', '*', ' ']);
    for (names, section) in SECTION_NAMES {
        for name in names {
            let Some(head) = trimmed.get(..name.len()) else {
                continue;
            };
            if !head.eq_ignore_ascii_case(name) {
                continue;
            }
            let rest = trimmed[name.len()..].trim_start_matches(['*', ' ']);
            if rest.is_empty() || rest.starts_with(':') {
                return Some((section, rest.trim_start_matches(':').trim()));
            }
        }
    }
    None
}

fn strip_bullet(line: &str) -> &str {
    let t = line.trim();
    let t = t
        .strip_prefix("- ")
        .or_else(|| t.strip_prefix("* "))
        .or_else(|| t.strip_prefix("• "))
        .unwrap_or(t);
    let digits = t.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 && t[digits..].starts_with(['.', ')']) {
        t[digits + 1..].trim()
    } else {
        t
    }
}

fn parse_drill(item: &str) -> Drill {
    let minutes = DRILL_MINUTES
        .captures(item)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(10);
    let without_minutes = DRILL_MINUTES.replace(item, "");
    let (name, description) = match without_minutes.split_once(':') {
        Some((n, d)) => (n.trim(), d.trim()),
        None => match without_minutes.split_once(" - ") {
            Some((n, d)) => (n.trim(), d.trim()),
            None => (without_minutes.trim(), ""),
        },
    };
    Drill {
        name: name.to_string(),
        minutes,
        description: description.to_string(),
    }
}

/// Split generated text into known sections. Unrecognized text before the
/// first heading is ignored.
pub fn parse_generated_text(text: &str) -> PartialContent {
    let mut out = PartialContent::default();
    let mut current: Option<Section> = None;

    let push = |section: Section, item: &str, out: &mut PartialContent| {
        let item = strip_bullet(item);
        if item.is_empty() {
            return;
        }
        match section {
            Section::Objectives => out.objectives.push(item.to_string()),
            Section::WarmUp => out.warm_up.push(item.to_string()),
            Section::Drills => out.drills.push(parse_drill(item)),
            Section::CoachingPoints => out.coaching_points.push(item.to_string()),
            Section::CoolDown => out.cool_down.push(item.to_string()),
            Section::Equipment => out.equipment.extend(
                item.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            ),
        }
    };

    for line in text.lines() {
        if let Some((section, inline)) = section_heading(line) {
            current = Some(section);
            push(section, inline, &mut out);
        } else if let Some(section) = current {
            push(section, line, &mut out);
        }
    }
    out
}

/// Fill sections missing from generated content with rule-based content.
/// Returns the merged session and the names of the sections that were filled.
pub fn merge(partial: PartialContent, fallback: EnhancedSession) -> (EnhancedSession, Vec<&'static str>) {
    let mut filled = Vec::new();
    let mut take = |generated: Vec<String>, rules: Vec<String>, name: &'static str| {
        if generated.is_empty() {
            filled.push(name);
            rules
        } else {
            generated
        }
    };
    let objectives = take(partial.objectives, fallback.objectives, "objectives");
    let warm_up = take(partial.warm_up, fallback.warm_up, "warm-up");
    let coaching_points = take(partial.coaching_points, fallback.coaching_points, "coaching points");
    let cool_down = take(partial.cool_down, fallback.cool_down, "cool-down");
    let equipment = take(partial.equipment, fallback.equipment, "equipment");
    let drills = if partial.drills.is_empty() {
        filled.push("drills");
        fallback.drills
    } else {
        partial.drills
    };

    (
        EnhancedSession {
            session: fallback.session,
            objectives,
            warm_up,
            drills,
            coaching_points,
            cool_down,
            equipment,
            intensity: fallback.intensity,
        },
        filled,
    )
}

/// Build a record from generated text, filling gaps from the rules and
/// lowering confidence for each filled section.
pub fn from_generated_text(
    session: &SessionRecord,
    profile: &AthleteProfile,
    text: &str,
    source: EnhancementSource,
    base_confidence: f64,
    timestamp: DateTime<Utc>,
) -> Option<EnhancementRecord> {
    let improvements = vec![format!(
        "Generated objectives, drills and coaching content for {} minutes",
        session.duration
    )];
    merged_record(
        session,
        profile,
        parse_generated_text(text),
        improvements,
        base_confidence,
        source,
        timestamp,
    )
}

/// Build a record from an engine that already returns sections. Gaps are
/// filled and penalized exactly as for generated text.
pub fn from_structured(
    session: &SessionRecord,
    profile: &AthleteProfile,
    generated: &EnhancedSession,
    improvements: Vec<String>,
    base_confidence: f64,
    source: EnhancementSource,
    timestamp: DateTime<Utc>,
) -> Option<EnhancementRecord> {
    merged_record(
        session,
        profile,
        PartialContent::from(generated),
        improvements,
        base_confidence,
        source,
        timestamp,
    )
}

fn merged_record(
    session: &SessionRecord,
    profile: &AthleteProfile,
    partial: PartialContent,
    mut improvements: Vec<String>,
    base_confidence: f64,
    source: EnhancementSource,
    timestamp: DateTime<Utc>,
) -> Option<EnhancementRecord> {
    if partial.is_empty() {
        return None;
    }
    let (enhanced, filled) = merge(partial, rule_based_session(session, profile));

    if !filled.is_empty() {
        improvements.push(format!("Filled missing sections: {}", filled.join(", ")));
    }
    // Filled sections are rule-based content, so the record never scores
    // below the rule-based tier.
    let penalized = base_confidence - FILLED_SECTION_PENALTY * filled.len() as f64;
    let confidence = clamp_confidence(penalized.max(RULE_BASED_CONFIDENCE));

    Some(EnhancementRecord {
        original_session: session.clone(),
        enhanced_session: enhanced,
        improvements,
        confidence,
        source,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgeGroup, Difficulty};

    fn session(id: &str, duration: u32) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            date: Some("Monday".to_string()),
            time: None,
            duration,
            focus: vec!["passing".to_string()],
            raw_excerpts: vec!["Passing drills in pairs".to_string()],
        }
    }

    fn profile() -> AthleteProfile {
        AthleteProfile {
            sport: "soccer".to_string(),
            age_group: Some(AgeGroup::Youth),
            difficulty: Difficulty::Beginner,
        }
    }

    #[test]
    fn rule_based_is_deterministic_and_complete() {
        let now = Utc::now();
        let a = rule_based(&session("w1-s1", 60), &profile(), now);
        let b = rule_based(&session("w1-s1", 60), &profile(), now);
        assert_eq!(a, b);
        assert_eq!(a.source, EnhancementSource::RuleBased);
        assert!(a.confidence >= RULE_BASED_CONFIDENCE);
        let e = &a.enhanced_session;
        assert!(!e.objectives.is_empty());
        assert!(!e.warm_up.is_empty());
        assert!(!e.drills.is_empty());
        assert!(!e.coaching_points.is_empty());
        assert!(!e.cool_down.is_empty());
        assert!(!e.equipment.is_empty());
        assert_eq!(e.drills[0].name, "Passing triangles");
    }

    #[test]
    fn drills_fit_the_session() {
        let e = rule_based_session(&session("w2-s1", 45), &profile());
        let drill_minutes: u32 = e.drills.iter().map(|d| d.minutes).sum();
        assert!(drill_minutes <= 45 - WARM_UP_MINUTES - COOL_DOWN_MINUTES);
    }

    #[test]
    fn long_youth_session_gets_a_warning() {
        let r = rule_based(&session("w1-s2", 120), &profile(), Utc::now());
        assert!(r.improvements.iter().any(|i| i.contains("recommended 60 minutes")));
    }

    #[test]
    fn prompt_mentions_profile_and_notes() {
        let p = build_prompt(&session("w1-s1", 60), &profile());
        assert!(p.contains("soccer coach"));
        assert!(p.contains("youth athletes"));
        assert!(p.contains("- Passing drills in pairs"));
        assert!(p.contains("Passing triangles"));
    }

    #[test]
    fn parses_sections_and_drills() {
        let text = "Here is your plan.\n\
                    ## Objectives\n- Crisp passing\n- Movement off the ball\n\
                    Warm-up: jog and stretch\n\
                    Drills:\n1. Passing gates (12 min): pass through cone gates\n- Rondo - keep the ball\n\
                    Equipment: balls, cones";
        let p = parse_generated_text(text);
        assert_eq!(p.objectives, vec!["Crisp passing", "Movement off the ball"]);
        assert_eq!(p.warm_up, vec!["jog and stretch"]);
        assert_eq!(p.drills.len(), 2);
        assert_eq!(p.drills[0].name, "Passing gates");
        assert_eq!(p.drills[0].minutes, 12);
        assert_eq!(p.drills[0].description, "pass through cone gates");
        assert_eq!(p.drills[1].name, "Rondo");
        assert_eq!(p.equipment, vec!["balls", "cones"]);
        assert!(p.cool_down.is_empty());
    }

    #[test]
    fn missing_sections_are_filled_and_cost_confidence() {
        let text = "Objectives:\n- Crisp passing\nDrills:\n- Passing gates (12 min): gates";
        let r = from_generated_text(
            &session("w1-s1", 60),
            &profile(),
            text,
            EnhancementSource::Remote,
            REMOTE_BASE_CONFIDENCE,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(r.source, EnhancementSource::Remote);
        assert!(!r.enhanced_session.cool_down.is_empty());
        assert!((r.confidence - RULE_BASED_CONFIDENCE).abs() < 1e-9);

        let one_gap = "Objectives:\n- a\nWarm-up:\n- b\nDrills:\n- c\nCoaching points:\n- d\nCool-down:\n- e";
        let r = from_generated_text(
            &session("w1-s1", 60),
            &profile(),
            one_gap,
            EnhancementSource::Remote,
            REMOTE_BASE_CONFIDENCE,
            Utc::now(),
        )
        .unwrap();
        assert!((r.confidence - (0.9 - 0.05)).abs() < 1e-9);
    }

    #[test]
    fn mostly_empty_reply_stays_at_rule_based_floor() {
        let r = from_generated_text(
            &session("w1-s1", 60),
            &profile(),
            "Equipment: cones",
            EnhancementSource::Remote,
            REMOTE_BASE_CONFIDENCE,
            Utc::now(),
        )
        .unwrap();
        assert!(r.confidence >= RULE_BASED_CONFIDENCE);
    }

    #[test]
    fn non_ascii_inline_content_is_kept_intact() {
        let wide = "İ".repeat(20);
        let p = parse_generated_text(&format!("Drills: {wide}"));
        assert_eq!(p.drills.len(), 1);
        assert_eq!(p.drills[0].name, wide);

        let p = parse_generated_text("OBJECTIVES: Straße ẞ sprint\nẞẞẞ goals: not a heading");
        assert_eq!(p.objectives, vec!["Straße ẞ sprint", "ẞẞẞ goals: not a heading"]);

        let p = parse_generated_text("İİ\nÇool-down: x\nwarm up: Übung");
        assert!(p.cool_down.is_empty());
        assert_eq!(p.warm_up, vec!["Übung"]);
    }

    #[test]
    fn unparseable_text_yields_nothing() {
        assert!(from_generated_text(
            &session("w1-s1", 60),
            &profile(),
            "I cannot help with that.",
            EnhancementSource::Remote,
            REMOTE_BASE_CONFIDENCE,
            Utc::now(),
        )
        .is_none());
    }

    #[test]
    fn structured_result_keeps_engine_sections() {
        let base = rule_based_session(&session("w1-s1", 60), &profile());
        let generated = EnhancedSession {
            objectives: vec!["Switch play quickly".to_string()],
            warm_up: Vec::new(),
            ..base
        };
        let r = from_structured(
            &session("w1-s1", 60),
            &profile(),
            &generated,
            vec!["Local engine output".to_string()],
            0.85,
            EnhancementSource::Local,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(r.enhanced_session.objectives, vec!["Switch play quickly"]);
        assert!(!r.enhanced_session.warm_up.is_empty());
        assert!((r.confidence - 0.8).abs() < 1e-9);
        assert!(r.improvements.iter().any(|i| i.contains("warm-up")));
    }
}
