//! Marker rules for the structural analyzer.
//!
//! Each rule pairs a pattern with an extractor that turns a match into a
//! typed [`MarkerValue`]. Rules are independent: every one of them can be
//! run and tested on its own, and the analyzer simply runs the ordered list.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const ONES: &str = "one|two|three|four|five|six|seven|eight|nine";
const TEENS: &str =
    "ten|eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen";
const TENS: &str = "twenty|thirty|forty|fifty|sixty|seventy|eighty|ninety";

/// Regex fragment matching a spelled-out number from one to ninety-nine.
static SPELLED: LazyLock<String> =
    LazyLock::new(|| format!("(?:(?:{TENS})(?:[- ](?:{ONES}))?|{TEENS}|{ONES})"));

/// What a marker says something about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Week,
    Day,
    Session,
    Duration,
    Frequency,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }

    /// Resolve a day name in English, French, Spanish, German or Italian,
    /// or an English three/four letter abbreviation.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim_end_matches('.').to_lowercase();
        let day = match lower.as_str() {
            "monday" | "mon" | "lundi" | "lunes" | "montag" | "lunedi" | "lunedì" => Self::Monday,
            "tuesday" | "tue" | "tues" | "mardi" | "martes" | "dienstag" | "martedi"
            | "martedì" => Self::Tuesday,
            "wednesday" | "wed" | "mercredi" | "miercoles" | "miércoles" | "mittwoch"
            | "mercoledi" | "mercoledì" => Self::Wednesday,
            "thursday" | "thu" | "thur" | "thurs" | "jeudi" | "jueves" | "donnerstag"
            | "giovedi" | "giovedì" => Self::Thursday,
            "friday" | "fri" | "vendredi" | "viernes" | "freitag" | "venerdi" | "venerdì" => {
                Self::Friday
            }
            "saturday" | "sat" | "samedi" | "sabado" | "sábado" | "samstag" | "sabato" => {
                Self::Saturday
            }
            "sunday" | "sun" | "dimanche" | "domingo" | "sonntag" | "domenica" => Self::Sunday,
            _ => return None,
        };
        Some(day)
    }
}

/// Typed payload of a detected marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum MarkerValue {
    /// "Week 3"
    Week { number: u32 },
    /// "8-week program"
    WeekCount { count: u32 },
    /// "Monday", "mercredi", "Sat"
    Day { day: Weekday },
    /// "Day 4"
    DayIndex { number: u32 },
    /// "Session 2", "Workout"
    Session { number: Option<u32> },
    /// "24 sessions"
    SessionCount { count: u32 },
    /// "45 min", "30-45 minutes", "1.5 hours"
    Duration {
        min_minutes: u32,
        max_minutes: u32,
        per_session: bool,
    },
    /// "3x per week", "twice weekly"
    Frequency { per_week: u32 },
    /// "18:00", "6:30 pm"
    Time { hour: u32, minute: u32 },
}

impl MarkerValue {
    /// Normalized value used for de-duplication. Unnumbered session markers
    /// are distinct per line, so two "Workout" headings count twice.
    pub fn key(&self, line: usize) -> String {
        match self {
            Self::Week { number } => format!("week:{number}"),
            Self::WeekCount { count } => format!("weeks:{count}"),
            Self::Day { day } => format!("day:{}", day.as_str().to_lowercase()),
            Self::DayIndex { number } => format!("day:{number}"),
            Self::Session { number: Some(n) } => format!("session:{n}"),
            Self::Session { number: None } => format!("session@{line}"),
            Self::SessionCount { count } => format!("sessions:{count}"),
            Self::Duration {
                min_minutes,
                max_minutes,
                per_session,
            } => {
                let suffix = if *per_session { "/session" } else { "" };
                format!("duration:{min_minutes}-{max_minutes}{suffix}")
            }
            Self::Frequency { per_week } => format!("freq:{per_week}"),
            Self::Time { hour, minute } => format!("time:{hour:02}:{minute:02}"),
        }
    }

    /// Human label for day markers ("Monday", "Day 3").
    pub fn day_label(&self) -> Option<String> {
        match self {
            Self::Day { day } => Some(day.as_str().to_string()),
            Self::DayIndex { number } => Some(format!("Day {number}")),
            _ => None,
        }
    }
}

/// A position-tagged match produced by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub kind: MarkerKind,
    pub rule: String,
    /// Byte offsets into the analyzed text.
    pub start: usize,
    pub end: usize,
    /// Zero-based line index of `start`.
    pub line: usize,
    pub text: String,
    pub value: MarkerValue,
    pub key: String,
}

/// One detection pass over the text.
pub trait MarkerRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> MarkerKind;
    fn detect(&self, text: &str) -> Vec<Marker>;
}

/// Extractor signature: full text plus the match captures.
pub type Extractor = fn(&str, &Captures<'_>) -> Option<MarkerValue>;

/// A [`MarkerRule`] backed by a regex and an extractor function.
pub struct RegexRule {
    name: &'static str,
    kind: MarkerKind,
    pattern: Regex,
    extract: Extractor,
}

impl RegexRule {
    pub fn new(
        name: &'static str,
        kind: MarkerKind,
        pattern: &str,
        extract: Extractor,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            kind,
            pattern: Regex::new(pattern)?,
            extract,
        })
    }
}

impl MarkerRule for RegexRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> MarkerKind {
        self.kind
    }

    fn detect(&self, text: &str) -> Vec<Marker> {
        let line_starts = line_starts(text);
        let mut out = Vec::new();
        for caps in self.pattern.captures_iter(text) {
            let Some(m) = caps.get(0) else { continue };
            let Some(value) = (self.extract)(text, &caps) else {
                continue;
            };
            let line = line_of(&line_starts, m.start());
            out.push(Marker {
                kind: self.kind,
                rule: self.name.to_string(),
                start: m.start(),
                end: m.end(),
                line,
                text: m.as_str().trim().to_string(),
                key: value.key(line),
                value,
            });
        }
        out
    }
}

/// Byte offsets at which each line starts.
pub fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Line index containing byte offset `pos`.
pub fn line_of(line_starts: &[usize], pos: usize) -> usize {
    match line_starts.binary_search(&pos) {
        Ok(i) => i,
        Err(i) => i.saturating_sub(1),
    }
}

/// Parse digits (with `.` or `,` decimals), spelled numbers up to
/// ninety-nine, and the articles "a"/"an".
pub fn parse_number(token: &str) -> Option<f64> {
    let t = token.trim().to_lowercase();
    if let Ok(v) = t.replace(',', ".").parse::<f64>() {
        return Some(v);
    }
    if t == "a" || t == "an" {
        return Some(1.0);
    }
    let mut parts = t.split(['-', ' ']).filter(|p| !p.is_empty());
    let first = spelled_word(parts.next()?)?;
    match parts.next() {
        Some(second) if first >= 20 && first % 10 == 0 => {
            let unit = spelled_word(second).filter(|u| *u < 10)?;
            Some(f64::from(first + unit))
        }
        Some(_) => None,
        None => Some(f64::from(first)),
    }
}

fn spelled_word(word: &str) -> Option<u32> {
    let v = match word {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        _ => return None,
    };
    Some(v)
}

fn capture_u32(caps: &Captures<'_>, group: usize) -> Option<u32> {
    let v = parse_number(caps.get(group)?.as_str())?;
    if v.fract() != 0.0 || v < 0.0 {
        return None;
    }
    Some(v as u32)
}

fn preceding_word(text: &str, start: usize) -> String {
    text[..start]
        .trim_end()
        .rsplit(|c: char| c.is_whitespace())
        .next()
        .unwrap_or("")
        .to_lowercase()
}

fn following(text: &str, end: usize, len: usize) -> String {
    text[end..].chars().take(len).collect::<String>().to_lowercase()
}

fn to_minutes(value: f64, unit: &str) -> f64 {
    if unit.to_lowercase().starts_with('h') {
        value * 60.0
    } else {
        value
    }
}

fn is_per_session(text: &str, end: usize) -> bool {
    let after = following(text, end, 28);
    [
        "per session",
        "each session",
        "a session",
        "per workout",
        "per practice",
        "/session",
        "per training",
    ]
    .iter()
    .any(|p| after.contains(p))
}

fn duration_value(text: &str, end: usize, min: f64, max: f64) -> Option<MarkerValue> {
    let (min, max) = (min.round(), max.round());
    if !(1.0..=600.0).contains(&min) || !(1.0..=600.0).contains(&max) || min > max {
        return None;
    }
    Some(MarkerValue::Duration {
        min_minutes: min as u32,
        max_minutes: max as u32,
        per_session: is_per_session(text, end),
    })
}

fn extract_week(_: &str, caps: &Captures<'_>) -> Option<MarkerValue> {
    let number = capture_u32(caps, 1)?;
    (1..=52)
        .contains(&number)
        .then_some(MarkerValue::Week { number })
}

fn extract_week_count(_: &str, caps: &Captures<'_>) -> Option<MarkerValue> {
    let count = capture_u32(caps, 1)?;
    (1..=52)
        .contains(&count)
        .then_some(MarkerValue::WeekCount { count })
}

fn extract_day_name(_: &str, caps: &Captures<'_>) -> Option<MarkerValue> {
    let day = Weekday::from_name(caps.get(1)?.as_str())?;
    Some(MarkerValue::Day { day })
}

fn extract_day_number(_: &str, caps: &Captures<'_>) -> Option<MarkerValue> {
    let number = capture_u32(caps, 1)?;
    (1..=99)
        .contains(&number)
        .then_some(MarkerValue::DayIndex { number })
}

fn extract_session(text: &str, caps: &Captures<'_>) -> Option<MarkerValue> {
    let m = caps.get(0)?;
    // "per session", "each workout" describe a quantity, not a session heading.
    let before = preceding_word(text, m.start());
    if matches!(
        before.as_str(),
        "per" | "each" | "every" | "a" | "one" | "this" | "that" | "the" | "your"
    ) && caps.get(2).is_none()
    {
        return None;
    }
    let number = match caps.get(2) {
        Some(_) => Some(capture_u32(caps, 2)?),
        None => None,
    };
    Some(MarkerValue::Session { number })
}

fn extract_session_count(text: &str, caps: &Captures<'_>) -> Option<MarkerValue> {
    let m = caps.get(0)?;
    let after = following(text, m.end(), 16);
    let after = after.trim_start();
    if ["per week", "a week", "each week", "every week", "weekly", "/week", "per wk"]
        .iter()
        .any(|p| after.starts_with(p))
    {
        return None;
    }
    let count = capture_u32(caps, 1)?;
    (1..=500)
        .contains(&count)
        .then_some(MarkerValue::SessionCount { count })
}

fn extract_duration_range(text: &str, caps: &Captures<'_>) -> Option<MarkerValue> {
    let unit = caps.get(3)?.as_str();
    let lo = to_minutes(parse_number(caps.get(1)?.as_str())?, unit);
    let hi = to_minutes(parse_number(caps.get(2)?.as_str())?, unit);
    duration_value(text, caps.get(0)?.end(), lo, hi)
}

fn extract_duration_single(text: &str, caps: &Captures<'_>) -> Option<MarkerValue> {
    let unit = caps.get(2)?.as_str();
    let v = to_minutes(parse_number(caps.get(1)?.as_str())?, unit);
    duration_value(text, caps.get(0)?.end(), v, v)
}

fn extract_duration_phrase(text: &str, caps: &Captures<'_>) -> Option<MarkerValue> {
    let phrase = caps.get(1)?.as_str().to_lowercase();
    let minutes = match phrase.as_str() {
        "half an hour" => 30.0,
        "an hour" => 60.0,
        _ => 90.0,
    };
    duration_value(text, caps.get(0)?.end(), minutes, minutes)
}

fn extract_frequency_count(_: &str, caps: &Captures<'_>) -> Option<MarkerValue> {
    let per_week = capture_u32(caps, 1)?;
    (1..=14)
        .contains(&per_week)
        .then_some(MarkerValue::Frequency { per_week })
}

fn extract_frequency_word(_: &str, caps: &Captures<'_>) -> Option<MarkerValue> {
    let per_week = match caps.get(1)?.as_str().to_lowercase().as_str() {
        "once" => 1,
        "twice" => 2,
        _ => 3,
    };
    Some(MarkerValue::Frequency { per_week })
}

fn extract_frequency_daily(_: &str, _: &Captures<'_>) -> Option<MarkerValue> {
    Some(MarkerValue::Frequency { per_week: 7 })
}

fn meridiem_hour(hour: u32, meridiem: Option<&str>) -> u32 {
    match meridiem.map(|m| m.to_lowercase().replace('.', "")) {
        Some(m) if m == "pm" && hour < 12 => hour + 12,
        Some(m) if m == "am" && hour == 12 => 0,
        _ => hour,
    }
}

fn extract_time_clock(_: &str, caps: &Captures<'_>) -> Option<MarkerValue> {
    let hour = capture_u32(caps, 1)?;
    let minute = capture_u32(caps, 2)?;
    let hour = meridiem_hour(hour, caps.get(3).map(|m| m.as_str()));
    (hour < 24 && minute < 60).then_some(MarkerValue::Time { hour, minute })
}

fn extract_time_meridiem(_: &str, caps: &Captures<'_>) -> Option<MarkerValue> {
    let hour = capture_u32(caps, 1)?;
    let hour = meridiem_hour(hour, caps.get(2).map(|m| m.as_str()));
    (hour < 24).then_some(MarkerValue::Time { hour, minute: 0 })
}

/// The built-in rule list, in evaluation order.
pub fn default_rules() -> Vec<Box<dyn MarkerRule>> {
    let spelled = SPELLED.as_str();
    let specs: Vec<(&'static str, MarkerKind, String, Extractor)> = vec![
        (
            "week_number",
            MarkerKind::Week,
            format!(
                r"(?i)\b(?:week|wk|semaine|semana|woche|settimana)[ \t]*[-#:.]?[ \t]*(\d{{1,2}}|{spelled})\b"
            ),
            extract_week,
        ),
        (
            "week_count",
            MarkerKind::Week,
            format!(
                r"(?i)\b(\d{{1,2}}|{spelled})[- ]?(?:weeks?|wks?|semaines?|semanas?|wochen|settimane)\b"
            ),
            extract_week_count,
        ),
        (
            "day_name",
            MarkerKind::Day,
            r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday|lundi|mardi|mercredi|jeudi|vendredi|samedi|dimanche|lunes|martes|mi[eé]rcoles|jueves|viernes|s[aá]bado|domingo|montag|dienstag|mittwoch|donnerstag|freitag|samstag|sonntag|luned[iì]|marted[iì]|mercoled[iì]|gioved[iì]|venerd[iì]|sabato|domenica)\b"
                .to_string(),
            extract_day_name,
        ),
        (
            "day_abbreviation",
            MarkerKind::Day,
            r"\b(Mon|Tue|Tues|Wed|Thu|Thur|Thurs|Fri|Sat|Sun)\b".to_string(),
            extract_day_name,
        ),
        (
            "day_number",
            MarkerKind::Day,
            r"(?i)\b(?:day|jour|d[ií]a)[ \t]*[-#:.]?[ \t]*(\d{1,2})\b".to_string(),
            extract_day_number,
        ),
        (
            "session_marker",
            MarkerKind::Session,
            r"(?i)\b(session|workout|practice|s[ée]ance|sesi[oó]n|entrenamiento|trainingseinheit)\b(?:[ \t]*[-#:.]?[ \t]*(\d{1,3})\b)?"
                .to_string(),
            extract_session,
        ),
        (
            "session_count",
            MarkerKind::Session,
            format!(
                r"(?i)\b(\d{{1,3}}|{spelled})\s+(?:sessions|workouts|practices|s[ée]ances|sesiones)\b"
            ),
            extract_session_count,
        ),
        (
            "duration_range",
            MarkerKind::Duration,
            r"(?i)\b(\d{1,3})\s*(?:-|–|to)\s*(\d{1,3})\s*(minutes|minute|mins|min|hours|hour|hrs|hr|h)\b"
                .to_string(),
            extract_duration_range,
        ),
        (
            "duration_single",
            MarkerKind::Duration,
            r"(?i)\b(\d{1,3}(?:[.,]\d{1,2})?)\s*(minutes|minute|mins|min|hours|hour|hrs|hr|h)\b"
                .to_string(),
            extract_duration_single,
        ),
        (
            "duration_spelled",
            MarkerKind::Duration,
            format!(r"(?i)\b({spelled})\s+(minutes?|hours?)\b"),
            extract_duration_single,
        ),
        (
            "duration_phrase",
            MarkerKind::Duration,
            r"(?i)\b(an hour and a half|half an hour|an hour)\b".to_string(),
            extract_duration_phrase,
        ),
        (
            "frequency_count",
            MarkerKind::Frequency,
            format!(
                r"(?i)\b(\d{{1,2}}|{spelled})\s*(?:x|times|sessions|workouts|practices|days|trainings)\s*(?:per|a|each|every|/)\s*week\b"
            ),
            extract_frequency_count,
        ),
        (
            "frequency_word",
            MarkerKind::Frequency,
            r"(?i)\b(once|twice|thrice)\s+(?:(?:a|per|each)\s+week|weekly)\b".to_string(),
            extract_frequency_word,
        ),
        (
            "frequency_daily",
            MarkerKind::Frequency,
            r"(?i)\b(?:every\s+day|(?:train|training|practice|work\s+out)\s+daily)\b".to_string(),
            extract_frequency_daily,
        ),
        (
            "time_clock",
            MarkerKind::Time,
            r"(?i)\b([01]?\d|2[0-3])[:h]([0-5]\d)(?:\s*(am|pm|a\.m\.|p\.m\.))?".to_string(),
            extract_time_clock,
        ),
        (
            "time_meridiem",
            MarkerKind::Time,
            r"(?i)\b(1[0-2]|0?[1-9])\s*(am|pm)\b".to_string(),
            extract_time_meridiem,
        ),
    ];

    specs
        .into_iter()
        .map(|(name, kind, pattern, extract)| {
            let rule = RegexRule::new(name, kind, &pattern, extract)
                .unwrap_or_else(|e| panic!("built-in rule {name} has an invalid pattern: {e}"));
            Box::new(rule) as Box<dyn MarkerRule>
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str) -> Box<dyn MarkerRule> {
        default_rules()
            .into_iter()
            .find(|r| r.name() == name)
            .unwrap()
    }

    fn values(name: &str, text: &str) -> Vec<MarkerValue> {
        rule(name).detect(text).into_iter().map(|m| m.value).collect()
    }

    #[test]
    fn week_numbers_in_several_languages() {
        assert_eq!(
            values("week_number", "Week 1\nSemaine 2\nsemana 3\nWoche 4\nWk 12"),
            vec![
                MarkerValue::Week { number: 1 },
                MarkerValue::Week { number: 2 },
                MarkerValue::Week { number: 3 },
                MarkerValue::Week { number: 4 },
                MarkerValue::Week { number: 12 },
            ]
        );
    }

    #[test]
    fn week_number_out_of_range_is_ignored() {
        assert!(values("week_number", "Week 60").is_empty());
        assert_eq!(
            values("week_number", "Week Two"),
            vec![MarkerValue::Week { number: 2 }]
        );
    }

    #[test]
    fn week_count_phrases() {
        assert_eq!(
            values("week_count", "An 8-week program over twelve weeks"),
            vec![
                MarkerValue::WeekCount { count: 8 },
                MarkerValue::WeekCount { count: 12 },
            ]
        );
    }

    #[test]
    fn mixed_language_day_names() {
        let days: Vec<_> = values("day_name", "Monday, mercredi, Viernes and Samstag")
            .into_iter()
            .collect();
        assert_eq!(
            days,
            vec![
                MarkerValue::Day { day: Weekday::Monday },
                MarkerValue::Day { day: Weekday::Wednesday },
                MarkerValue::Day { day: Weekday::Friday },
                MarkerValue::Day { day: Weekday::Saturday },
            ]
        );
    }

    #[test]
    fn day_abbreviations_are_case_sensitive() {
        assert_eq!(
            values("day_abbreviation", "Tues: hills; we sat down"),
            vec![MarkerValue::Day { day: Weekday::Tuesday }]
        );
    }

    #[test]
    fn session_markers_skip_quantity_phrases() {
        assert_eq!(
            values("session_marker", "Session 2\n60 minutes per session\nWorkout"),
            vec![
                MarkerValue::Session { number: Some(2) },
                MarkerValue::Session { number: None },
            ]
        );
    }

    #[test]
    fn session_count_excludes_frequency() {
        assert_eq!(
            values("session_count", "24 sessions in total, 3 sessions per week"),
            vec![MarkerValue::SessionCount { count: 24 }]
        );
    }

    #[test]
    fn durations_in_many_shapes() {
        let d = |lo, hi, ps| MarkerValue::Duration {
            min_minutes: lo,
            max_minutes: hi,
            per_session: ps,
        };
        assert_eq!(values("duration_range", "30-45 min"), vec![d(30, 45, false)]);
        assert_eq!(values("duration_single", "1.5 hours"), vec![d(90, 90, false)]);
        assert_eq!(
            values("duration_spelled", "forty-five minutes per session"),
            vec![d(45, 45, true)]
        );
        assert_eq!(values("duration_phrase", "half an hour"), vec![d(30, 30, false)]);
    }

    #[test]
    fn frequency_expressions() {
        assert_eq!(
            values("frequency_count", "Train 3x per week"),
            vec![MarkerValue::Frequency { per_week: 3 }]
        );
        assert_eq!(
            values("frequency_count", "four times a week"),
            vec![MarkerValue::Frequency { per_week: 4 }]
        );
        assert_eq!(
            values("frequency_word", "twice weekly"),
            vec![MarkerValue::Frequency { per_week: 2 }]
        );
    }

    #[test]
    fn clock_times() {
        assert_eq!(
            values("time_clock", "Start 6:30 pm, finish 18h45"),
            vec![
                MarkerValue::Time { hour: 18, minute: 30 },
                MarkerValue::Time { hour: 18, minute: 45 },
            ]
        );
        assert_eq!(
            values("time_meridiem", "at 7am"),
            vec![MarkerValue::Time { hour: 7, minute: 0 }]
        );
    }

    #[test]
    fn parse_spelled_numbers() {
        assert_eq!(parse_number("forty-five"), Some(45.0));
        assert_eq!(parse_number("twenty one"), Some(21.0));
        assert_eq!(parse_number("1,5"), Some(1.5));
        assert_eq!(parse_number("an"), Some(1.0));
        assert_eq!(parse_number("eleven five"), None);
    }

    #[test]
    fn markers_carry_line_numbers() {
        let markers = rule("week_number").detect("intro\nWeek 1\n\nWeek 2");
        assert_eq!(markers[0].line, 1);
        assert_eq!(markers[1].line, 3);
        assert_eq!(markers[1].key, "week:2");
    }
}
