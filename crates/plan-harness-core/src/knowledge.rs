//! Read-only coaching lookup tables.
//!
//! Sport profiles, age guidance and difficulty guidance feed both the
//! rule-based generator and the prompts sent to inference tiers, so the
//! two produce content from the same vocabulary.

use crate::models::{AgeGroup, Difficulty};

#[derive(Debug, Clone, Copy)]
pub struct DrillTemplate {
    pub name: &'static str,
    /// Focus keyword this drill serves ("passing", "endurance", ...).
    pub focus: &'static str,
    pub minutes: u32,
    pub min_difficulty: Difficulty,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct SportProfile {
    pub sport: &'static str,
    pub objectives: &'static [&'static str],
    pub warm_ups: &'static [&'static str],
    pub drills: &'static [DrillTemplate],
    pub coaching_points: &'static [&'static str],
    pub cool_downs: &'static [&'static str],
    pub equipment: &'static [&'static str],
}

#[derive(Debug)]
pub struct AgeGuidance {
    pub group: AgeGroup,
    /// Longest session recommended for the group, in minutes.
    pub max_session_minutes: u32,
    pub notes: &'static [&'static str],
}

const fn drill(
    name: &'static str,
    focus: &'static str,
    minutes: u32,
    min_difficulty: Difficulty,
    description: &'static str,
) -> DrillTemplate {
    DrillTemplate {
        name,
        focus,
        minutes,
        min_difficulty,
        description,
    }
}

use Difficulty::{Advanced, Beginner, Intermediate};

static SOCCER: SportProfile = SportProfile {
    sport: "soccer",
    objectives: &[
        "Improve first touch under pressure",
        "Build passing combinations in tight spaces",
        "Reinforce defensive shape and communication",
        "Increase finishing accuracy",
    ],
    warm_ups: &[
        "Dynamic stretching with leg swings and hip openers",
        "Rondo 5v2 at low intensity",
        "Ball mastery: toe taps, sole rolls, inside-outside touches",
    ],
    drills: &[
        drill("Passing triangles", "passing", 15, Beginner, "Three cones, two-touch passing, rotate after each pass."),
        drill("1v1 channel duels", "dribbling", 15, Beginner, "Attacker beats defender in a 10m channel to score on a line."),
        drill("Rondo 4v2", "possession", 12, Intermediate, "Keep possession in a 12x12 grid; defenders swap on interception."),
        drill("Finishing waves", "shooting", 15, Intermediate, "Lay-off and strike in waves of three from the edge of the box."),
        drill("Small-sided game 4v4", "tactics", 20, Beginner, "Free play with two small goals per side."),
        drill("Pressing triggers", "defending", 15, Advanced, "Front three press on a back pass cue; rotate lines."),
    ],
    coaching_points: &[
        "Open body shape before receiving",
        "Scan over the shoulder before the ball arrives",
        "Pass with the inside of the foot, ankle locked",
        "Communicate early: name, direction, pressure",
    ],
    cool_downs: &[
        "Light jog and static stretches for hamstrings and quads",
        "Partner stretching and breathing reset",
    ],
    equipment: &["Balls", "Cones", "Bibs", "Small goals"],
};

static BASKETBALL: SportProfile = SportProfile {
    sport: "basketball",
    objectives: &[
        "Sharpen ball handling with both hands",
        "Improve shooting form and rhythm",
        "Execute help-side defensive rotations",
    ],
    warm_ups: &[
        "Full-court dynamic warm-up: skips, carioca, backpedal",
        "Two-ball stationary dribbling",
        "Form shooting close to the rim",
    ],
    drills: &[
        drill("Mikan drill", "finishing", 8, Beginner, "Alternate layups on each side of the rim without the ball touching the floor."),
        drill("Cone dribble weave", "ball handling", 10, Beginner, "Crossovers and between-the-legs through a cone line."),
        drill("Spot shooting", "shooting", 15, Intermediate, "Five spots, five makes each, track percentage."),
        drill("Shell defense", "defense", 15, Intermediate, "4v4 ball reversal with help and recover rotations."),
        drill("3v2 fast break", "transition", 12, Advanced, "Continuous transition play, defenders become attackers."),
    ],
    coaching_points: &[
        "Eyes up while dribbling",
        "Elbow under the ball, follow through",
        "Stay low in a defensive stance, see man and ball",
    ],
    cool_downs: &["Free throws at rest pace", "Static stretches for calves and hips"],
    equipment: &["Basketballs", "Cones", "Hoop", "Pinnies"],
};

static TENNIS: SportProfile = SportProfile {
    sport: "tennis",
    objectives: &[
        "Consistent topspin forehand cross-court",
        "Reliable first-serve placement",
        "Split-step timing at the net",
    ],
    warm_ups: &[
        "Mini tennis from the service line",
        "Lateral shuffles and split-step reactions",
    ],
    drills: &[
        drill("Cross-court rally", "forehand", 15, Beginner, "Rally cross-court aiming past the service line."),
        drill("Serve targets", "serve", 15, Beginner, "Serve to cones placed in the corners of the box."),
        drill("Volley ladder", "volley", 10, Intermediate, "Feed-volley progression moving from service line to net."),
        drill("Approach and pass", "transition", 15, Advanced, "Approach shot then defend against a passing shot."),
    ],
    coaching_points: &[
        "Early unit turn",
        "Contact the ball in front of the body",
        "Recover to the centre after every shot",
    ],
    cool_downs: &["Easy baseline rally", "Shoulder and forearm stretches"],
    equipment: &["Racquets", "Balls", "Cones", "Ball basket"],
};

static SWIMMING: SportProfile = SportProfile {
    sport: "swimming",
    objectives: &[
        "Efficient freestyle catch",
        "Steady aerobic pacing",
        "Clean turns and streamline off the wall",
    ],
    warm_ups: &["200 easy freestyle", "4x50 drill-swim by 25"],
    drills: &[
        drill("Catch-up freestyle", "technique", 10, Beginner, "One arm waits at full extension until the other arrives."),
        drill("Kick sets with board", "kick", 10, Beginner, "6x50 kick on 1:15 holding steady tempo."),
        drill("Aerobic main set", "endurance", 25, Intermediate, "8x100 on a send-off that leaves 10-15s rest."),
        drill("Race-pace 50s", "speed", 15, Advanced, "12x50 at target race pace, full recovery."),
    ],
    coaching_points: &[
        "Long body line, head neutral",
        "High elbow during the catch",
        "Exhale steadily underwater",
    ],
    cool_downs: &["200 easy choice stroke", "Stretch lats and shoulders"],
    equipment: &["Kickboard", "Pull buoy", "Fins", "Pace clock"],
};

static RUNNING: SportProfile = SportProfile {
    sport: "running",
    objectives: &[
        "Build aerobic base",
        "Improve running economy",
        "Practise race pacing",
    ],
    warm_ups: &[
        "10 minutes easy jog",
        "Drills: A-skips, B-skips, high knees, butt kicks",
        "4 strides of 80m",
    ],
    drills: &[
        drill("Easy run", "endurance", 30, Beginner, "Conversational pace, nose-breathing effort."),
        drill("Hill repeats", "strength", 20, Intermediate, "6x60s uphill at hard effort, jog down recovery."),
        drill("Tempo block", "threshold", 20, Intermediate, "Comfortably hard continuous effort."),
        drill("Track intervals", "speed", 25, Advanced, "6x800m at 5K pace with 2 minutes jog."),
    ],
    coaching_points: &[
        "Quick light cadence",
        "Relaxed shoulders and hands",
        "Land under the hips",
    ],
    cool_downs: &["10 minutes easy jog", "Calf, hamstring and hip-flexor stretches"],
    equipment: &["Running shoes", "Watch", "Cones for markers"],
};

static FITNESS: SportProfile = SportProfile {
    sport: "fitness",
    objectives: &[
        "Build general strength",
        "Improve work capacity",
        "Reinforce movement quality",
    ],
    warm_ups: &[
        "5 minutes rowing or bike",
        "Mobility flow: world's greatest stretch, cat-cow, hip circles",
    ],
    drills: &[
        drill("Goblet squat", "strength", 10, Beginner, "3x10 with controlled tempo."),
        drill("Push-up ladder", "strength", 8, Beginner, "Ascending ladder 1-5, rest as needed."),
        drill("Kettlebell circuit", "conditioning", 15, Intermediate, "Swings, rows and presses, 40s on 20s off."),
        drill("Barbell complex", "power", 15, Advanced, "Deadlift, clean, front squat, press without setting the bar down."),
    ],
    coaching_points: &[
        "Brace the core before each rep",
        "Full range of motion over load",
        "Breathe out on effort",
    ],
    cool_downs: &["Foam rolling", "Box breathing for two minutes"],
    equipment: &["Kettlebells", "Dumbbells", "Mats", "Timer"],
};

static GENERAL: SportProfile = SportProfile {
    sport: "general",
    objectives: &[
        "Develop core skills for the session focus",
        "Build fitness progressively",
        "Keep athletes engaged and safe",
    ],
    warm_ups: &[
        "Light aerobic activity for 5-10 minutes",
        "Dynamic mobility for major joints",
    ],
    drills: &[
        drill("Skill station rotation", "technique", 15, Beginner, "Three stations, five minutes each."),
        drill("Conditioning circuit", "conditioning", 15, Beginner, "Bodyweight circuit, 30s on 30s off."),
        drill("Game-based practice", "tactics", 20, Intermediate, "Small-sided game applying the session theme."),
        drill("Pressure scenarios", "decision making", 15, Advanced, "Timed scenarios with a scoring constraint."),
    ],
    coaching_points: &[
        "Quality before speed",
        "Give one cue at a time",
        "Check understanding with questions",
    ],
    cool_downs: &["Easy movement and static stretching", "Short reflection on the session"],
    equipment: &["Cones", "Timer", "Water"],
};

static PROFILES: [&SportProfile; 7] = [
    &SOCCER,
    &BASKETBALL,
    &TENNIS,
    &SWIMMING,
    &RUNNING,
    &FITNESS,
    &GENERAL,
];

static AGE_GUIDANCE: [AgeGuidance; 4] = [
    AgeGuidance {
        group: AgeGroup::Youth,
        max_session_minutes: 60,
        notes: &[
            "Keep explanations short and activities game-based",
            "Frequent water breaks",
        ],
    },
    AgeGuidance {
        group: AgeGroup::Teen,
        max_session_minutes: 90,
        notes: &["Introduce structured technical blocks", "Monitor growth-related load"],
    },
    AgeGuidance {
        group: AgeGroup::Adult,
        max_session_minutes: 120,
        notes: &["Match load to the weekly schedule"],
    },
    AgeGuidance {
        group: AgeGroup::Masters,
        max_session_minutes: 90,
        notes: &[
            "Extend the warm-up",
            "Favour low-impact conditioning",
        ],
    },
];

/// Profile for a sport, falling back to the general profile.
pub fn sport_profile(sport: &str) -> &'static SportProfile {
    let sport = sport.trim().to_lowercase();
    PROFILES
        .iter()
        .copied()
        .find(|p| p.sport == sport)
        .unwrap_or(&GENERAL)
}

pub fn age_guidance(group: AgeGroup) -> &'static AgeGuidance {
    AGE_GUIDANCE
        .iter()
        .find(|g| g.group == group)
        .unwrap_or(&AGE_GUIDANCE[2])
}

/// Intensity label for a difficulty, toned down for youth and masters.
pub fn intensity_for(difficulty: Difficulty, age: Option<AgeGroup>) -> &'static str {
    let base = match difficulty {
        Beginner => 0,
        Intermediate => 1,
        Advanced => 2,
    };
    let level = match age {
        Some(AgeGroup::Youth) | Some(AgeGroup::Masters) => base.min(1),
        _ => base,
    };
    match level {
        0 => "low",
        1 => "moderate",
        _ => "high",
    }
}

/// Drills suitable for a difficulty, preferring ones whose focus matches.
pub fn drills_for(
    profile: &'static SportProfile,
    difficulty: Difficulty,
    focus: &[String],
) -> Vec<&'static DrillTemplate> {
    let eligible: Vec<&DrillTemplate> = profile
        .drills
        .iter()
        .filter(|d| d.min_difficulty.rank() <= difficulty.rank())
        .collect();
    let (mut matching, rest): (Vec<_>, Vec<_>) = eligible.into_iter().partition(|d| {
        focus
            .iter()
            .any(|f| f.eq_ignore_ascii_case(d.focus) || d.focus.contains(f.as_str()))
    });
    matching.extend(rest);
    matching
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sport_uses_general() {
        assert_eq!(sport_profile("curling").sport, "general");
        assert_eq!(sport_profile("Soccer").sport, "soccer");
    }

    #[test]
    fn every_profile_has_content() {
        for p in PROFILES {
            assert!(!p.objectives.is_empty());
            assert!(!p.warm_ups.is_empty());
            assert!(p.drills.iter().any(|d| d.min_difficulty == Beginner));
            assert!(!p.coaching_points.is_empty());
            assert!(!p.cool_downs.is_empty());
            assert!(!p.equipment.is_empty());
        }
    }

    #[test]
    fn beginner_drills_exclude_advanced() {
        let drills = drills_for(sport_profile("soccer"), Beginner, &[]);
        assert!(drills.iter().all(|d| d.min_difficulty == Beginner));
    }

    #[test]
    fn focus_matches_first() {
        let drills = drills_for(sport_profile("soccer"), Advanced, &["shooting".to_string()]);
        assert_eq!(drills[0].name, "Finishing waves");
    }

    #[test]
    fn youth_intensity_capped() {
        assert_eq!(intensity_for(Advanced, Some(AgeGroup::Youth)), "moderate");
        assert_eq!(intensity_for(Advanced, None), "high");
    }
}
