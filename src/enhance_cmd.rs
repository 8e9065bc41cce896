//! `plan enhance`: enrich the sessions of a stored plan.
//!
//! Records are printed, not persisted; the plan itself is never modified.

use std::sync::Arc;

use anyhow::{bail, Result};

use plan_harness_core::models::{AgeGroup, AthleteProfile, EnhancementRecord, SessionRecord};
use plan_harness_core::store::KvStore;

use crate::config::Config;
use crate::enhance::{Orchestrator, Policy};
use crate::plans::find_plan;
use crate::repository::Repository;
use crate::sqlite_store::SqliteKvStore;

pub struct EnhanceOptions {
    pub week: Option<u32>,
    pub session: Option<String>,
    pub policy: Option<String>,
    pub age_group: Option<String>,
    pub json: bool,
}

pub async fn run_enhance(config: &Config, plan_id: &str, options: EnhanceOptions) -> Result<()> {
    let store: Arc<dyn KvStore> = Arc::new(SqliteKvStore::connect(config).await?);
    let repo = Repository::new(store);
    let plan = find_plan(&repo, plan_id, None).await?;

    let mut profile = AthleteProfile::for_plan(&plan);
    if let Some(name) = &options.age_group {
        match AgeGroup::parse(name) {
            Some(group) => profile.age_group = Some(group),
            None => bail!(
                "Unknown age group: '{}'. Available: youth, teen, adult, masters",
                name
            ),
        }
    }

    let sessions: Vec<SessionRecord> = plan
        .weeks
        .iter()
        .filter(|w| options.week.map_or(true, |n| w.week_number == n))
        .flat_map(|w| w.daily_sessions.iter())
        .filter(|s| options.session.as_deref().map_or(true, |id| s.id == id))
        .cloned()
        .collect();
    if sessions.is_empty() {
        bail!("No matching sessions in plan {}", plan_id);
    }

    let mut orchestrator = Orchestrator::from_config(&config.enhancement)?;
    if let Some(name) = &options.policy {
        match Policy::parse(name) {
            Some(policy) => orchestrator.set_policy(policy),
            None => bail!(
                "Unknown enhancement policy: '{}'. Must be local-first, remote-first, or balanced.",
                name
            ),
        }
    }
    let caps = orchestrator.init().await;
    let records = orchestrator.enhance_sessions(&sessions, &profile).await;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    println!("enhance {} ({})", plan.title, plan.id);
    println!(
        "  tiers: local={} remote={} policy={}",
        caps.local,
        caps.remote,
        orchestrator.policy().as_str()
    );
    for record in &records {
        print_record(record);
    }
    println!("ok");
    Ok(())
}

fn print_record(record: &EnhancementRecord) {
    let e = &record.enhanced_session;
    println!();
    println!(
        "[{}] {} min  source={}  confidence={:.2}  intensity={}",
        record.original_session.id,
        record.original_session.duration,
        record.source.as_str(),
        record.confidence,
        e.intensity
    );
    println!("  objectives:");
    for o in &e.objectives {
        println!("    - {}", o);
    }
    println!("  warm-up: {}", e.warm_up.join("; "));
    println!("  drills:");
    for d in &e.drills {
        println!("    - {} ({} min): {}", d.name, d.minutes, d.description);
    }
    println!("  coaching points: {}", e.coaching_points.join("; "));
    println!("  cool-down: {}", e.cool_down.join("; "));
    println!("  equipment: {}", e.equipment.join(", "));
    for i in &record.improvements {
        println!("  + {}", i);
    }
}
