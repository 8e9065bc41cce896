//! Listing and showing stored training plans.
//!
//! Used by `plan plans` and `plan show`.

use std::sync::Arc;

use anyhow::{bail, Result};

use plan_harness_core::models::TrainingPlan;
use plan_harness_core::store::KvStore;

use crate::config::Config;
use crate::repository::Repository;
use crate::sqlite_store::SqliteKvStore;

async fn repository(config: &Config) -> Result<Repository> {
    let store: Arc<dyn KvStore> = Arc::new(SqliteKvStore::connect(config).await?);
    Ok(Repository::new(store))
}

/// Latest version of a plan, or a specific version.
pub async fn find_plan(repo: &Repository, plan_id: &str, version: Option<u32>) -> Result<TrainingPlan> {
    let versions = repo.plan_versions(plan_id).await?;
    let found = match version {
        Some(v) => versions.into_iter().find(|p| p.version == v),
        None => versions.into_iter().last(),
    };
    match found {
        Some(plan) => Ok(plan),
        None => match version {
            Some(v) => bail!("plan not found: {} (version {})", plan_id, v),
            None => bail!("plan not found: {}", plan_id),
        },
    }
}

pub async fn run_plans(config: &Config) -> Result<()> {
    let repo = repository(config).await?;
    let plans = repo.latest_plans().await?;
    if plans.is_empty() {
        println!("No plans yet. Ingest a document with `plan ingest <file>`.");
        return Ok(());
    }
    println!(
        "{:<36}  {:>3}  {:<12}  {:<12}  {:>5}  {:>8}  TITLE",
        "ID", "VER", "CATEGORY", "DIFFICULTY", "WEEKS", "SESSIONS"
    );
    for plan in &plans {
        println!(
            "{:<36}  {:>3}  {:<12}  {:<12}  {:>5}  {:>8}  {}",
            plan.id,
            plan.version,
            plan.category,
            plan.difficulty.as_str(),
            plan.duration,
            plan.sessions_count,
            plan.title
        );
    }
    Ok(())
}

pub fn render_plan(plan: &TrainingPlan) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", plan.title));
    out.push_str(&format!("  id: {} (version {})\n", plan.id, plan.version));
    out.push_str(&format!("  source document: {}\n", plan.source_document));
    out.push_str(&format!(
        "  {} · {} · {} weeks · {} sessions\n",
        plan.category,
        plan.difficulty.as_str(),
        plan.duration,
        plan.sessions_count
    ));
    if let Some(group) = plan.age_group {
        out.push_str(&format!("  age group: {}\n", group.as_str()));
    }
    if plan.schedule.sessions_per_week.is_some() || !plan.schedule.days.is_empty() {
        let per_week = plan
            .schedule
            .sessions_per_week
            .map(|n| format!("{n}x per week"))
            .unwrap_or_default();
        out.push_str(&format!(
            "  schedule: {} {}\n",
            per_week,
            plan.schedule.days.join(", ")
        ));
    }
    out.push_str(&format!("  tags: {}\n", plan.tags.join(", ")));
    out.push_str(&format!(
        "  organization: {} (confidence {:.2})\n",
        plan.organization_level.as_str(),
        plan.confidence
    ));
    for week in &plan.weeks {
        out.push_str(&format!("\n{}\n", week.title));
        for session in &week.daily_sessions {
            let when: Vec<&str> = [session.date.as_deref(), session.time.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            out.push_str(&format!(
                "  [{}] {} {} min",
                session.id,
                if when.is_empty() { "-".to_string() } else { when.join(" ") },
                session.duration
            ));
            if !session.focus.is_empty() {
                out.push_str(&format!("  focus: {}", session.focus.join(", ")));
            }
            out.push('\n');
        }
    }
    out
}

pub async fn run_show(config: &Config, plan_id: &str, version: Option<u32>, json: bool) -> Result<()> {
    let repo = repository(config).await?;
    let plan = find_plan(&repo, plan_id, version).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", render_plan(&plan));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plan_harness_core::models::{
        Difficulty, OrganizationLevel, Schedule, SessionRecord, WeekRecord,
    };
    use plan_harness_core::store::memory::InMemoryStore;

    fn plan(version: u32) -> TrainingPlan {
        TrainingPlan {
            id: "p1".to_string(),
            title: "Spring Soccer".to_string(),
            category: "soccer".to_string(),
            difficulty: Difficulty::Beginner,
            duration: 1,
            sessions_count: 12,
            tags: vec!["soccer".to_string(), "passing".to_string()],
            source_document: "d1".to_string(),
            weeks: vec![WeekRecord {
                week_number: 1,
                title: "Week 1".to_string(),
                daily_sessions: vec![SessionRecord {
                    id: "w1-s1".to_string(),
                    date: Some("Monday".to_string()),
                    time: Some("18:00".to_string()),
                    duration: 45,
                    focus: vec!["passing".to_string()],
                    raw_excerpts: Vec::new(),
                }],
            }],
            version,
            created_at: Utc::now(),
            age_group: None,
            schedule: Schedule {
                sessions_per_week: Some(2),
                days: vec!["Monday".to_string()],
            },
            organization_level: OrganizationLevel::HighlyStructured,
            confidence: 1.0,
        }
    }

    #[test]
    fn render_lists_sessions() {
        let out = render_plan(&plan(1));
        assert!(out.starts_with("Spring Soccer\n"));
        assert!(out.contains("[w1-s1] Monday 18:00 45 min  focus: passing"));
        assert!(out.contains("2x per week Monday"));
    }

    #[tokio::test]
    async fn find_latest_or_specific_version() {
        let repo = Repository::new(Arc::new(InMemoryStore::new()));
        repo.append_plan(&plan(1)).await.unwrap();
        repo.append_plan(&plan(2)).await.unwrap();

        assert_eq!(find_plan(&repo, "p1", None).await.unwrap().version, 2);
        assert_eq!(find_plan(&repo, "p1", Some(1)).await.unwrap().version, 1);
        assert!(find_plan(&repo, "p1", Some(3)).await.is_err());
        assert!(find_plan(&repo, "p9", None).await.is_err());
    }
}
