//! Persistent pattern library.
//!
//! Fingerprints of successful assemblies are kept per format under the
//! `pattern_library` key. Store failures never reach the pipeline: reads
//! degrade to "no hints" and writes are dropped, both with a warning.

use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use plan_harness_core::models::{FormatFamily, PatternFingerprint};
use plan_harness_core::patterns::{append_capped, hints_from, rank, PatternHints, PatternLibraryState};
use plan_harness_core::store::{get_json, put_json, KvStore, PATTERN_LIBRARY_KEY};

use crate::config::{Config, PatternsConfig};
use crate::sqlite_store::SqliteKvStore;

pub struct PatternLibrary {
    store: Arc<dyn KvStore>,
    max_per_format: usize,
    hint_limit: usize,
    write_lock: Mutex<()>,
}

impl PatternLibrary {
    pub fn new(store: Arc<dyn KvStore>, config: &PatternsConfig) -> Self {
        Self {
            store,
            max_per_format: config.max_per_format.max(1),
            hint_limit: config.hint_limit.max(1),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<PatternLibraryState> {
        Ok(get_json(self.store.as_ref(), PATTERN_LIBRARY_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Stored fingerprints for one format, oldest first.
    pub async fn fingerprints(&self, format: FormatFamily) -> Result<Vec<PatternFingerprint>> {
        Ok(self
            .load()
            .await?
            .remove(format.as_str())
            .unwrap_or_default())
    }

    /// Append a fingerprint, evicting the oldest beyond the per-format cap.
    pub async fn record(&self, fingerprint: PatternFingerprint) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut state = self.load().await?;
        let list = state
            .entry(fingerprint.format.as_str().to_string())
            .or_default();
        append_capped(list, fingerprint, self.max_per_format);
        put_json(self.store.as_ref(), PATTERN_LIBRARY_KEY, &state).await
    }

    /// [`record`](Self::record), logging instead of failing.
    pub async fn record_or_warn(&self, fingerprint: PatternFingerprint) {
        let format = fingerprint.format;
        if let Err(e) = self.record(fingerprint).await {
            warn!(format = %format, error = %e, "Pattern library unavailable; fingerprint dropped");
        }
    }

    /// Hints from the best stored fingerprints. Empty when the store is
    /// unavailable or holds nothing for this format.
    pub async fn hints(&self, format: FormatFamily) -> Option<PatternHints> {
        match self.fingerprints(format).await {
            Ok(list) => {
                let hints = hints_from(&rank(&list, self.hint_limit));
                debug!(format = %format, samples = list.len(), "Pattern hints loaded");
                hints
            }
            Err(e) => {
                warn!(format = %format, error = %e, "Pattern library unavailable; continuing without hints");
                None
            }
        }
    }
}

pub async fn run_patterns(config: &Config, format: &str) -> Result<()> {
    let Some(family) = FormatFamily::parse(format) else {
        bail!(
            "Unknown format: '{}'. Available: docx, xlsx, pptx, csv, text, pdf",
            format
        );
    };
    let store: Arc<dyn KvStore> = Arc::new(SqliteKvStore::connect(config).await?);
    let library = PatternLibrary::new(store, &config.patterns);
    let list = library.fingerprints(family).await?;

    println!("patterns {}", family);
    println!("  fingerprints: {}", list.len());
    match library.hints(family).await {
        Some(hints) => {
            let show = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
            println!("  expected weeks: {}", show(hints.expected_weeks));
            println!("  expected sessions: {}", show(hints.expected_sessions));
            println!(
                "  probable level: {}",
                hints.probable_level.map(|l| l.as_str()).unwrap_or("-")
            );
        }
        None => println!("  no hints yet"),
    }
    for fp in rank(&list, list.len()).iter().take(10) {
        println!(
            "  {:.2}  {}  {} weeks  {} sessions  [{}]",
            fp.confidence,
            fp.organization_level.as_str(),
            fp.week_count,
            fp.session_count,
            fp.marker_samples.join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use plan_harness_core::models::OrganizationLevel;
    use plan_harness_core::store::memory::InMemoryStore;

    struct UnavailableStore;

    #[async_trait]
    impl KvStore for UnavailableStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            bail!("store offline")
        }
        async fn put(&self, _key: &str, _value: &str) -> Result<()> {
            bail!("store offline")
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            bail!("store offline")
        }
        async fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>> {
            bail!("store offline")
        }
    }

    fn fp(format: FormatFamily, weeks: u32) -> PatternFingerprint {
        PatternFingerprint {
            format,
            organization_level: OrganizationLevel::ModeratelyStructured,
            week_count: weeks,
            session_count: weeks * 3,
            marker_samples: vec!["Week 1".to_string()],
            confidence: 0.75,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn cap_holds_under_unbounded_inserts() {
        let library = PatternLibrary::new(Arc::new(InMemoryStore::new()), &PatternsConfig::default());
        for i in 0..75 {
            library.record(fp(FormatFamily::PlainText, i)).await.unwrap();
        }
        library.record(fp(FormatFamily::Csv, 6)).await.unwrap();

        let text = library.fingerprints(FormatFamily::PlainText).await.unwrap();
        assert_eq!(text.len(), 50);
        assert_eq!(text[0].week_count, 25);
        assert_eq!(library.fingerprints(FormatFamily::Csv).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hints_are_per_format() {
        let library = PatternLibrary::new(Arc::new(InMemoryStore::new()), &PatternsConfig::default());
        library.record(fp(FormatFamily::Csv, 8)).await.unwrap();

        let hints = library.hints(FormatFamily::Csv).await.unwrap();
        assert_eq!(hints.expected_weeks, Some(8));
        assert!(library.hints(FormatFamily::Pdf).await.is_none());
    }

    #[tokio::test]
    async fn unavailable_store_degrades_silently() {
        let library = PatternLibrary::new(Arc::new(UnavailableStore), &PatternsConfig::default());
        assert!(library.hints(FormatFamily::PlainText).await.is_none());
        library.record_or_warn(fp(FormatFamily::PlainText, 4)).await;
    }
}
