//! End-to-end tests of the document pipeline against the in-memory store.
//!
//! These run the full register → extract → analyze → assemble → persist
//! flow without touching SQLite.

use std::io::Write;
use std::sync::Arc;

use plan_harness::config::Config;
use plan_harness::extract::{MIME_DOCX, MIME_TEXT, MIME_XLSX};
use plan_harness::ingest::{Pipeline, Upload};
use plan_harness::error::PlanError;
use plan_harness_core::models::{FormatFamily, IntegrityStatus, OrganizationLevel};
use plan_harness_core::store::memory::InMemoryStore;
use plan_harness_core::store::{payload_key, KvStore};
use zip::write::SimpleFileOptions;

const FOUR_WEEKS: &str = "Spring Base Block\n\nWeek 1\nEasy aerobic work\n\nWeek 2\nBuild volume\n\nWeek 3\nHold volume\n\nWeek 4\nRecovery\n";

const STRUCTURED: &str = "Youth Soccer Development Plan\n\
Week 1\n\
Monday: Session 1 - Passing fundamentals, 60 minutes at 17:00\n\
Wednesday: Session 2 - Dribbling, 60 minutes at 17:00\n\
Week 2\n\
Monday: Session 1 - Shooting, 75 minutes at 17:00\n\
Wednesday: Session 2 - Small-sided games, 75 minutes at 17:00\n";

fn pipeline() -> (Pipeline, Arc<InMemoryStore>) {
    pipeline_with(Config::minimal())
}

fn pipeline_with(config: Config) -> (Pipeline, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    (Pipeline::new(&config, store.clone()), store)
}

fn text_upload(name: &str, body: &str) -> Upload {
    Upload {
        bytes: body.as_bytes().to_vec(),
        original_name: name.to_string(),
        declared_type: MIME_TEXT.to_string(),
    }
}

fn xlsx_bytes() -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();
    zip.start_file("[Content_Types].xml", opts).unwrap();
    zip.write_all(b"<Types/>").unwrap();
    zip.start_file("xl/workbook.xml", opts).unwrap();
    zip.write_all(b"<workbook/>").unwrap();
    zip.start_file("xl/worksheets/sheet1.xml", opts).unwrap();
    zip.write_all(
        br#"<worksheet><sheetData><row><c t="inlineStr"><is><t>Week 1</t></is></c></row></sheetData></worksheet>"#,
    )
    .unwrap();
    zip.finish().unwrap().into_inner()
}

#[tokio::test]
async fn four_week_headings_give_basic_structure() {
    let (pipeline, _) = pipeline();
    let outcome = pipeline
        .ingest(&text_upload("block.txt", FOUR_WEEKS))
        .await
        .unwrap();

    assert!(!outcome.fallback);
    assert_eq!(outcome.family, FormatFamily::PlainText);
    assert_eq!(outcome.analysis.week_structure.total_weeks, 4);
    assert_eq!(
        outcome.analysis.organization_level,
        OrganizationLevel::BasicStructure
    );
    assert_eq!(outcome.plan.version, 1);
    assert_eq!(outcome.plan.weeks.len(), 4);
    assert!(outcome.document.processed);
}

#[tokio::test]
async fn structured_document_fills_sessions() {
    let (pipeline, _) = pipeline();
    let outcome = pipeline
        .ingest(&text_upload("soccer.txt", STRUCTURED))
        .await
        .unwrap();

    let plan = &outcome.plan;
    assert_eq!(plan.weeks.len(), 2);
    assert!(plan.session_total() >= 4);
    assert_eq!(plan.sessions_count as usize, plan.session_total());
    assert!(outcome.analysis.organization_level >= OrganizationLevel::ModeratelyStructured);
    assert!((0.0..=1.0).contains(&plan.confidence));

    let cached = pipeline
        .repository()
        .session_cache(&outcome.document.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.len(), plan.session_total());
}

#[tokio::test]
async fn reprocessing_appends_a_new_version() {
    let (pipeline, _) = pipeline();
    let first = pipeline
        .ingest(&text_upload("block.txt", FOUR_WEEKS))
        .await
        .unwrap();

    let (report, second) = pipeline.reprocess(&first.document.id).await.unwrap();
    assert!(report.ready_for_processing);
    assert_eq!(second.plan.id, first.plan.id);
    assert_eq!(second.plan.version, 2);

    let versions = pipeline
        .repository()
        .plan_versions(&first.plan.id)
        .await
        .unwrap();
    assert_eq!(
        versions.iter().map(|p| p.version).collect::<Vec<_>>(),
        vec![1, 2]
    );
    // The first version is left as it was.
    assert_eq!(versions[0], first.plan);
}

#[tokio::test]
async fn zero_byte_upload_still_produces_a_plan() {
    let (pipeline, _) = pipeline();
    let outcome = pipeline
        .ingest(&Upload {
            bytes: Vec::new(),
            original_name: "empty.docx".to_string(),
            declared_type: MIME_DOCX.to_string(),
        })
        .await
        .unwrap();

    assert!(outcome.fallback);
    assert!(matches!(
        outcome.issues.as_slice(),
        [PlanError::EmptyOrCorruptContent(_)]
    ));
    assert_eq!(outcome.plan.version, 1);

    // Fallback text never teaches the pattern library.
    let stored = pipeline
        .patterns()
        .fingerprints(outcome.family)
        .await
        .unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn spreadsheet_declared_as_word_document_is_a_type_mismatch() {
    let (pipeline, _) = pipeline();
    let outcome = pipeline
        .ingest(&Upload {
            bytes: xlsx_bytes(),
            original_name: "plan.xlsx".to_string(),
            declared_type: MIME_DOCX.to_string(),
        })
        .await
        .unwrap();

    assert!(outcome.fallback);
    match outcome.issues.as_slice() {
        [PlanError::UnsupportedFormat(msg)] => assert!(msg.contains("type mismatch"), "{msg}"),
        other => panic!("expected a type mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn matching_spreadsheet_is_decoded() {
    let (pipeline, _) = pipeline();
    let outcome = pipeline
        .ingest(&Upload {
            bytes: xlsx_bytes(),
            original_name: "plan.xlsx".to_string(),
            declared_type: MIME_XLSX.to_string(),
        })
        .await
        .unwrap();

    assert!(!outcome.fallback);
    assert_eq!(outcome.family, FormatFamily::Spreadsheet);
    assert_eq!(outcome.analysis.week_structure.total_weeks, 1);
}

#[tokio::test]
async fn pattern_library_keeps_the_newest_entries() {
    let mut config = Config::minimal();
    config.patterns.max_per_format = 3;
    let (pipeline, _) = pipeline_with(config);

    for i in 0..5 {
        pipeline
            .ingest(&text_upload(&format!("block-{i}.txt"), FOUR_WEEKS))
            .await
            .unwrap();
    }

    let stored = pipeline
        .patterns()
        .fingerprints(FormatFamily::PlainText)
        .await
        .unwrap();
    assert_eq!(stored.len(), 3);
    let hints = pipeline
        .patterns()
        .hints(FormatFamily::PlainText)
        .await
        .unwrap();
    assert_eq!(hints.expected_weeks, Some(4));
}

#[tokio::test]
async fn lost_payload_requires_reupload() {
    let (pipeline, store) = pipeline();
    let outcome = pipeline
        .ingest(&text_upload("block.txt", FOUR_WEEKS))
        .await
        .unwrap();
    store.delete(&payload_key(&outcome.document.id)).await.unwrap();

    let err = pipeline.reprocess(&outcome.document.id).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PlanError>(),
        Some(PlanError::StorageIntegrityFailure(_))
    ));

    let stored = pipeline
        .repository()
        .document(&outcome.document.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.integrity_status, IntegrityStatus::RequiresReupload);
}

#[tokio::test]
async fn independent_documents_process_concurrently() {
    let (pipeline, _) = pipeline();
    let pipeline = Arc::new(pipeline);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline
                    .ingest(&text_upload(&format!("block-{i}.txt"), FOUR_WEEKS))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(pipeline.repository().documents().await.unwrap().len(), 4);
    assert_eq!(pipeline.repository().latest_plans().await.unwrap().len(), 4);
}
