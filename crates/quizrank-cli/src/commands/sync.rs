//! The `quizrank sync` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use quizrank_canvas::config::{create_client, QuizrankConfig};
use quizrank_core::engine::{SyncConfig, SyncEngine, SyncObserver, SyncPhase};
use quizrank_core::error::{SyncError, TitleError};
use quizrank_core::model::{Attempt, QuizMeta};
use quizrank_core::report::{CourseReport, SyncSummary};
use quizrank_store::MemoryStore;

use super::open_store;

/// Console progress observer.
pub(crate) struct ConsoleObserver;

impl SyncObserver for ConsoleObserver {
    fn on_phase(&self, course_id: &str, phase: SyncPhase) {
        if !matches!(phase, SyncPhase::Idle | SyncPhase::Aborted) {
            eprintln!("  [{course_id}] {phase}");
        }
    }

    fn on_quiz_excluded(&self, course_id: &str, quiz: &QuizMeta, reason: &TitleError) {
        eprintln!("  [{course_id}] skipping quiz {} \"{}\": {reason}", quiz.id, quiz.title);
    }

    fn on_attempt_recorded(&self, _attempt: &Attempt) {}

    fn on_course_complete(&self, report: &CourseReport) {
        eprintln!(
            "  [{}] done: {} recorded, {} skipped, {} quiz(zes) excluded ({}ms)",
            report.course_id,
            report.attempts_recorded,
            report.skipped.total(),
            report.quizzes_excluded,
            report.duration_ms,
        );
    }

    fn on_course_failed(&self, course_id: &str, error: &SyncError) {
        eprintln!("  [{course_id}] FAILED: {error}");
    }
}

/// Build an engine over the configured Canvas instance and `store`.
pub(crate) fn build_engine(
    config: &QuizrankConfig,
    store: Arc<MemoryStore>,
    sync_config: SyncConfig,
) -> Result<SyncEngine> {
    let client = create_client(config)?;
    Ok(SyncEngine::new(Arc::new(client), store, sync_config).with_observer(Arc::new(ConsoleObserver)))
}

pub(crate) fn save_store(config: &QuizrankConfig, store: &MemoryStore) -> Result<()> {
    store
        .save(&config.store_path)
        .with_context(|| format!("failed to save store {}", config.store_path.display()))
}

pub(crate) fn print_summary(summary: &SyncSummary) {
    println!("{}", summary.message);
}

pub async fn execute(
    course: Option<String>,
    full: bool,
    json: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (config, store) = open_store(config_path)?;
    let store = Arc::new(store);
    let sync_config = SyncConfig {
        full_resync: full,
        ..config.sync_config()
    };
    let engine = build_engine(&config, Arc::clone(&store), sync_config)?;

    match course {
        Some(course_id) => {
            let result = engine.sync_course(&course_id).await;
            save_store(&config, &store)?;
            let report = result.with_context(|| format!("sync of course {course_id} failed"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Course {} ({}): {} attempt(s) recorded, {} submission(s) skipped, {} new student(s).",
                    report.course_id,
                    report.course_name,
                    report.attempts_recorded,
                    report.skipped.total(),
                    report.new_students,
                );
            }
            Ok(())
        }
        None => {
            let summary = engine.sync_all_courses().await;
            save_store(&config, &store)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
            anyhow::ensure!(summary.success, "one or more courses failed to sync");
            Ok(())
        }
    }
}
