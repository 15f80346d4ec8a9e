//! The `quizrank student` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Table};

use quizrank_core::insights::student_details;

use super::open_store;

pub fn execute(course: String, student: String, config_path: Option<PathBuf>) -> Result<()> {
    let (_config, store) = open_store(config_path)?;
    let record = store
        .students(&course)
        .into_iter()
        .find(|s| s.student_id == student)
        .with_context(|| format!("student {student} not found in course {course}"))?;
    let details = student_details(
        &record,
        &store.attempts_for(&course, &student),
        &store.questions(&course),
    );

    let course_name = store
        .course(&course)
        .map(|c| c.name)
        .unwrap_or_else(|| format!("Course {course}"));
    let name = if details.name.is_empty() {
        "(unknown name)"
    } else {
        details.name.as_str()
    };
    println!("{name} ({}) in {course_name}", details.student_id);
    println!(
        "Rating {:.0} (min {:.0}, max {:.0}), {} attempt(s)",
        details.rating, details.min_rating, details.max_rating, details.attempt_count
    );

    if details.history.is_empty() {
        println!("No attempts recorded yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Submitted", "Quiz", "Title", "Accuracy", "Change", "Rating"]);
    for entry in details.history {
        table.add_row(vec![
            entry.submitted_at.format("%Y-%m-%d %H:%M").to_string(),
            entry.quiz_id,
            entry.title,
            format!("{:.0}%", entry.accuracy * 100.0),
            format!("{:+.0}", entry.rating_change),
            format!("{:.0}", entry.rating_after),
        ]);
    }
    println!("{table}");
    Ok(())
}
