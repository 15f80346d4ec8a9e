//! The `quizrank ranking` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Table};

use quizrank_core::insights::leaderboard;

use super::open_store;

pub fn execute(course: String, limit: usize, config_path: Option<PathBuf>) -> Result<()> {
    let (_config, store) = open_store(config_path)?;
    let students = store.students(&course);
    if students.is_empty() {
        println!("No students recorded for course {course}.");
        return Ok(());
    }

    let course_name = store
        .course(&course)
        .map(|c| c.name)
        .unwrap_or_else(|| format!("Course {course}"));
    println!("{course_name}");

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Student", "Name", "Rating", "Attempts"]);
    for standing in leaderboard(&students).into_iter().take(limit) {
        table.add_row(vec![
            standing.position.to_string(),
            standing.student_id,
            standing.name,
            format!("{:.0}", standing.rating),
            standing.attempt_count.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
