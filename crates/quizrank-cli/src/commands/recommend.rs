//! The `quizrank recommend` command.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Table};

use quizrank_core::insights::recommend;
use quizrank_core::model::DEFAULT_RATING;

use super::open_store;

pub fn execute(
    course: String,
    student: String,
    tag: Option<String>,
    count: usize,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(count >= 1, "count must be at least 1");
    let (_config, store) = open_store(config_path)?;

    let rating = store
        .students(&course)
        .into_iter()
        .find(|s| s.student_id == student)
        .map(|s| s.rating)
        .unwrap_or(DEFAULT_RATING);
    let solved: HashSet<String> = store
        .attempts_for(&course, &student)
        .into_iter()
        .map(|a| a.quiz_id)
        .collect();
    let questions = store.questions(&course);

    let picks = recommend(rating, &questions, &solved, tag.as_deref(), count);
    if picks.is_empty() {
        println!("No unsolved quizzes to recommend.");
        return Ok(());
    }

    println!("Student {student} (rating {rating:.0}), {} solved", solved.len());
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Quiz", "Title", "Types", "Rating"]);
    for pick in picks {
        table.add_row(vec![
            pick.quiz_id,
            pick.title,
            pick.types.join(", "),
            format!("{:.0}", pick.rating),
        ]);
    }
    println!("{table}");
    Ok(())
}
