//! The `quizrank problems` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Table};

use quizrank_core::insights::problem_list;

use super::open_store;

pub fn execute(course: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let (_config, store) = open_store(config_path)?;
    let questions: Vec<_> = match &course {
        Some(id) => store.questions(id),
        None => store
            .courses()
            .iter()
            .flat_map(|c| store.questions(&c.id))
            .collect(),
    };
    if questions.is_empty() {
        println!("No quizzes recorded yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Course", "Quiz", "Title", "Types", "Rating", "Submissions"]);
    for q in problem_list(&questions) {
        table.add_row(vec![
            q.course_id,
            q.quiz_id,
            q.title,
            q.types.join(", "),
            format!("{:.0}", q.rating),
            q.submission_count.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
