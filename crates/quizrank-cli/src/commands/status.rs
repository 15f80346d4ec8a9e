//! The `quizrank status` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Table};

use super::open_store;

pub fn execute(course: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let (_config, store) = open_store(config_path)?;

    let courses: Vec<_> = store
        .courses()
        .into_iter()
        .filter(|c| course.as_ref().map_or(true, |id| &c.id == id))
        .collect();
    if courses.is_empty() {
        println!("No courses synced yet. Run `quizrank sync` first.");
        return Ok(());
    }

    let watermarks = store.watermarks();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Course", "Name", "Students", "Quizzes", "Attempts", "Last sync",
    ]);
    for c in &courses {
        let last_sync = watermarks
            .iter()
            .find(|w| w.course_id == c.id)
            .map(|w| w.synced_at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        table.add_row(vec![
            c.id.clone(),
            c.name.clone(),
            store.students(&c.id).len().to_string(),
            store.questions(&c.id).len().to_string(),
            store.attempt_count(&c.id).to_string(),
            last_sync,
        ]);
    }
    println!("{table}");
    Ok(())
}
