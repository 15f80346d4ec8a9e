//! The `quizrank parse-title` command.

use anyhow::Result;

use quizrank_core::parser::parse_quiz_title;

pub fn execute(title: &str) -> Result<()> {
    let parsed = parse_quiz_title(title)
        .map_err(|e| anyhow::anyhow!("quiz would be excluded: {e}"))?;

    println!("Types:      {}", parsed.types.join(", "));
    println!("Lesson:     {}", parsed.lesson.as_deref().unwrap_or("-"));
    println!(
        "Difficulty: {}",
        parsed.difficulty.map_or_else(|| "-".to_string(), |d| d.to_string())
    );
    println!(
        "Class:      {}",
        parsed.class.map_or_else(|| "-".to_string(), |c| c.to_string())
    );
    Ok(())
}
