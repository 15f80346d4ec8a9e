//! The `quizrank init` command.

use anyhow::Result;

use quizrank_canvas::config::CONFIG_FILE_NAME;

pub fn execute() -> Result<()> {
    if std::path::Path::new(CONFIG_FILE_NAME).exists() {
        println!("{CONFIG_FILE_NAME} already exists, skipping.");
    } else {
        std::fs::write(CONFIG_FILE_NAME, SAMPLE_CONFIG)?;
        println!("Created {CONFIG_FILE_NAME}");
    }

    println!("\nNext steps:");
    println!("  1. Export CANVAS_ACCESS_TOKEN or edit {CONFIG_FILE_NAME}");
    println!("  2. Check a title: quizrank parse-title \"[READING] Unit 3 <8.5> (9)\"");
    println!("  3. Run: quizrank sync");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# quizrank configuration

store_path = "./quizrank-data/store.json"

[canvas]
base_url = "https://canvas.example.edu"
access_token = "${CANVAS_ACCESS_TOKEN}"
per_page = 100
timeout_secs = 30

[sync]
concurrency = 5
max_retries = 3
retry_delay_ms = 1000
call_timeout_secs = 120
# Empty syncs every course the token can see.
courses = []
# Pause between runs of `quizrank watch`.
interval_secs = 2700
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_parses() {
        let config = quizrank_canvas::config::parse_config(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.sync.concurrency, 5);
        assert_eq!(config.canvas.base_url, "https://canvas.example.edu");
    }
}
