//! The `quizrank watch` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use super::open_store;
use super::sync::{build_engine, print_summary, save_store};

pub async fn execute(interval_secs: Option<u64>, config_path: Option<PathBuf>) -> Result<()> {
    let (config, store) = open_store(config_path)?;
    let interval = Duration::from_secs(interval_secs.unwrap_or(config.sync.interval_secs).max(1));
    let store = Arc::new(store);
    let engine = build_engine(&config, Arc::clone(&store), config.sync_config())?;

    eprintln!(
        "Watching {} course(s) every {}s. Press Ctrl-C to stop.",
        if config.sync.courses.is_empty() {
            "all".to_string()
        } else {
            config.sync.courses.len().to_string()
        },
        interval.as_secs()
    );

    loop {
        let summary = engine.sync_all_courses().await;
        print_summary(&summary);
        if let Err(e) = save_store(&config, &store) {
            warn!("{e:#}");
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping watch");
                break;
            }
        }
    }
    Ok(())
}
