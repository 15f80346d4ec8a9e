//! Subcommand implementations.

pub mod init;
pub mod parse_title;
pub mod problems;
pub mod ranking;
pub mod recommend;
pub mod status;
pub mod student;
pub mod sync;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};

use quizrank_canvas::config::{load_config_from, QuizrankConfig};
use quizrank_store::MemoryStore;

/// Load the config and open the store it points at.
pub(crate) fn open_store(config_path: Option<PathBuf>) -> Result<(QuizrankConfig, MemoryStore)> {
    let config = load_config_from(config_path.as_deref())?;
    let store = MemoryStore::open(&config.store_path)
        .with_context(|| format!("failed to open store {}", config.store_path.display()))?;
    Ok((config, store))
}
