//! Configuration loading and client factory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use quizrank_core::engine::SyncConfig;

use crate::client::{CanvasClient, DEFAULT_PER_PAGE, DEFAULT_TIMEOUT_SECS};

pub const CONFIG_FILE_NAME: &str = "quizrank.toml";

/// Canvas connection settings.
///
/// Note: Custom Debug impl masks the access token to keep it out of logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Root of the Canvas instance, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_access_token")]
    pub access_token: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for CanvasConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &"***")
            .field("per_page", &self.per_page)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: default_access_token(),
            per_page: default_per_page(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Sync engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Max in-flight quizzes, and submissions per quiz.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Max retries on transient API errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Upper bound for one API call in seconds.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Courses to sync. Empty means every course the token can see.
    #[serde(default)]
    pub courses: Vec<String>,
    /// Pause between runs in watch mode.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            call_timeout_secs: default_call_timeout(),
            courses: Vec::new(),
            interval_secs: default_interval(),
        }
    }
}

/// Top-level quizrank configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizrankConfig {
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    /// JSON snapshot of the rating store.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

impl Default for QuizrankConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasConfig::default(),
            sync: SyncSettings::default(),
            store_path: default_store_path(),
        }
    }
}

fn default_base_url() -> String {
    "${CANVAS_BASE_URL}".to_string()
}
fn default_access_token() -> String {
    "${CANVAS_ACCESS_TOKEN}".to_string()
}
fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_concurrency() -> usize {
    5
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_call_timeout() -> u64 {
    120
}
fn default_interval() -> u64 {
    45 * 60
}
fn default_store_path() -> PathBuf {
    PathBuf::from("./quizrank-data/store.json")
}

impl QuizrankConfig {
    /// Check the settings a sync needs.
    pub fn validate(&self) -> Result<()> {
        let url = &self.canvas.base_url;
        if url.is_empty() {
            bail!("canvas.base_url is not set (set it in {CONFIG_FILE_NAME} or QUIZRANK_CANVAS_URL)");
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("canvas.base_url must be an http(s) URL, got '{url}'");
        }
        if url.ends_with('/') {
            bail!("canvas.base_url should not end with a trailing slash");
        }
        if self.canvas.access_token.trim().is_empty() {
            bail!("canvas.access_token is required (set it in {CONFIG_FILE_NAME} or QUIZRANK_CANVAS_TOKEN)");
        }
        if !(1..=100).contains(&self.canvas.per_page) {
            bail!("canvas.per_page must be between 1 and 100, got {}", self.canvas.per_page);
        }
        if self.sync.concurrency == 0 {
            bail!("sync.concurrency must be at least 1");
        }
        Ok(())
    }

    /// Engine settings derived from the `[sync]` table.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            concurrency: self.sync.concurrency,
            max_retries: self.sync.max_retries,
            retry_delay: Duration::from_millis(self.sync.retry_delay_ms),
            call_timeout: Duration::from_secs(self.sync.call_timeout_secs),
            courses: self.sync.courses.clone(),
            ..SyncConfig::default()
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
/// Unset variables resolve to the empty string.
fn resolve_env_vars(s: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + end];
        result.push_str(&lookup(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Apply `QUIZRANK_*` overrides, then resolve `${VAR}` references.
fn finalize(mut config: QuizrankConfig, lookup: impl Fn(&str) -> Option<String>) -> QuizrankConfig {
    if let Some(url) = lookup("QUIZRANK_CANVAS_URL") {
        config.canvas.base_url = url;
    }
    if let Some(token) = lookup("QUIZRANK_CANVAS_TOKEN") {
        config.canvas.access_token = token;
    }
    config.canvas.base_url = resolve_env_vars(&config.canvas.base_url, &lookup);
    config.canvas.access_token = resolve_env_vars(&config.canvas.access_token, &lookup);
    config
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `quizrank.toml` in the current directory
/// 2. `~/.config/quizrank/config.toml`
///
/// Environment variable overrides: `QUIZRANK_CANVAS_URL`, `QUIZRANK_CANVAS_TOKEN`.
pub fn load_config() -> Result<QuizrankConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<QuizrankConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => QuizrankConfig::default(),
    };

    Ok(finalize(config, |name| std::env::var(name).ok()))
}

/// Parse a TOML document without resolving the environment.
pub fn parse_config(content: &str) -> Result<QuizrankConfig> {
    Ok(toml::from_str::<QuizrankConfig>(content)?)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizrank"))
}

/// Validate the configuration and build a Canvas client from it.
pub fn create_client(config: &QuizrankConfig) -> Result<CanvasClient> {
    config.validate()?;
    let canvas = &config.canvas;
    let client = CanvasClient::with_options(
        &canvas.base_url,
        &canvas.access_token,
        canvas.per_page,
        canvas.timeout_secs,
    )?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn valid() -> QuizrankConfig {
        let mut config = QuizrankConfig::default();
        config.canvas.base_url = "https://canvas.example.edu".into();
        config.canvas.access_token = "token".into();
        config
    }

    #[test]
    fn resolve_env_vars_basic() {
        let lookup = env(&[("_QUIZRANK_TEST_VAR", "hello")]);
        assert_eq!(resolve_env_vars("${_QUIZRANK_TEST_VAR}", &lookup), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_QUIZRANK_TEST_VAR}_suffix", &lookup),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${MISSING}", &lookup), "");
        assert_eq!(resolve_env_vars("broken ${oops", &lookup), "broken ${oops");
    }

    #[test]
    fn default_config() {
        let config = QuizrankConfig::default();
        assert_eq!(config.sync.concurrency, 5);
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.sync.interval_secs, 2700);
        assert_eq!(config.canvas.per_page, 100);
        assert_eq!(config.store_path, PathBuf::from("./quizrank-data/store.json"));
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
store_path = "/var/lib/quizrank/store.json"

[canvas]
base_url = "https://canvas.example.edu"
access_token = "${CANVAS_ACCESS_TOKEN}"
per_page = 50

[sync]
concurrency = 8
retry_delay_ms = 250
courses = ["1136", "1137"]
"#;
        let config = finalize(
            parse_config(toml_str).unwrap(),
            env(&[("CANVAS_ACCESS_TOKEN", "from-env")]),
        );
        assert_eq!(config.canvas.access_token, "from-env");
        assert_eq!(config.canvas.per_page, 50);
        assert_eq!(config.canvas.timeout_secs, 30);
        assert_eq!(config.sync.courses, vec!["1136", "1137"]);
        assert_eq!(config.store_path, PathBuf::from("/var/lib/quizrank/store.json"));
        config.validate().unwrap();

        let sync = config.sync_config();
        assert_eq!(sync.concurrency, 8);
        assert_eq!(sync.retry_delay, Duration::from_millis(250));
        assert_eq!(sync.max_retries, 3);
        assert!(!sync.full_resync);
    }

    #[test]
    fn env_overrides_win_over_file() {
        let config = finalize(
            valid(),
            env(&[
                ("QUIZRANK_CANVAS_URL", "https://other.example.edu"),
                ("QUIZRANK_CANVAS_TOKEN", "override"),
            ]),
        );
        assert_eq!(config.canvas.base_url, "https://other.example.edu");
        assert_eq!(config.canvas.access_token, "override");
    }

    #[test]
    fn defaults_read_canvas_env() {
        let config = finalize(
            QuizrankConfig::default(),
            env(&[
                ("CANVAS_BASE_URL", "https://canvas.example.edu"),
                ("CANVAS_ACCESS_TOKEN", "t"),
            ]),
        );
        config.validate().unwrap();

        let unset = finalize(QuizrankConfig::default(), env(&[]));
        assert!(unset.validate().is_err());
    }

    #[test]
    fn validation_rules() {
        valid().validate().unwrap();

        let mut c = valid();
        c.canvas.base_url = "https://canvas.example.edu/".into();
        assert!(c.validate().unwrap_err().to_string().contains("trailing slash"));

        let mut c = valid();
        c.canvas.base_url = "canvas.example.edu".into();
        assert!(c.validate().is_err());

        let mut c = valid();
        c.canvas.access_token = "  ".into();
        assert!(c.validate().unwrap_err().to_string().contains("access_token"));

        let mut c = valid();
        c.canvas.per_page = 0;
        assert!(c.validate().is_err());
        c.canvas.per_page = 101;
        assert!(c.validate().is_err());

        let mut c = valid();
        c.sync.concurrency = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn debug_masks_token() {
        let debug = format!("{:?}", valid());
        assert!(!debug.contains("\"token\""));
        assert!(debug.contains("***"));
    }

    #[test]
    fn missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[canvas]\nbase_url = \"https://canvas.test\"\naccess_token = \"literal\"\n",
        )
        .unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.canvas.per_page, 100);
        assert_eq!(config.sync.concurrency, 5);
    }

    #[test]
    fn create_client_rejects_invalid_config() {
        assert!(create_client(&QuizrankConfig {
            canvas: CanvasConfig {
                base_url: String::new(),
                ..CanvasConfig::default()
            },
            ..QuizrankConfig::default()
        })
        .is_err());
        create_client(&valid()).unwrap();
    }
}
