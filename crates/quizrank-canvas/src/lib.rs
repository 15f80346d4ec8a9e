//! quizrank-canvas: Canvas LMS integration.
//!
//! Implements the `LmsClient` trait against the Canvas REST API, loads the
//! `quizrank.toml` configuration, and ships an in-memory mock LMS for tests.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;

pub use client::CanvasClient;
pub use config::{create_client, load_config, load_config_from, CanvasConfig, QuizrankConfig};
pub use error::ApiError;
