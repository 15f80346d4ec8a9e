//! quizrank-core: Rating engine, quiz title parser, and sync orchestrator.
//!
//! This crate defines the data model, the LMS client and persistence
//! gateway traits, and the engine that turns quiz submissions into dual
//! ELO ratings for students and questions.

pub mod engine;
pub mod error;
pub mod insights;
pub mod model;
pub mod parser;
pub mod rating;
pub mod report;
pub mod traits;
