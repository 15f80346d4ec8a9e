//! Core data model types for quizrank.
//!
//! Two families live here: the records the persistence gateway stores
//! (courses, students, questions, attempts, watermarks) and the shapes the
//! LMS client hands back (remote courses, members, quizzes, submissions).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rating every new student and question starts from.
pub const DEFAULT_RATING: f64 = 1500.0;

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// A course as last observed from the LMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    /// When the course metadata was last upserted.
    pub updated_at: DateTime<Utc>,
}

/// A student's standing within one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,
    pub course_id: String,
    pub name: String,
    pub short_name: String,
    pub rating: f64,
    /// Recorded attempts in this course. Doubles as the row version checked
    /// by rating commits.
    #[serde(default)]
    pub attempt_count: u32,
}

/// A rated quiz within one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub quiz_id: String,
    pub course_id: String,
    pub title: String,
    /// Type tags from the title's bracketed prefix. Never empty.
    pub types: Vec<String>,
    #[serde(default)]
    pub lesson: Option<String>,
    #[serde(default)]
    pub difficulty: Option<f64>,
    #[serde(default)]
    pub class: Option<u32>,
    pub rating: f64,
    /// Recorded attempts against this quiz. Only ever incremented.
    #[serde(default)]
    pub submission_count: u32,
}

impl Question {
    pub fn has_type(&self, tag: &str) -> bool {
        self.types.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// One scored, completed submission linking a student to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub course_id: String,
    pub student_id: String,
    pub quiz_id: String,
    /// Submission identifier in the LMS.
    pub submission_id: String,
    pub score: f64,
    pub max_score: f64,
    pub accuracy: f64,
    pub submitted_at: DateTime<Utc>,
    /// Signed change applied to the student's rating.
    pub rating_change: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Per-course marker of the last sync that completed without a fatal error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub course_id: String,
    pub synced_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Upsert payloads
// ---------------------------------------------------------------------------

/// Identity and display fields of a student, as reported by the LMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: String,
    pub course_id: String,
    pub name: String,
    pub short_name: String,
}

/// Quiz metadata derived from the LMS title. Carries no rating state, so
/// upserting it can never reset a question's rating or submission count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionMeta {
    pub quiz_id: String,
    pub course_id: String,
    pub title: String,
    pub types: Vec<String>,
    pub lesson: Option<String>,
    pub difficulty: Option<f64>,
    pub class: Option<u32>,
}

/// Everything a rating commit writes, applied atomically by the gateway.
///
/// `expected_attempt_count` and `expected_submission_count` are the values
/// read before the rating was computed; the gateway reports the commit as
/// stale if either row moved in the meantime.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptCommit {
    pub attempt: Attempt,
    pub new_student_rating: f64,
    pub new_question_rating: f64,
    pub expected_attempt_count: u32,
    pub expected_submission_count: u32,
}

/// Result of a rating commit.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Attempt stored, both ratings and counters updated.
    Recorded(Attempt),
    /// An attempt for this (student, quiz) pair already exists. Nothing written.
    Duplicate,
    /// The student or question changed since it was read. Nothing written.
    Stale,
}

// ---------------------------------------------------------------------------
// LMS shapes
// ---------------------------------------------------------------------------

/// Course metadata as listed by the LMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCourse {
    pub id: String,
    pub name: String,
}

/// A student enrolled in a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: String,
}

/// A quiz as listed by the LMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizMeta {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub points_possible: Option<f64>,
}

/// A quiz submission as reported by the LMS. Any of the scoring fields may
/// be missing while the submission is in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub workflow_state: String,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub quiz_points_possible: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Display names of an LMS user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: String,
}
