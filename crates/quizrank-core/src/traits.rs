//! Core trait definitions for the LMS client and the persistence gateway.
//!
//! These async traits are implemented by the `quizrank-canvas` and
//! `quizrank-store` crates respectively.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{ApiError, StoreError};
use crate::model::{
    Attempt, AttemptCommit, CommitOutcome, Course, Member, Profile, Question, QuestionMeta,
    QuizMeta, RemoteCourse, Student, StudentProfile, Submission,
};

// ---------------------------------------------------------------------------
// LMS client trait
// ---------------------------------------------------------------------------

/// Read-only access to the learning-management API.
///
/// List methods return the complete collection: implementations follow
/// pagination until the server reports no further page.
#[async_trait]
pub trait LmsClient: Send + Sync {
    /// Human-readable client name (e.g. "canvas").
    fn name(&self) -> &str;

    /// Every course visible to the configured credential.
    async fn fetch_courses(&self) -> Result<Vec<RemoteCourse>, ApiError>;

    /// Metadata of a single course.
    async fn fetch_course(&self, course_id: &str) -> Result<RemoteCourse, ApiError>;

    /// Students enrolled in a course.
    async fn fetch_course_members(&self, course_id: &str) -> Result<Vec<Member>, ApiError>;

    /// Quizzes of a course.
    async fn fetch_quizzes(&self, course_id: &str) -> Result<Vec<QuizMeta>, ApiError>;

    /// Submissions of a quiz updated at or after `since`.
    async fn fetch_submissions_since(
        &self,
        course_id: &str,
        quiz_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Submission>, ApiError>;

    /// Display names of a user.
    async fn fetch_user_profile(&self, user_id: &str) -> Result<Profile, ApiError>;
}

// ---------------------------------------------------------------------------
// Persistence gateway trait
// ---------------------------------------------------------------------------

/// Durable storage for courses, ratings, attempts, and sync watermarks.
///
/// Implementations own uniqueness of attempts per (course, student, quiz)
/// and must apply [`RatingStore::create_attempt_and_update_ratings`]
/// atomically.
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Create or rename a course.
    async fn upsert_course(&self, course: &RemoteCourse) -> Result<Course, StoreError>;

    /// Create a student at the default rating, or update display names.
    async fn upsert_student(&self, profile: &StudentProfile) -> Result<Student, StoreError>;

    /// Create a question at the default rating, or update its metadata only.
    async fn upsert_question(&self, meta: &QuestionMeta) -> Result<Question, StoreError>;

    async fn find_student(
        &self,
        course_id: &str,
        student_id: &str,
    ) -> Result<Option<Student>, StoreError>;

    async fn find_question(
        &self,
        course_id: &str,
        quiz_id: &str,
    ) -> Result<Option<Question>, StoreError>;

    async fn find_attempt(
        &self,
        course_id: &str,
        student_id: &str,
        quiz_id: &str,
    ) -> Result<Option<Attempt>, StoreError>;

    /// Insert the attempt and apply both rating updates as one unit.
    async fn create_attempt_and_update_ratings(
        &self,
        commit: &AttemptCommit,
    ) -> Result<CommitOutcome, StoreError>;

    async fn get_watermark(&self, course_id: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn set_watermark(&self, course_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}
