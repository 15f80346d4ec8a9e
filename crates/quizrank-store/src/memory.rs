//! In-memory persistence gateway.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use quizrank_core::error::StoreError;
use quizrank_core::model::{
    Attempt, AttemptCommit, CommitOutcome, Course, Question, QuestionMeta, RemoteCourse, Student,
    StudentProfile, Watermark, DEFAULT_RATING,
};
use quizrank_core::traits::RatingStore;

use crate::snapshot::{load_snapshot, save_snapshot, Snapshot, SNAPSHOT_VERSION};

type CourseKey = (String, String);
type AttemptKey = (String, String, String);

#[derive(Default)]
struct StoreState {
    courses: BTreeMap<String, Course>,
    /// Keyed by (course, student).
    students: BTreeMap<CourseKey, Student>,
    /// Keyed by (course, quiz).
    questions: BTreeMap<CourseKey, Question>,
    /// Keyed by (course, student, quiz).
    attempts: BTreeMap<AttemptKey, Attempt>,
    watermarks: BTreeMap<String, DateTime<Utc>>,
}

/// A rating store held entirely in memory.
///
/// All state sits behind one mutex and every gateway call runs as a single
/// critical section, which makes rating commits atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

fn key(a: &str, b: &str) -> CourseKey {
    (a.to_string(), b.to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = StoreState::default();
        for course in snapshot.courses {
            state.courses.insert(course.id.clone(), course);
        }
        for student in snapshot.students {
            state
                .students
                .insert(key(&student.course_id, &student.student_id), student);
        }
        for question in snapshot.questions {
            state
                .questions
                .insert(key(&question.course_id, &question.quiz_id), question);
        }
        for attempt in snapshot.attempts {
            let k = (
                attempt.course_id.clone(),
                attempt.student_id.clone(),
                attempt.quiz_id.clone(),
            );
            state.attempts.insert(k, attempt);
        }
        for watermark in snapshot.watermarks {
            state
                .watermarks
                .insert(watermark.course_id, watermark.synced_at);
        }
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state();
        Snapshot {
            version: SNAPSHOT_VERSION,
            courses: state.courses.values().cloned().collect(),
            students: state.students.values().cloned().collect(),
            questions: state.questions.values().cloned().collect(),
            attempts: state.attempts.values().cloned().collect(),
            watermarks: state
                .watermarks
                .iter()
                .map(|(course_id, synced_at)| Watermark {
                    course_id: course_id.clone(),
                    synced_at: *synced_at,
                })
                .collect(),
        }
    }

    /// Open the snapshot at `path`, or start empty if there is none.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(load_snapshot(path)?
            .map(Self::from_snapshot)
            .unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = self.snapshot();
        debug!(
            path = %path.display(),
            students = snapshot.students.len(),
            attempts = snapshot.attempts.len(),
            "saving store snapshot"
        );
        save_snapshot(&snapshot, path)
    }

    // -----------------------------------------------------------------------
    // Read-side queries
    // -----------------------------------------------------------------------

    pub fn courses(&self) -> Vec<Course> {
        self.state().courses.values().cloned().collect()
    }

    pub fn course(&self, course_id: &str) -> Option<Course> {
        self.state().courses.get(course_id).cloned()
    }

    pub fn students(&self, course_id: &str) -> Vec<Student> {
        self.state()
            .students
            .values()
            .filter(|s| s.course_id == course_id)
            .cloned()
            .collect()
    }

    pub fn questions(&self, course_id: &str) -> Vec<Question> {
        self.state()
            .questions
            .values()
            .filter(|q| q.course_id == course_id)
            .cloned()
            .collect()
    }

    /// Attempts of one student in a course, oldest submission first.
    pub fn attempts_for(&self, course_id: &str, student_id: &str) -> Vec<Attempt> {
        let mut attempts: Vec<Attempt> = self
            .state()
            .attempts
            .values()
            .filter(|a| a.course_id == course_id && a.student_id == student_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.submitted_at);
        attempts
    }

    /// Number of attempts recorded in a course.
    pub fn attempt_count(&self, course_id: &str) -> usize {
        self.state()
            .attempts
            .values()
            .filter(|a| a.course_id == course_id)
            .count()
    }

    pub fn watermarks(&self) -> Vec<Watermark> {
        self.state()
            .watermarks
            .iter()
            .map(|(course_id, synced_at)| Watermark {
                course_id: course_id.clone(),
                synced_at: *synced_at,
            })
            .collect()
    }
}

#[async_trait]
impl RatingStore for MemoryStore {
    async fn upsert_course(&self, course: &RemoteCourse) -> Result<Course, StoreError> {
        let mut state = self.state();
        let entry = state
            .courses
            .entry(course.id.clone())
            .or_insert_with(|| Course {
                id: course.id.clone(),
                name: course.name.clone(),
                updated_at: Utc::now(),
            });
        entry.name = course.name.clone();
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn upsert_student(&self, profile: &StudentProfile) -> Result<Student, StoreError> {
        let mut state = self.state();
        let entry = state
            .students
            .entry(key(&profile.course_id, &profile.student_id))
            .or_insert_with(|| Student {
                student_id: profile.student_id.clone(),
                course_id: profile.course_id.clone(),
                name: String::new(),
                short_name: String::new(),
                rating: DEFAULT_RATING,
                attempt_count: 0,
            });
        // An empty name is a failed lookup, never a rename.
        if !profile.name.is_empty() {
            entry.name = profile.name.clone();
        }
        if !profile.short_name.is_empty() {
            entry.short_name = profile.short_name.clone();
        }
        Ok(entry.clone())
    }

    async fn upsert_question(&self, meta: &QuestionMeta) -> Result<Question, StoreError> {
        let mut state = self.state();
        let entry = state
            .questions
            .entry(key(&meta.course_id, &meta.quiz_id))
            .or_insert_with(|| Question {
                quiz_id: meta.quiz_id.clone(),
                course_id: meta.course_id.clone(),
                title: String::new(),
                types: Vec::new(),
                lesson: None,
                difficulty: None,
                class: None,
                rating: DEFAULT_RATING,
                submission_count: 0,
            });
        entry.title = meta.title.clone();
        entry.types = meta.types.clone();
        entry.lesson = meta.lesson.clone();
        entry.difficulty = meta.difficulty;
        entry.class = meta.class;
        Ok(entry.clone())
    }

    async fn find_student(
        &self,
        course_id: &str,
        student_id: &str,
    ) -> Result<Option<Student>, StoreError> {
        Ok(self.state().students.get(&key(course_id, student_id)).cloned())
    }

    async fn find_question(
        &self,
        course_id: &str,
        quiz_id: &str,
    ) -> Result<Option<Question>, StoreError> {
        Ok(self.state().questions.get(&key(course_id, quiz_id)).cloned())
    }

    async fn find_attempt(
        &self,
        course_id: &str,
        student_id: &str,
        quiz_id: &str,
    ) -> Result<Option<Attempt>, StoreError> {
        let k = (
            course_id.to_string(),
            student_id.to_string(),
            quiz_id.to_string(),
        );
        Ok(self.state().attempts.get(&k).cloned())
    }

    async fn create_attempt_and_update_ratings(
        &self,
        commit: &AttemptCommit,
    ) -> Result<CommitOutcome, StoreError> {
        let attempt = &commit.attempt;
        let attempt_key = (
            attempt.course_id.clone(),
            attempt.student_id.clone(),
            attempt.quiz_id.clone(),
        );
        let student_key = key(&attempt.course_id, &attempt.student_id);
        let question_key = key(&attempt.course_id, &attempt.quiz_id);

        let mut state = self.state();
        if state.attempts.contains_key(&attempt_key) {
            return Ok(CommitOutcome::Duplicate);
        }

        let student_version = state
            .students
            .get(&student_key)
            .map(|s| s.attempt_count)
            .ok_or_else(|| StoreError::MissingRow {
                kind: "student",
                key: format!("{}/{}", attempt.course_id, attempt.student_id),
            })?;
        let question_version = state
            .questions
            .get(&question_key)
            .map(|q| q.submission_count)
            .ok_or_else(|| StoreError::MissingRow {
                kind: "question",
                key: format!("{}/{}", attempt.course_id, attempt.quiz_id),
            })?;
        if student_version != commit.expected_attempt_count
            || question_version != commit.expected_submission_count
        {
            return Ok(CommitOutcome::Stale);
        }

        if let Some(student) = state.students.get_mut(&student_key) {
            student.rating = commit.new_student_rating;
            student.attempt_count += 1;
        }
        if let Some(question) = state.questions.get_mut(&question_key) {
            question.rating = commit.new_question_rating;
            question.submission_count += 1;
        }
        state.attempts.insert(attempt_key, attempt.clone());
        Ok(CommitOutcome::Recorded(attempt.clone()))
    }

    async fn get_watermark(&self, course_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.state().watermarks.get(course_id).copied())
    }

    async fn set_watermark(&self, course_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.state().watermarks.insert(course_id.to_string(), at);
        Ok(())
    }
}
