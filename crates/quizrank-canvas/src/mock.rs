//! Mock LMS for testing the sync engine without a Canvas instance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use quizrank_core::model::{Member, Profile, QuizMeta, RemoteCourse, Submission};
use quizrank_core::traits::LmsClient;

use crate::error::ApiError;

/// One endpoint of the mock, used to inject failures and count calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MockCall {
    Courses,
    Course(String),
    Members(String),
    Quizzes(String),
    Submissions { course_id: String, quiz_id: String },
    Profile(String),
}

struct Failure {
    error: ApiError,
    /// `None` fails forever.
    remaining: Option<u32>,
}

#[derive(Default)]
struct MockState {
    courses: Vec<RemoteCourse>,
    members: HashMap<String, Vec<Member>>,
    quizzes: HashMap<String, Vec<QuizMeta>>,
    submissions: HashMap<(String, String), Vec<Submission>>,
    profiles: HashMap<String, Profile>,
    failures: HashMap<MockCall, Failure>,
    calls: HashMap<MockCall, u32>,
    since_seen: Vec<(String, String, DateTime<Utc>)>,
}

/// An in-memory LMS.
///
/// Every method takes `&self`, so a test can keep adding submissions to a
/// mock already shared with an engine.
#[derive(Default)]
pub struct MockLms {
    state: Mutex<MockState>,
    call_count: AtomicU32,
    /// Return every submission regardless of `since`.
    ignore_since: AtomicBool,
}

impl MockLms {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_course(&self, id: &str, name: &str) {
        let mut state = self.state();
        state.courses.retain(|c| c.id != id);
        state.courses.push(RemoteCourse {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn add_member(&self, course_id: &str, user_id: &str, name: &str) {
        self.state()
            .members
            .entry(course_id.to_string())
            .or_default()
            .push(Member {
                user_id: user_id.to_string(),
                name: name.to_string(),
                short_name: name.split_whitespace().last().unwrap_or("").to_string(),
            });
    }

    pub fn add_quiz(&self, course_id: &str, quiz_id: &str, title: &str) {
        self.add_quiz_with_points(course_id, quiz_id, title, None);
    }

    pub fn add_quiz_with_points(
        &self,
        course_id: &str,
        quiz_id: &str,
        title: &str,
        points_possible: Option<f64>,
    ) {
        self.state()
            .quizzes
            .entry(course_id.to_string())
            .or_default()
            .push(QuizMeta {
                id: quiz_id.to_string(),
                title: title.to_string(),
                points_possible,
            });
    }

    /// Add a submission, replacing an earlier one with the same id.
    pub fn push_submission(&self, course_id: &str, submission: Submission) {
        let mut state = self.state();
        let list = state
            .submissions
            .entry((course_id.to_string(), submission.quiz_id.clone()))
            .or_default();
        list.retain(|s| s.id != submission.id);
        list.push(submission);
    }

    pub fn set_profile(&self, user_id: &str, name: &str, short_name: &str) {
        self.state().profiles.insert(
            user_id.to_string(),
            Profile {
                name: name.to_string(),
                short_name: short_name.to_string(),
            },
        );
    }

    /// Fail every call to `call` with `error`.
    pub fn fail(&self, call: MockCall, error: ApiError) {
        self.state().failures.insert(
            call,
            Failure {
                error,
                remaining: None,
            },
        );
    }

    /// Fail the next `times` calls to `call`, then succeed.
    pub fn fail_times(&self, call: MockCall, error: ApiError, times: u32) {
        self.state().failures.insert(
            call,
            Failure {
                error,
                remaining: Some(times),
            },
        );
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Serve submissions from outside the requested window, as a server
    /// with coarse `updated_since` filtering would.
    pub fn set_ignore_since(&self, ignore: bool) {
        self.ignore_since.store(ignore, Ordering::Relaxed);
    }

    /// Total calls made to this mock.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Calls made to one endpoint.
    pub fn calls(&self, call: &MockCall) -> u32 {
        self.state().calls.get(call).copied().unwrap_or(0)
    }

    /// `since` values requested for a quiz, in call order.
    pub fn since_values(&self, course_id: &str, quiz_id: &str) -> Vec<DateTime<Utc>> {
        self.state()
            .since_seen
            .iter()
            .filter(|(c, q, _)| c == course_id && q == quiz_id)
            .map(|(_, _, since)| *since)
            .collect()
    }

    /// Count the call and return the injected failure, if any.
    fn enter(&self, call: MockCall) -> Result<(), ApiError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state();
        *state.calls.entry(call.clone()).or_insert(0) += 1;

        let Some(failure) = state.failures.get_mut(&call) else {
            return Ok(());
        };
        let error = failure.error.clone();
        match failure.remaining {
            None => Err(error),
            Some(0) => Ok(()),
            Some(n) => {
                failure.remaining = Some(n - 1);
                Err(error)
            }
        }
    }
}

/// A complete, scored submission updated at `at`.
pub fn scored_submission(
    id: &str,
    quiz_id: &str,
    user_id: &str,
    score: f64,
    max_score: f64,
    at: DateTime<Utc>,
) -> Submission {
    Submission {
        id: id.to_string(),
        quiz_id: quiz_id.to_string(),
        user_id: user_id.to_string(),
        workflow_state: "complete".to_string(),
        finished_at: Some(at),
        score: Some(score),
        quiz_points_possible: Some(max_score),
        updated_at: Some(at),
    }
}

#[async_trait]
impl LmsClient for MockLms {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_courses(&self) -> Result<Vec<RemoteCourse>, ApiError> {
        self.enter(MockCall::Courses)?;
        Ok(self.state().courses.clone())
    }

    async fn fetch_course(&self, course_id: &str) -> Result<RemoteCourse, ApiError> {
        self.enter(MockCall::Course(course_id.to_string()))?;
        self.state()
            .courses
            .iter()
            .find(|c| c.id == course_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                endpoint: format!("courses/{course_id}"),
                message: "The specified resource does not exist.".to_string(),
            })
    }

    async fn fetch_course_members(&self, course_id: &str) -> Result<Vec<Member>, ApiError> {
        self.enter(MockCall::Members(course_id.to_string()))?;
        Ok(self
            .state()
            .members
            .get(course_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_quizzes(&self, course_id: &str) -> Result<Vec<QuizMeta>, ApiError> {
        self.enter(MockCall::Quizzes(course_id.to_string()))?;
        Ok(self
            .state()
            .quizzes
            .get(course_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_submissions_since(
        &self,
        course_id: &str,
        quiz_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Submission>, ApiError> {
        self.enter(MockCall::Submissions {
            course_id: course_id.to_string(),
            quiz_id: quiz_id.to_string(),
        })?;
        // Let other quizzes interleave, as real requests would.
        tokio::task::yield_now().await;

        let ignore_since = self.ignore_since.load(Ordering::Relaxed);
        let mut state = self.state();
        state
            .since_seen
            .push((course_id.to_string(), quiz_id.to_string(), since));
        Ok(state
            .submissions
            .get(&(course_id.to_string(), quiz_id.to_string()))
            .map(|subs| {
                subs.iter()
                    .filter(|s| ignore_since || s.updated_at.map_or(true, |at| at >= since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_user_profile(&self, user_id: &str) -> Result<Profile, ApiError> {
        self.enter(MockCall::Profile(user_id.to_string()))?;
        tokio::task::yield_now().await;
        self.state()
            .profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                endpoint: format!("users/{user_id}/profile"),
                message: "user not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn serves_configured_data() {
        let lms = MockLms::new();
        lms.add_course("7", "Physics");
        lms.add_member("7", "5", "Nguyen Van A");
        lms.add_quiz("7", "42", "[MATH] Limits");

        assert_eq!(lms.fetch_courses().await.unwrap().len(), 1);
        assert_eq!(lms.fetch_course("7").await.unwrap().name, "Physics");
        let members = lms.fetch_course_members("7").await.unwrap();
        assert_eq!(members[0].short_name, "A");
        assert_eq!(lms.fetch_quizzes("7").await.unwrap()[0].id, "42");
        assert_eq!(lms.fetch_course("8").await.unwrap_err().status(), Some(404));
        assert_eq!(lms.call_count(), 5);
    }

    #[tokio::test]
    async fn submissions_respect_since_unless_ignored() {
        let lms = MockLms::new();
        let t0 = Utc::now();
        lms.push_submission("7", scored_submission("1", "42", "5", 1.0, 2.0, t0));
        lms.push_submission(
            "7",
            scored_submission("2", "42", "6", 2.0, 2.0, t0 + Duration::hours(1)),
        );

        let since = t0 + Duration::minutes(30);
        assert_eq!(lms.fetch_submissions_since("7", "42", since).await.unwrap().len(), 1);
        lms.set_ignore_since(true);
        assert_eq!(lms.fetch_submissions_since("7", "42", since).await.unwrap().len(), 2);
        assert_eq!(lms.since_values("7", "42"), vec![since, since]);
    }

    #[tokio::test]
    async fn transient_failures_run_out() {
        let lms = MockLms::new();
        let err = ApiError::Network {
            endpoint: "courses".into(),
            message: "connection reset".into(),
        };
        lms.fail_times(MockCall::Courses, err, 2);

        assert!(lms.fetch_courses().await.is_err());
        assert!(lms.fetch_courses().await.is_err());
        assert!(lms.fetch_courses().await.is_ok());
        assert_eq!(lms.calls(&MockCall::Courses), 3);
    }

    #[tokio::test]
    async fn missing_profile_is_an_error() {
        let lms = MockLms::new();
        lms.set_profile("5", "Nguyen Van A", "A");
        assert_eq!(lms.fetch_user_profile("5").await.unwrap().short_name, "A");
        assert!(lms.fetch_user_profile("6").await.is_err());
    }
}
