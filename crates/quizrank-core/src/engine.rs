//! Central sync orchestrator.
//!
//! Pulls course metadata, memberships, quizzes, and submissions from the
//! LMS, runs every new scored submission through the rating engine, and
//! commits the result through the persistence gateway. The per-course
//! watermark only advances once every quiz of the course went through
//! without a fatal error, so an aborted run is retried from the same point.
//!
//! Re-running a window is always safe: attempts are unique per
//! (student, quiz), and rating commits are compare-and-swap on the
//! student's and question's counters, so concurrent updates of the same
//! row are retried instead of lost.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{OnceCell, Semaphore, SemaphorePermit};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ApiError, SkipReason, StoreError, SyncError, TitleError};
use crate::model::{
    Attempt, AttemptCommit, CommitOutcome, Profile, QuizMeta, RemoteCourse, StudentProfile,
    Submission,
};
use crate::parser::parse_quiz_title;
use crate::rating::{update_ratings, RatingInput};
use crate::report::{CourseOutcome, CourseReport, SkipCounts, SyncSummary};
use crate::traits::{LmsClient, RatingStore};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum submission fetches and submission commits in flight at once
    /// within a course run. Quizzes and their submissions share the limit.
    pub concurrency: usize,
    /// Retries on transient API errors.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_delay: Duration,
    /// Upper bound for a single API call, retries excluded.
    pub call_timeout: Duration,
    /// Rating commits tried per submission before giving up on contention.
    pub max_commit_attempts: u32,
    /// Courses `sync_all_courses` is limited to. Empty means all.
    pub courses: Vec<String>,
    /// Ignore stored watermarks and fetch every submission.
    pub full_resync: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            call_timeout: Duration::from_secs(120),
            max_commit_attempts: 16,
            courses: Vec::new(),
            full_resync: false,
        }
    }
}

/// Where a course sync currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    Idle,
    FetchingCourseMeta,
    SyncingMembers,
    FetchingQuizzes,
    ProcessingQuizBatch,
    Committing,
    Aborted,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::FetchingCourseMeta => "fetching course metadata",
            SyncPhase::SyncingMembers => "syncing members",
            SyncPhase::FetchingQuizzes => "fetching quizzes",
            SyncPhase::ProcessingQuizBatch => "processing quizzes",
            SyncPhase::Committing => "committing",
            SyncPhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Progress reporting trait.
pub trait SyncObserver: Send + Sync {
    fn on_phase(&self, course_id: &str, phase: SyncPhase);
    fn on_quiz_excluded(&self, course_id: &str, quiz: &QuizMeta, reason: &TitleError);
    fn on_attempt_recorded(&self, attempt: &Attempt);
    fn on_course_complete(&self, report: &CourseReport);
    fn on_course_failed(&self, course_id: &str, error: &SyncError);
}

/// No-op progress observer.
pub struct NoopObserver;

impl SyncObserver for NoopObserver {
    fn on_phase(&self, _: &str, _: SyncPhase) {}
    fn on_quiz_excluded(&self, _: &str, _: &QuizMeta, _: &TitleError) {}
    fn on_attempt_recorded(&self, _: &Attempt) {}
    fn on_course_complete(&self, _: &CourseReport) {}
    fn on_course_failed(&self, _: &str, _: &SyncError) {}
}

/// A submission that passed validation and can be rated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradedSubmission {
    pub score: f64,
    pub max_score: f64,
    pub accuracy: f64,
    pub finished_at: DateTime<Utc>,
}

/// Check that a submission is complete and scored. `quiz_max` is the quiz's
/// own point total, used when the submission does not carry one.
pub fn grade_submission(
    submission: &Submission,
    quiz_max: Option<f64>,
) -> Result<GradedSubmission, SkipReason> {
    if submission.workflow_state != "complete" {
        return Err(SkipReason::NotComplete);
    }
    let finished_at = submission.finished_at.ok_or(SkipReason::NotFinished)?;
    let max_score = submission.quiz_points_possible.or(quiz_max);
    let (Some(score), Some(max_score)) = (submission.score, max_score) else {
        return Err(SkipReason::Unscored);
    };
    if !score.is_finite() || !max_score.is_finite() {
        return Err(SkipReason::Unscored);
    }
    if max_score <= 0.0 {
        return Err(SkipReason::ZeroMaxScore);
    }
    Ok(GradedSubmission {
        score,
        max_score,
        accuracy: score / max_score,
        finished_at,
    })
}

/// User profiles known during one course run. Each user id gets one shared
/// cell, so concurrent tasks wait on a single lookup instead of repeating it.
#[derive(Default)]
struct ProfileCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Profile>>>>,
}

impl ProfileCache {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<OnceCell<Profile>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a profile that needs no lookup, such as a listed member's.
    fn seed(&self, user_id: &str, profile: Profile) {
        self.entries()
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new_with(Some(profile))));
    }

    fn cell(&self, user_id: &str) -> Arc<OnceCell<Profile>> {
        Arc::clone(self.entries().entry(user_id.to_string()).or_default())
    }
}

#[derive(Default)]
struct RunCounters {
    members_synced: AtomicUsize,
    quizzes_found: AtomicUsize,
    quizzes_excluded: AtomicUsize,
    submissions_seen: AtomicUsize,
    attempts_recorded: AtomicUsize,
    new_students: AtomicUsize,
    profile_failures: AtomicUsize,
    not_complete: AtomicUsize,
    not_finished: AtomicUsize,
    unscored: AtomicUsize,
    zero_max_score: AtomicUsize,
    duplicate: AtomicUsize,
}

impl RunCounters {
    fn add(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn skip(&self, reason: SkipReason) {
        let counter = match reason {
            SkipReason::NotComplete => &self.not_complete,
            SkipReason::NotFinished => &self.not_finished,
            SkipReason::Unscored => &self.unscored,
            SkipReason::ZeroMaxScore => &self.zero_max_score,
            SkipReason::Duplicate => &self.duplicate,
        };
        Self::add(counter, 1);
    }

    fn skipped(&self) -> SkipCounts {
        SkipCounts {
            not_complete: self.not_complete.load(Ordering::Relaxed),
            not_finished: self.not_finished.load(Ordering::Relaxed),
            unscored: self.unscored.load(Ordering::Relaxed),
            zero_max_score: self.zero_max_score.load(Ordering::Relaxed),
            duplicate: self.duplicate.load(Ordering::Relaxed),
        }
    }
}

/// State scoped to a single course sync. Never shared between runs.
struct CourseRun {
    run_id: Uuid,
    course_id: String,
    since: DateTime<Utc>,
    profiles: ProfileCache,
    counters: RunCounters,
    /// Bounds submission fetches and commits across all quizzes.
    permits: Semaphore,
}

impl CourseRun {
    async fn permit(&self) -> Result<SemaphorePermit<'_>, SyncError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| SyncError::Internal("semaphore closed".into()))
    }
}

/// The central sync engine.
pub struct SyncEngine {
    client: Arc<dyn LmsClient>,
    store: Arc<dyn RatingStore>,
    config: SyncConfig,
    observer: Arc<dyn SyncObserver>,
}

impl SyncEngine {
    pub fn new(client: Arc<dyn LmsClient>, store: Arc<dyn RatingStore>, config: SyncConfig) -> Self {
        Self {
            client,
            store,
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Sync a single course. Fails on the first unrecoverable error, in
    /// which case the course's watermark is left untouched.
    #[instrument(skip(self))]
    pub async fn sync_course(&self, course_id: &str) -> Result<CourseReport, SyncError> {
        let started_at = Utc::now();
        self.enter(course_id, SyncPhase::FetchingCourseMeta);
        let result = async {
            let course = self
                .call(&format!("fetch course {course_id}"), move || {
                    self.client.fetch_course(course_id)
                })
                .await?;
            self.run_course(&course, started_at).await
        }
        .await;
        self.finish(course_id, result)
    }

    /// Sync every course the LMS lists, one after another. Never fails: a
    /// failing course is recorded in the summary and the next one proceeds.
    pub async fn sync_all_courses(&self) -> SyncSummary {
        let courses = match self
            .call("fetch courses", move || self.client.fetch_courses())
            .await
        {
            Ok(courses) => courses,
            Err(e) => {
                error!("could not list courses: {e}");
                return SyncSummary::listing_failed(&e.to_string());
            }
        };

        let selected: Vec<RemoteCourse> = if self.config.courses.is_empty() {
            courses
        } else {
            courses
                .into_iter()
                .filter(|c| self.config.courses.contains(&c.id))
                .collect()
        };
        info!(
            client = self.client.name(),
            courses = selected.len(),
            "syncing all courses"
        );

        let mut outcomes = Vec::with_capacity(selected.len());
        for course in &selected {
            let started_at = Utc::now();
            self.enter(&course.id, SyncPhase::FetchingCourseMeta);
            let result = self.run_course(course, started_at).await;
            let outcome = match self.finish(&course.id, result) {
                Ok(report) => CourseOutcome::Synced(report),
                Err(e) => CourseOutcome::Failed {
                    course_id: course.id.clone(),
                    course_name: course.name.clone(),
                    error: e.to_string(),
                },
            };
            outcomes.push(outcome);
        }

        let summary = SyncSummary::from_outcomes(outcomes);
        if summary.success {
            info!("{}", summary.message);
        } else {
            warn!("{}", summary.message);
        }
        summary
    }

    fn enter(&self, course_id: &str, phase: SyncPhase) {
        debug!(course_id, %phase, "sync phase");
        self.observer.on_phase(course_id, phase);
    }

    fn finish(
        &self,
        course_id: &str,
        result: Result<CourseReport, SyncError>,
    ) -> Result<CourseReport, SyncError> {
        match &result {
            Ok(report) => {
                info!(
                    course_id,
                    recorded = report.attempts_recorded,
                    skipped = report.skipped.total(),
                    excluded_quizzes = report.quizzes_excluded,
                    duration_ms = report.duration_ms,
                    "course sync completed"
                );
                self.enter(course_id, SyncPhase::Idle);
                self.observer.on_course_complete(report);
            }
            Err(e) => {
                error!(course_id, "course sync aborted, watermark unchanged: {e}");
                self.enter(course_id, SyncPhase::Aborted);
                self.observer.on_course_failed(course_id, e);
            }
        }
        result
    }

    async fn run_course(
        &self,
        course: &RemoteCourse,
        started_at: DateTime<Utc>,
    ) -> Result<CourseReport, SyncError> {
        let timer = Instant::now();
        let course_id = course.id.as_str();
        self.store.upsert_course(course).await?;

        self.enter(course_id, SyncPhase::SyncingMembers);
        let members = self
            .call(&format!("fetch members of course {course_id}"), move || {
                self.client.fetch_course_members(course_id)
            })
            .await?;

        let since = if self.config.full_resync {
            DateTime::<Utc>::UNIX_EPOCH
        } else {
            self.store
                .get_watermark(course_id)
                .await?
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        };
        let run = CourseRun {
            run_id: Uuid::new_v4(),
            course_id: course_id.to_string(),
            since,
            profiles: ProfileCache::default(),
            counters: RunCounters::default(),
            permits: Semaphore::new(self.config.concurrency.max(1)),
        };
        info!(course_id, since = %since, run_id = %run.run_id, "starting course sync");

        for member in &members {
            self.store
                .upsert_student(&StudentProfile {
                    student_id: member.user_id.clone(),
                    course_id: course_id.to_string(),
                    name: member.name.clone(),
                    short_name: member.short_name.clone(),
                })
                .await?;
            run.profiles.seed(
                &member.user_id,
                Profile {
                    name: member.name.clone(),
                    short_name: member.short_name.clone(),
                },
            );
        }
        RunCounters::add(&run.counters.members_synced, members.len());

        self.enter(course_id, SyncPhase::FetchingQuizzes);
        let quizzes = self
            .call(&format!("fetch quizzes of course {course_id}"), move || {
                self.client.fetch_quizzes(course_id)
            })
            .await?;
        RunCounters::add(&run.counters.quizzes_found, quizzes.len());

        let mut rated = Vec::with_capacity(quizzes.len());
        for quiz in &quizzes {
            match parse_quiz_title(&quiz.title) {
                Ok(parsed) => {
                    let meta = parsed.into_question_meta(&quiz.id, course_id, &quiz.title);
                    self.store.upsert_question(&meta).await?;
                    rated.push(quiz);
                }
                Err(reason) => {
                    debug!(course_id, quiz_id = %quiz.id, title = %quiz.title, "excluding quiz: {reason}");
                    RunCounters::add(&run.counters.quizzes_excluded, 1);
                    self.observer.on_quiz_excluded(course_id, quiz, &reason);
                }
            }
        }
        info!(
            course_id,
            quizzes = quizzes.len(),
            rated = rated.len(),
            "quizzes loaded"
        );

        self.enter(course_id, SyncPhase::ProcessingQuizBatch);
        try_join_all(rated.into_iter().map(|quiz| self.process_quiz(&run, quiz))).await?;

        self.enter(course_id, SyncPhase::Committing);
        self.store.set_watermark(course_id, started_at).await?;

        let counters = &run.counters;
        Ok(CourseReport {
            run_id: run.run_id,
            course_id: course_id.to_string(),
            course_name: course.name.clone(),
            since,
            started_at,
            members_synced: counters.members_synced.load(Ordering::Relaxed),
            quizzes_found: counters.quizzes_found.load(Ordering::Relaxed),
            quizzes_excluded: counters.quizzes_excluded.load(Ordering::Relaxed),
            submissions_seen: counters.submissions_seen.load(Ordering::Relaxed),
            attempts_recorded: counters.attempts_recorded.load(Ordering::Relaxed),
            new_students: counters.new_students.load(Ordering::Relaxed),
            profile_failures: counters.profile_failures.load(Ordering::Relaxed),
            skipped: counters.skipped(),
            duration_ms: timer.elapsed().as_millis() as u64,
        })
    }

    async fn process_quiz(&self, run: &CourseRun, quiz: &QuizMeta) -> Result<(), SyncError> {
        let course_id = run.course_id.as_str();
        let quiz_id = quiz.id.as_str();
        let since = run.since;
        let submissions = {
            let _permit = run.permit().await?;
            self.call(
                &format!("fetch submissions of quiz {quiz_id} in course {course_id}"),
                move || self.client.fetch_submissions_since(course_id, quiz_id, since),
            )
            .await?
        };
        RunCounters::add(&run.counters.submissions_seen, submissions.len());

        if submissions.is_empty() {
            debug!(course_id, quiz_id, "no new submissions");
            return Ok(());
        }
        info!(course_id, quiz_id, title = %quiz.title, count = submissions.len(), "processing submissions");

        for_each_bounded(&run.permits, &submissions, move |submission| {
            self.process_submission(run, quiz, submission)
        })
        .await
    }

    async fn process_submission(
        &self,
        run: &CourseRun,
        quiz: &QuizMeta,
        submission: &Submission,
    ) -> Result<(), SyncError> {
        let course_id = run.course_id.as_str();
        let quiz_id = quiz.id.as_str();
        let student_id = submission.user_id.as_str();

        let graded = match grade_submission(submission, quiz.points_possible) {
            Ok(graded) => graded,
            Err(reason) => {
                debug!(course_id, quiz_id, submission_id = %submission.id, "skipping submission: {reason}");
                run.counters.skip(reason);
                return Ok(());
            }
        };

        if self
            .store
            .find_attempt(course_id, student_id, quiz_id)
            .await?
            .is_some()
        {
            debug!(course_id, quiz_id, student_id, "attempt already recorded");
            run.counters.skip(SkipReason::Duplicate);
            return Ok(());
        }

        self.ensure_student(run, student_id).await?;

        for commit_attempt in 1..=self.config.max_commit_attempts.max(1) {
            let student = self
                .store
                .find_student(course_id, student_id)
                .await?
                .ok_or_else(|| StoreError::MissingRow {
                    kind: "student",
                    key: format!("{course_id}/{student_id}"),
                })?;
            let question = self
                .store
                .find_question(course_id, quiz_id)
                .await?
                .ok_or_else(|| StoreError::MissingRow {
                    kind: "question",
                    key: format!("{course_id}/{quiz_id}"),
                })?;

            let update = update_ratings(&RatingInput {
                user_rating: student.rating,
                question_rating: question.rating,
                accuracy: graded.accuracy,
                user_attempts: student.attempt_count,
                question_submissions: question.submission_count,
            });

            let commit = AttemptCommit {
                attempt: Attempt {
                    id: Uuid::new_v4(),
                    course_id: course_id.to_string(),
                    student_id: student_id.to_string(),
                    quiz_id: quiz_id.to_string(),
                    submission_id: submission.id.clone(),
                    score: graded.score,
                    max_score: graded.max_score,
                    accuracy: graded.accuracy,
                    submitted_at: graded.finished_at,
                    rating_change: update.rating_change,
                    recorded_at: Utc::now(),
                },
                new_student_rating: update.new_user_rating,
                new_question_rating: update.new_question_rating,
                expected_attempt_count: student.attempt_count,
                expected_submission_count: question.submission_count,
            };

            match self.store.create_attempt_and_update_ratings(&commit).await? {
                CommitOutcome::Recorded(attempt) => {
                    info!(
                        course_id,
                        quiz_id,
                        student_id,
                        old_rating = student.rating,
                        new_rating = update.new_user_rating,
                        change = update.rating_change,
                        question_rating = update.new_question_rating,
                        "rating updated"
                    );
                    RunCounters::add(&run.counters.attempts_recorded, 1);
                    self.observer.on_attempt_recorded(&attempt);
                    return Ok(());
                }
                CommitOutcome::Duplicate => {
                    debug!(course_id, quiz_id, student_id, "attempt recorded concurrently");
                    run.counters.skip(SkipReason::Duplicate);
                    return Ok(());
                }
                CommitOutcome::Stale => {
                    debug!(course_id, quiz_id, student_id, commit_attempt, "stale rating commit, retrying");
                    tokio::task::yield_now().await;
                }
            }
        }

        Err(SyncError::Contention {
            submission_id: submission.id.clone(),
            attempts: self.config.max_commit_attempts.max(1),
        })
    }

    /// Make sure a student row exists, looking the profile up on first
    /// sight. A failed lookup is not fatal; the student gets empty names.
    async fn ensure_student(&self, run: &CourseRun, student_id: &str) -> Result<(), SyncError> {
        let course_id = run.course_id.as_str();
        if self.store.find_student(course_id, student_id).await?.is_some() {
            return Ok(());
        }

        let cell = run.profiles.cell(student_id);
        let profile = cell
            .get_or_init(|| async {
                info!(course_id, student_id, "new student, looking up profile");
                RunCounters::add(&run.counters.new_students, 1);
                let lookup = self
                    .call(&format!("fetch profile of user {student_id}"), move || {
                        self.client.fetch_user_profile(student_id)
                    })
                    .await;
                match lookup {
                    Ok(profile) => profile,
                    Err(e) => {
                        warn!(course_id, student_id, "profile lookup failed, using empty names: {e}");
                        RunCounters::add(&run.counters.profile_failures, 1);
                        Profile::default()
                    }
                }
            })
            .await
            .clone();

        self.store
            .upsert_student(&StudentProfile {
                student_id: student_id.to_string(),
                course_id: course_id.to_string(),
                name: profile.name,
                short_name: profile.short_name,
            })
            .await?;
        Ok(())
    }

    /// Run one API call under the per-call timeout, retrying transient
    /// failures with exponential backoff.
    async fn call<T, F, Fut>(&self, operation: &str, request: F) -> Result<T, SyncError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut retry_delay = self.config.retry_delay;
        let mut retries = 0;
        loop {
            let outcome = match tokio::time::timeout(self.config.call_timeout, request()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ApiError::Timeout {
                    endpoint: operation.to_string(),
                    secs: self.config.call_timeout.as_secs(),
                }),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_permanent() || retries >= self.config.max_retries => {
                    return Err(SyncError::Api {
                        operation: operation.to_string(),
                        source: e,
                    });
                }
                Err(e) => {
                    retries += 1;
                    let wait = e.retry_after().unwrap_or(retry_delay).min(MAX_RETRY_DELAY);
                    warn!(operation, retries, "transient API failure, retrying in {wait:?}: {e}");
                    tokio::time::sleep(wait).await;
                    retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
                }
            }
        }
    }
}

/// Drive one future per item, each holding a permit of `permits` while it
/// runs. Stops at the first error; futures still pending are dropped.
async fn for_each_bounded<I, F, Fut>(permits: &Semaphore, items: I, f: F) -> Result<(), SyncError>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = Result<(), SyncError>>,
{
    let mut pending: FuturesUnordered<_> = items
        .into_iter()
        .map(|item| {
            let task = f(item);
            async move {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|_| SyncError::Internal("semaphore closed".into()))?;
                task.await
            }
        })
        .collect();

    while let Some(result) = pending.next().await {
        result?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn submission(state: &str, finished: bool, score: Option<f64>, max: Option<f64>) -> Submission {
        Submission {
            id: "s1".into(),
            quiz_id: "q1".into(),
            user_id: "u1".into(),
            workflow_state: state.into(),
            finished_at: finished.then(Utc::now),
            score,
            quiz_points_possible: max,
            updated_at: None,
        }
    }

    #[test]
    fn graded_submission_computes_accuracy() {
        let graded =
            grade_submission(&submission("complete", true, Some(7.5), Some(10.0)), None).unwrap();
        assert_eq!(graded.accuracy, 0.75);
        assert_eq!(graded.max_score, 10.0);
    }

    #[test]
    fn quiz_points_fill_in_a_missing_max_score() {
        let unscored = submission("complete", true, Some(3.0), None);
        let graded = grade_submission(&unscored, Some(4.0)).unwrap();
        assert_eq!(graded.accuracy, 0.75);

        // the submission's own total wins
        let scored = submission("complete", true, Some(3.0), Some(6.0));
        assert_eq!(grade_submission(&scored, Some(4.0)).unwrap().accuracy, 0.5);
    }

    #[test]
    fn incomplete_submissions_are_skipped() {
        assert_eq!(
            grade_submission(&submission("untaken", true, Some(1.0), Some(2.0)), None),
            Err(SkipReason::NotComplete)
        );
        assert_eq!(
            grade_submission(&submission("pending_review", true, Some(1.0), Some(2.0)), None),
            Err(SkipReason::NotComplete)
        );
        assert_eq!(
            grade_submission(&submission("complete", false, Some(1.0), Some(2.0)), None),
            Err(SkipReason::NotFinished)
        );
    }

    #[test]
    fn unscored_submissions_are_skipped() {
        assert_eq!(
            grade_submission(&submission("complete", true, None, Some(2.0)), None),
            Err(SkipReason::Unscored)
        );
        assert_eq!(
            grade_submission(&submission("complete", true, Some(1.0), None), None),
            Err(SkipReason::Unscored)
        );
        assert_eq!(
            grade_submission(&submission("complete", true, Some(f64::NAN), Some(2.0)), None),
            Err(SkipReason::Unscored)
        );
        assert_eq!(
            grade_submission(&submission("complete", true, Some(0.0), Some(0.0)), None),
            Err(SkipReason::ZeroMaxScore)
        );
    }

    #[tokio::test]
    async fn bounded_execution_respects_limit() {
        let in_flight = &AtomicU32::new(0);
        let peak = &AtomicU32::new(0);

        for_each_bounded(&Semaphore::new(3), 0..20, move |_| async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn bounded_execution_stops_on_error() {
        let result = for_each_bounded(&Semaphore::new(2), 0..5, |i| async move {
            if i == 3 {
                Err(SyncError::Internal(format!("item {i}")))
            } else {
                Ok(())
            }
        })
        .await;
        assert!(matches!(result, Err(SyncError::Internal(msg)) if msg == "item 3"));
    }

    #[tokio::test]
    async fn profile_cache_shares_one_lookup_per_user() {
        let cache = ProfileCache::default();
        cache.seed(
            "5",
            Profile {
                name: "Nguyen Van A".into(),
                short_name: "A".into(),
            },
        );
        assert_eq!(
            cache.cell("5").get().map(|p| p.short_name.clone()),
            Some("A".to_string())
        );

        let lookups = &AtomicU32::new(0);
        let lookup = move || async move {
            lookups.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Profile::default()
        };
        let first = cache.cell("8");
        let second = cache.cell("8");
        tokio::join!(first.get_or_init(lookup), second.get_or_init(lookup));
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        assert!(cache.cell("9").get().is_none());
    }

    #[test]
    fn phase_display() {
        assert_eq!(SyncPhase::ProcessingQuizBatch.to_string(), "processing quizzes");
        assert_eq!(SyncPhase::Aborted.to_string(), "aborted");
    }
}
