//! Sync reports: per-course counters and the aggregate result of a
//! multi-course run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SkipReason;

/// Submissions left out of rating, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub not_complete: usize,
    pub not_finished: usize,
    pub unscored: usize,
    pub zero_max_score: usize,
    pub duplicate: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.not_complete + self.not_finished + self.unscored + self.zero_max_score + self.duplicate
    }

    pub fn get(&self, reason: SkipReason) -> usize {
        match reason {
            SkipReason::NotComplete => self.not_complete,
            SkipReason::NotFinished => self.not_finished,
            SkipReason::Unscored => self.unscored,
            SkipReason::ZeroMaxScore => self.zero_max_score,
            SkipReason::Duplicate => self.duplicate,
        }
    }
}

/// Outcome of one successful course sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseReport {
    /// Identifier of this sync invocation.
    pub run_id: Uuid,
    pub course_id: String,
    pub course_name: String,
    /// Watermark the submissions were fetched from.
    pub since: DateTime<Utc>,
    /// Start of the run; becomes the new watermark.
    pub started_at: DateTime<Utc>,
    pub members_synced: usize,
    pub quizzes_found: usize,
    /// Quizzes whose titles carried no usable metadata.
    pub quizzes_excluded: usize,
    pub submissions_seen: usize,
    pub attempts_recorded: usize,
    /// Students first seen through a submission.
    pub new_students: usize,
    /// Profile lookups that failed and fell back to empty names.
    pub profile_failures: usize,
    pub skipped: SkipCounts,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Final state of one course within a multi-course run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CourseOutcome {
    Synced(CourseReport),
    Failed {
        course_id: String,
        course_name: String,
        error: String,
    },
}

impl CourseOutcome {
    pub fn course_id(&self) -> &str {
        match self {
            CourseOutcome::Synced(report) => &report.course_id,
            CourseOutcome::Failed { course_id, .. } => course_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CourseOutcome::Synced(_))
    }
}

/// Aggregate result of syncing every course. Failures are reported here
/// rather than returned as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub courses: Vec<CourseOutcome>,
}

impl SyncSummary {
    /// Summary for a run that could not even list the courses.
    pub fn listing_failed(error: &str) -> Self {
        Self {
            success: false,
            message: format!("Sync failed: could not list courses: {error}"),
            courses: Vec::new(),
        }
    }

    /// Build the summary and its message from per-course outcomes.
    pub fn from_outcomes(courses: Vec<CourseOutcome>) -> Self {
        let failures: Vec<String> = courses
            .iter()
            .filter_map(|c| match c {
                CourseOutcome::Failed {
                    course_id, error, ..
                } => Some(format!("course {course_id}: {error}")),
                CourseOutcome::Synced(_) => None,
            })
            .collect();
        let succeeded = courses.len() - failures.len();
        let (recorded, skipped) = courses
            .iter()
            .filter_map(|c| match c {
                CourseOutcome::Synced(report) => {
                    Some((report.attempts_recorded, report.skipped.total()))
                }
                CourseOutcome::Failed { .. } => None,
            })
            .fold((0, 0), |(r, s), (dr, ds)| (r + dr, s + ds));

        let message = if failures.is_empty() {
            format!(
                "Sync completed for {succeeded} course(s): {recorded} attempt(s) recorded, {skipped} submission(s) skipped."
            )
        } else {
            format!(
                "Sync finished with failures: {succeeded} succeeded, {} failed. {}",
                failures.len(),
                failures.join("; ")
            )
        };

        Self {
            success: failures.is_empty(),
            message,
            courses,
        }
    }

    pub fn attempts_recorded(&self) -> usize {
        self.courses
            .iter()
            .map(|c| match c {
                CourseOutcome::Synced(report) => report.attempts_recorded,
                CourseOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(course_id: &str, recorded: usize, duplicates: usize) -> CourseReport {
        CourseReport {
            run_id: Uuid::nil(),
            course_id: course_id.into(),
            course_name: format!("Course {course_id}"),
            since: DateTime::<Utc>::UNIX_EPOCH,
            started_at: DateTime::<Utc>::UNIX_EPOCH,
            members_synced: 0,
            quizzes_found: 0,
            quizzes_excluded: 0,
            submissions_seen: recorded + duplicates,
            attempts_recorded: recorded,
            new_students: 0,
            profile_failures: 0,
            skipped: SkipCounts {
                duplicate: duplicates,
                ..Default::default()
            },
            duration_ms: 0,
        }
    }

    #[test]
    fn all_synced_is_success() {
        let summary = SyncSummary::from_outcomes(vec![
            CourseOutcome::Synced(report("1", 3, 1)),
            CourseOutcome::Synced(report("2", 2, 0)),
        ]);
        assert!(summary.success);
        assert_eq!(summary.attempts_recorded(), 5);
        assert!(summary.message.contains("2 course(s)"));
        assert!(summary.message.contains("5 attempt(s) recorded"));
        assert!(summary.message.contains("1 submission(s) skipped"));
    }

    #[test]
    fn failure_is_reported_in_message() {
        let summary = SyncSummary::from_outcomes(vec![
            CourseOutcome::Synced(report("1", 3, 0)),
            CourseOutcome::Failed {
                course_id: "2".into(),
                course_name: "Broken".into(),
                error: "fetch quizzes failed".into(),
            },
        ]);
        assert!(!summary.success);
        assert!(summary.message.contains("1 succeeded, 1 failed"));
        assert!(summary.message.contains("course 2: fetch quizzes failed"));
        assert_eq!(summary.courses[1].course_id(), "2");
    }

    #[test]
    fn summary_serializes_with_status_tags() {
        let summary = SyncSummary::from_outcomes(vec![CourseOutcome::Failed {
            course_id: "9".into(),
            course_name: String::new(),
            error: "boom".into(),
        }]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["courses"][0]["status"], "failed");
    }

    #[test]
    fn skip_counts_total() {
        let skipped = SkipCounts {
            not_complete: 1,
            not_finished: 2,
            unscored: 3,
            zero_max_score: 4,
            duplicate: 5,
        };
        assert_eq!(skipped.total(), 15);
        assert_eq!(skipped.get(SkipReason::Unscored), 3);
    }
}
