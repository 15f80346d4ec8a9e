//! Read-side views over stored ratings: course leaderboards, practice
//! recommendations, per-student history, and the problem list.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Attempt, Question, Student};

/// Rating offset recommendations aim for, so suggested quizzes are slightly
/// harder than the student's current level.
pub const RECOMMENDATION_STRETCH: f64 = 100.0;

/// One row of a course leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    /// Dense position: students with equal rating share it.
    pub position: usize,
    pub student_id: String,
    pub name: String,
    pub rating: f64,
    pub attempt_count: u32,
}

/// A quiz suggested for practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub quiz_id: String,
    pub title: String,
    pub types: Vec<String>,
    pub rating: f64,
    /// Absolute distance to the target rating.
    pub distance: f64,
}

/// Rank students by rating, highest first. Ties are broken by attempt count
/// (more first), then by name, but share a position.
pub fn leaderboard(students: &[Student]) -> Vec<Standing> {
    let mut sorted: Vec<&Student> = students.iter().collect();
    sorted.sort_by(|a, b| {
        b.rating
            .partial_cmp(&a.rating)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.attempt_count.cmp(&a.attempt_count))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.student_id.cmp(&b.student_id))
    });

    let mut standings = Vec::with_capacity(sorted.len());
    let mut position = 0;
    let mut last_rating = None;
    for student in sorted {
        if last_rating != Some(student.rating) {
            position += 1;
            last_rating = Some(student.rating);
        }
        standings.push(Standing {
            position,
            student_id: student.student_id.clone(),
            name: student.name.clone(),
            rating: student.rating,
            attempt_count: student.attempt_count,
        });
    }
    standings
}

/// Pick up to `count` unsolved questions closest to
/// `student_rating + RECOMMENDATION_STRETCH`, optionally limited to one type
/// tag (case-insensitive).
pub fn recommend(
    student_rating: f64,
    questions: &[Question],
    solved: &HashSet<String>,
    tag: Option<&str>,
    count: usize,
) -> Vec<Recommendation> {
    let target = student_rating + RECOMMENDATION_STRETCH;
    let mut candidates: Vec<Recommendation> = questions
        .iter()
        .filter(|q| !solved.contains(&q.quiz_id))
        .filter(|q| tag.map_or(true, |t| q.has_type(t)))
        .map(|q| Recommendation {
            quiz_id: q.quiz_id.clone(),
            title: q.title.clone(),
            types: q.types.clone(),
            rating: q.rating,
            distance: (q.rating - target).abs(),
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.quiz_id.cmp(&b.quiz_id))
    });
    candidates.truncate(count);
    candidates
}

/// One recorded attempt with the rating it left the student at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub quiz_id: String,
    /// Quiz title, or the quiz id when the quiz is no longer stored.
    pub title: String,
    pub submitted_at: DateTime<Utc>,
    pub accuracy: f64,
    pub rating_change: f64,
    pub rating_after: f64,
}

/// A student's standing in one course and how they got there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDetails {
    pub student_id: String,
    pub name: String,
    pub rating: f64,
    pub attempt_count: u32,
    pub min_rating: f64,
    pub max_rating: f64,
    /// Newest attempt first.
    pub history: Vec<HistoryEntry>,
}

/// Rebuild a student's rating history from their attempts.
///
/// Ratings are walked back from the current one using each attempt's
/// applied change, so the history always ends at `student.rating`.
pub fn student_details(
    student: &Student,
    attempts: &[Attempt],
    questions: &[Question],
) -> StudentDetails {
    let titles: HashMap<&str, &str> = questions
        .iter()
        .map(|q| (q.quiz_id.as_str(), q.title.as_str()))
        .collect();

    let mut ordered: Vec<&Attempt> = attempts.iter().collect();
    ordered.sort_by(|a, b| {
        a.submitted_at
            .cmp(&b.submitted_at)
            .then_with(|| a.recorded_at.cmp(&b.recorded_at))
    });

    let total_change: f64 = ordered.iter().map(|a| a.rating_change).sum();
    let mut rating = student.rating - total_change;
    let mut min_rating = rating;
    let mut max_rating = rating;
    let mut history = Vec::with_capacity(ordered.len());
    for attempt in ordered {
        rating += attempt.rating_change;
        min_rating = min_rating.min(rating);
        max_rating = max_rating.max(rating);
        history.push(HistoryEntry {
            quiz_id: attempt.quiz_id.clone(),
            title: titles
                .get(attempt.quiz_id.as_str())
                .map_or_else(|| attempt.quiz_id.clone(), |t| t.to_string()),
            submitted_at: attempt.submitted_at,
            accuracy: attempt.accuracy,
            rating_change: attempt.rating_change,
            rating_after: rating,
        });
    }
    history.reverse();

    StudentDetails {
        student_id: student.student_id.clone(),
        name: student.name.clone(),
        rating: student.rating,
        attempt_count: student.attempt_count,
        min_rating,
        max_rating,
        history,
    }
}

/// Questions grouped by course, hardest first within a course.
pub fn problem_list(questions: &[Question]) -> Vec<Question> {
    let mut sorted = questions.to_vec();
    sorted.sort_by(|a, b| {
        a.course_id
            .cmp(&b.course_id)
            .then_with(|| b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal))
            .then_with(|| a.quiz_id.cmp(&b.quiz_id))
    });
    sorted
}
