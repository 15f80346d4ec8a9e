//! Dual ELO rating engine.
//!
//! Every scored attempt moves two ratings: the student's and the question's.
//! The student's K-factor decays with experience and shrinks for already
//! high ratings; the question's decays with submission volume and shrinks
//! for ratings far from the default, which are assumed to be calibrated.
//!
//! Accuracy is remapped before comparison with the expected score so that
//! differences near a perfect score weigh more than differences near zero.

use serde::{Deserialize, Serialize};

/// No rating ever drops below this value.
pub const RATING_FLOOR: f64 = 1000.0;

/// Largest change a zero-accuracy attempt may produce.
pub const ZERO_ACCURACY_MAX_CHANGE: f64 = -10.0;

/// Inputs of a single rating update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingInput {
    pub user_rating: f64,
    pub question_rating: f64,
    /// Fraction of the maximum score obtained. Clamped to `[0, 1]`.
    pub accuracy: f64,
    /// Attempts the student already has recorded in this course.
    pub user_attempts: u32,
    /// Attempts already recorded against the question.
    pub question_submissions: u32,
}

/// Outcome of a rating update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingUpdate {
    pub new_user_rating: f64,
    pub new_question_rating: f64,
    /// Signed change applied to the student's rating.
    pub rating_change: f64,
}

/// Standard logistic expectation of the student beating the question.
pub fn expected_score(user_rating: f64, question_rating: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((question_rating - user_rating) / 400.0))
}

/// Non-linear accuracy remap: linear up to 0.5, convex above it.
pub fn transform_accuracy(accuracy: f64) -> f64 {
    let accuracy = clamp_accuracy(accuracy);
    if accuracy <= 0.5 {
        accuracy
    } else {
        0.5 + (2.0 * (accuracy - 0.5)).powf(1.5) * 0.5
    }
}

/// Student K-factor. Starts at 120 for a newcomer at 1500.
pub fn user_k_factor(attempts: u32, user_rating: f64) -> f64 {
    let stability = (1.0 - (user_rating - 1500.0) / 1000.0).clamp(0.5, 1.5);
    (100.0 * (-(attempts as f64) / 25.0).exp() + 20.0) * stability
}

/// Question K-factor. Starts at 70 for a fresh question at 1500.
pub fn question_k_factor(submissions: u32, question_rating: f64) -> f64 {
    let stability = (1.0 - (question_rating - 1500.0).abs() / 1000.0).clamp(0.5, 1.0);
    (60.0 * (-(submissions as f64) / 40.0).exp() + 10.0) * stability
}

/// Compute both new ratings for one attempt.
pub fn update_ratings(input: &RatingInput) -> RatingUpdate {
    let accuracy = clamp_accuracy(input.accuracy);
    let expected = expected_score(input.user_rating, input.question_rating);
    let performance_diff = transform_accuracy(accuracy) - expected;
    let surprise = 1.0 + performance_diff.abs().min(0.5);

    let k_user = user_k_factor(input.user_attempts, input.user_rating);
    let k_question = question_k_factor(input.question_submissions, input.question_rating);

    let mut user_change = (k_user * surprise * performance_diff).round();
    if accuracy == 0.0 {
        user_change = user_change.min(ZERO_ACCURACY_MAX_CHANGE);
    }
    let question_change = -k_question * surprise * performance_diff;

    let new_user_rating = (input.user_rating + user_change).max(RATING_FLOOR);
    let new_question_rating = (input.question_rating + question_change).max(RATING_FLOOR);

    RatingUpdate {
        new_user_rating,
        new_question_rating,
        rating_change: new_user_rating - input.user_rating,
    }
}

fn clamp_accuracy(accuracy: f64) -> f64 {
    if accuracy.is_nan() {
        0.0
    } else {
        accuracy.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(user: f64, question: f64, accuracy: f64, attempts: u32, subs: u32) -> RatingInput {
        RatingInput {
            user_rating: user,
            question_rating: question,
            accuracy,
            user_attempts: attempts,
            question_submissions: subs,
        }
    }

    #[test]
    fn perfect_score_on_even_match() {
        let update = update_ratings(&input(1500.0, 1500.0, 1.0, 0, 0));

        // expected 0.5, transformed 1.0, diff 0.5, surprise 1.5
        let k_user = 100.0 + 20.0;
        let k_question = 60.0 + 10.0;
        let change = (k_user * 1.5 * 0.5_f64).round();
        assert_eq!(update.rating_change, change);
        assert_eq!(update.rating_change, 90.0);
        assert_eq!(update.new_user_rating, 1590.0);
        assert!((update.new_question_rating - (1500.0 - k_question * 1.5 * 0.5)).abs() < 1e-9);
        assert!((update.new_question_rating - 1447.5).abs() < 1e-9);
    }

    #[test]
    fn expected_score_is_symmetric() {
        assert!((expected_score(1500.0, 1500.0) - 0.5).abs() < 1e-12);
        let a = expected_score(1700.0, 1500.0);
        let b = expected_score(1500.0, 1700.0);
        assert!((a + b - 1.0).abs() < 1e-12);
        assert!(a > 0.75 && a < 0.77);
    }

    #[test]
    fn accuracy_transform_is_continuous_and_amplifies_the_top() {
        assert_eq!(transform_accuracy(0.0), 0.0);
        assert_eq!(transform_accuracy(0.3), 0.3);
        assert_eq!(transform_accuracy(0.5), 0.5);
        assert!((transform_accuracy(1.0) - 1.0).abs() < 1e-12);

        let high_gap = transform_accuracy(0.9) - transform_accuracy(0.8);
        let low_gap = transform_accuracy(0.2) - transform_accuracy(0.1);
        assert!(high_gap > low_gap, "{high_gap} <= {low_gap}");
    }

    #[test]
    fn accuracy_is_clamped() {
        assert_eq!(transform_accuracy(-0.4), 0.0);
        assert!((transform_accuracy(1.7) - 1.0).abs() < 1e-12);
        assert_eq!(transform_accuracy(f64::NAN), 0.0);
    }

    #[test]
    fn user_k_factor_decays_and_stabilises() {
        assert!((user_k_factor(0, 1500.0) - 120.0).abs() < 1e-9);
        let after_25 = 100.0 * (-1.0f64).exp() + 20.0;
        assert!((user_k_factor(25, 1500.0) - after_25).abs() < 1e-9);
        assert!(user_k_factor(200, 1500.0) < 21.0);

        assert!((user_k_factor(0, 2000.0) - 60.0).abs() < 1e-9);
        assert!((user_k_factor(0, 4000.0) - 60.0).abs() < 1e-9);
        assert!((user_k_factor(0, 0.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn question_k_factor_slows_extreme_ratings() {
        assert!((question_k_factor(0, 1500.0) - 70.0).abs() < 1e-9);
        assert!((question_k_factor(0, 1000.0) - 35.0).abs() < 1e-9);
        assert!((question_k_factor(0, 2500.0) - 35.0).abs() < 1e-9);
        assert!(question_k_factor(40, 1500.0) < question_k_factor(0, 1500.0));
        // never amplified above the base value
        assert!((question_k_factor(0, 1600.0) - 63.0).abs() < 1e-9);
    }

    #[test]
    fn zero_accuracy_always_costs_at_least_ten() {
        // Against a far stronger question the raw change rounds to zero.
        let update = update_ratings(&input(1500.0, 2600.0, 0.0, 300, 0));
        assert_eq!(update.rating_change, -10.0);
        assert_eq!(update.new_user_rating, 1490.0);

        let update = update_ratings(&input(1500.0, 1500.0, 0.0, 0, 0));
        assert!(update.rating_change <= -10.0);
    }

    #[test]
    fn ratings_never_fall_below_the_floor() {
        let update = update_ratings(&input(1004.0, 1500.0, 0.0, 0, 0));
        assert_eq!(update.new_user_rating, RATING_FLOOR);
        assert_eq!(update.rating_change, -4.0);

        let update = update_ratings(&input(2400.0, 1001.0, 1.0, 0, 0));
        assert!(update.new_question_rating >= RATING_FLOOR);

        for user in [1000.0, 1200.0, 1500.0, 2100.0, 3000.0] {
            for question in [1000.0, 1400.0, 1900.0, 2600.0] {
                for accuracy in [0.0, 0.1, 0.5, 0.75, 1.0] {
                    for attempts in [0, 10, 100] {
                        let u = update_ratings(&input(user, question, accuracy, attempts, attempts));
                        assert!(u.new_user_rating >= RATING_FLOOR);
                        assert!(u.new_question_rating >= RATING_FLOOR);
                    }
                }
            }
        }
    }

    #[test]
    fn ratings_move_in_opposite_directions() {
        let win = update_ratings(&input(1500.0, 1600.0, 0.9, 5, 5));
        assert!(win.new_user_rating > 1500.0);
        assert!(win.new_question_rating < 1600.0);

        let loss = update_ratings(&input(1500.0, 1400.0, 0.2, 5, 5));
        assert!(loss.new_user_rating < 1500.0);
        assert!(loss.new_question_rating > 1400.0);
    }

    #[test]
    fn experience_dampens_change() {
        let fresh = update_ratings(&input(1500.0, 1500.0, 1.0, 0, 0));
        let veteran = update_ratings(&input(1500.0, 1500.0, 1.0, 100, 0));
        assert!(veteran.rating_change < fresh.rating_change);
        assert!(veteran.rating_change > 0.0);
    }

    #[test]
    fn update_is_deterministic() {
        let i = input(1623.4, 1377.9, 0.64, 12, 33);
        assert_eq!(update_ratings(&i), update_ratings(&i));
    }
}
