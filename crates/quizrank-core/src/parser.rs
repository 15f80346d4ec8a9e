//! Quiz title parser.
//!
//! Titles follow `[TYPE] [TYPE]... lesson <difficulty> (class)`, where the
//! difficulty and class groups are both optional:
//!
//! ```text
//! [READING][ART] Unit 3 <8.5> (9)   types=[READING, ART] lesson="Unit 3" difficulty=8.5 class=9
//! [MATH] Derivatives <4>            types=[MATH] lesson="Derivatives" difficulty=4
//! [MATH] Derivatives (11)           types=[MATH] lesson="Derivatives" class=11
//! [MATH] Derivatives                types=[MATH] lesson="Derivatives"
//! ```
//!
//! A title without leading type tags is rejected, which keeps the quiz out
//! of the rating pool altogether.

use serde::{Deserialize, Serialize};

use crate::error::TitleError;
use crate::model::QuestionMeta;

/// Structured metadata extracted from a quiz title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTitle {
    /// Type tags, in title order. Never empty.
    pub types: Vec<String>,
    pub lesson: Option<String>,
    pub difficulty: Option<f64>,
    pub class: Option<u32>,
}

impl ParsedTitle {
    /// Attach the parsed metadata to a quiz of a course.
    pub fn into_question_meta(self, quiz_id: &str, course_id: &str, title: &str) -> QuestionMeta {
        QuestionMeta {
            quiz_id: quiz_id.to_string(),
            course_id: course_id.to_string(),
            title: title.to_string(),
            types: self.types,
            lesson: self.lesson,
            difficulty: self.difficulty,
            class: self.class,
        }
    }
}

/// Parse a quiz title.
///
/// The grammar is applied to the text left after the leading `[TAG]`
/// tokens: a trailing `(class)` group is taken first, then a trailing
/// `<difficulty>` group, and whatever remains is the lesson name.
pub fn parse_quiz_title(title: &str) -> Result<ParsedTitle, TitleError> {
    let (types, rest) = split_type_tags(title);
    if types.is_empty() {
        return Err(TitleError::NoTypeTags);
    }

    let mut rest = rest.trim_end();

    let mut class = None;
    if let Some((head, inner)) = trailing_group(rest, '(', ')') {
        let inner = inner.trim();
        if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TitleError::InvalidClass(inner.to_string()));
        }
        let value = inner
            .parse::<u32>()
            .map_err(|_| TitleError::InvalidClass(inner.to_string()))?;
        class = Some(value);
        rest = head.trim_end();
    }

    let mut difficulty = None;
    if let Some((head, inner)) = trailing_group(rest, '<', '>') {
        let inner = inner.trim();
        let value = inner
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| TitleError::InvalidDifficulty(inner.to_string()))?;
        difficulty = Some(value);
        rest = head.trim_end();
    }

    let lesson = Some(rest.trim()).filter(|s| !s.is_empty()).map(str::to_string);

    Ok(ParsedTitle {
        types,
        lesson,
        difficulty,
        class,
    })
}

/// Split leading `[TAG]` tokens off a title. Empty tags are dropped.
fn split_type_tags(title: &str) -> (Vec<String>, &str) {
    let mut types = Vec::new();
    let mut rest = title.trim_start();

    while let Some(after_open) = rest.strip_prefix('[') {
        let Some(close) = after_open.find(']') else {
            break;
        };
        let tag = after_open[..close].trim();
        if !tag.is_empty() {
            types.push(tag.to_string());
        }
        rest = after_open[close + 1..].trim_start();
    }

    (types, rest)
}

/// If `text` ends with `close`, return the text before the matching `open`
/// and the enclosed content.
fn trailing_group(text: &str, open: char, close: char) -> Option<(&str, &str)> {
    let body = text.strip_suffix(close)?;
    let start = body.rfind(open)?;
    Some((&body[..start], &body[start + open.len_utf8()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_title_with_two_types() {
        let parsed = parse_quiz_title("[READING][ART] Unit 3 <8.5> (9)").unwrap();
        assert_eq!(parsed.types, vec!["READING", "ART"]);
        assert_eq!(parsed.lesson.as_deref(), Some("Unit 3"));
        assert_eq!(parsed.difficulty, Some(8.5));
        assert_eq!(parsed.class, Some(9));
    }

    #[test]
    fn title_without_tags_is_rejected() {
        assert_eq!(parse_quiz_title("Unit 3"), Err(TitleError::NoTypeTags));
        assert_eq!(parse_quiz_title(""), Err(TitleError::NoTypeTags));
    }

    #[test]
    fn difficulty_only() {
        let parsed = parse_quiz_title("[MATH] Giải tích 1 <4>").unwrap();
        assert_eq!(parsed.lesson.as_deref(), Some("Giải tích 1"));
        assert_eq!(parsed.difficulty, Some(4.0));
        assert_eq!(parsed.class, None);
    }

    #[test]
    fn class_only() {
        let parsed = parse_quiz_title("[MATH] Derivatives (11)").unwrap();
        assert_eq!(parsed.lesson.as_deref(), Some("Derivatives"));
        assert_eq!(parsed.difficulty, None);
        assert_eq!(parsed.class, Some(11));
    }

    #[test]
    fn lesson_only_leaves_difficulty_and_class_empty() {
        let parsed = parse_quiz_title("[Math] [Science] Giải tích 1").unwrap();
        assert_eq!(parsed.types, vec!["Math", "Science"]);
        assert_eq!(parsed.lesson.as_deref(), Some("Giải tích 1"));
        assert_eq!(parsed.difficulty, None);
        assert_eq!(parsed.class, None);
    }

    #[test]
    fn negative_and_spaced_difficulty() {
        let parsed = parse_quiz_title("[LISTENING] Part 2 < -1.5 >(10)").unwrap();
        assert_eq!(parsed.difficulty, Some(-1.5));
        assert_eq!(parsed.class, Some(10));
    }

    #[test]
    fn non_numeric_difficulty_fails() {
        assert_eq!(
            parse_quiz_title("[READING] Unit 3 <hard>"),
            Err(TitleError::InvalidDifficulty("hard".into()))
        );
        assert!(matches!(
            parse_quiz_title("[READING] Unit 3 <NaN> (9)"),
            Err(TitleError::InvalidDifficulty(_))
        ));
    }

    #[test]
    fn non_integer_class_fails() {
        assert_eq!(
            parse_quiz_title("[READING] Unit 3 (9.5)"),
            Err(TitleError::InvalidClass("9.5".into()))
        );
        assert!(matches!(
            parse_quiz_title("[READING] Unit 3 <2> (-1)"),
            Err(TitleError::InvalidClass(_))
        ));
    }

    #[test]
    fn tags_only_has_no_lesson() {
        let parsed = parse_quiz_title("[VOCABULARY]").unwrap();
        assert_eq!(parsed.types, vec!["VOCABULARY"]);
        assert_eq!(parsed.lesson, None);
    }

    #[test]
    fn empty_and_unclosed_tags() {
        let parsed = parse_quiz_title("[ ] [TECH] Robots").unwrap();
        assert_eq!(parsed.types, vec!["TECH"]);

        assert_eq!(
            parse_quiz_title("[TECH Robots"),
            Err(TitleError::NoTypeTags)
        );
    }

    #[test]
    fn brackets_after_the_lesson_are_not_tags() {
        let parsed = parse_quiz_title("[ART] Colour theory [draft]").unwrap();
        assert_eq!(parsed.types, vec!["ART"]);
        assert_eq!(parsed.lesson.as_deref(), Some("Colour theory [draft]"));
    }

    #[test]
    fn into_question_meta_keeps_fields() {
        let title = "[ART] Perspective <3> (8)";
        let meta = parse_quiz_title(title)
            .unwrap()
            .into_question_meta("42", "1136", title);
        assert_eq!(meta.quiz_id, "42");
        assert_eq!(meta.course_id, "1136");
        assert_eq!(meta.title, title);
        assert_eq!(meta.types, vec!["ART"]);
        assert_eq!(meta.class, Some(8));
    }
}
