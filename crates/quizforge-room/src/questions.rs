//! The question bank a game plays through.

use std::sync::Arc;

use quizforge_protocol::QuestionPayload;
use serde::{Deserialize, Serialize};

use crate::RoomError;

/// A multiple-choice question with exactly one correct option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub category: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl Question {
    /// Builds a question from borrowed parts.
    pub fn new(category: &str, question: &str, options: &[&str], correct_index: usize) -> Self {
        Self {
            category: category.to_string(),
            question: question.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_index,
        }
    }

    pub fn is_correct(&self, answer_index: usize) -> bool {
        answer_index == self.correct_index
    }

    /// The client-facing form. `position` is 1-based.
    pub fn payload(&self, position: usize, total: usize) -> QuestionPayload {
        QuestionPayload {
            index: position,
            total,
            category: self.category.clone(),
            question: self.question.clone(),
            options: self.options.clone(),
        }
    }
}

/// An ordered, validated, immutable list of questions.
///
/// Cloning is cheap: every room shares the same backing slice.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Arc<[Question]>,
}

impl QuestionBank {
    pub const MIN_OPTIONS: usize = 2;
    pub const MAX_OPTIONS: usize = 4;

    /// Validates and wraps a list of questions.
    ///
    /// # Errors
    ///
    /// [`RoomError::InvalidQuestion`] if the list is empty, a question has
    /// fewer than two or more than four options, or its correct index is
    /// out of range.
    pub fn new(questions: Vec<Question>) -> Result<Self, RoomError> {
        if questions.is_empty() {
            return Err(RoomError::InvalidQuestion(
                "bank contains no questions".to_string(),
            ));
        }
        for (i, q) in questions.iter().enumerate() {
            let n = q.options.len();
            if !(Self::MIN_OPTIONS..=Self::MAX_OPTIONS).contains(&n) {
                return Err(RoomError::InvalidQuestion(format!(
                    "question {} has {n} options, expected {} to {}",
                    i + 1,
                    Self::MIN_OPTIONS,
                    Self::MAX_OPTIONS
                )));
            }
            if q.correct_index >= n {
                return Err(RoomError::InvalidQuestion(format!(
                    "question {} marks option {} correct but has only {n}",
                    i + 1,
                    q.correct_index
                )));
            }
        }
        Ok(Self {
            questions: questions.into(),
        })
    }

    /// Parses a JSON array of questions and validates it.
    ///
    /// ```rust
    /// use quizforge_room::QuestionBank;
    ///
    /// let bank = QuestionBank::from_json(r#"[
    ///     {"category": "Math", "question": "2 + 2?", "options": ["3", "4"], "correctIndex": 1}
    /// ]"#).unwrap();
    /// assert_eq!(bank.len(), 1);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, RoomError> {
        let questions: Vec<Question> = serde_json::from_str(json)
            .map_err(|e| RoomError::InvalidQuestion(format!("malformed question file: {e}")))?;
        Self::new(questions)
    }

    /// The six questions the server ships with.
    pub fn builtin() -> Self {
        const GENERAL: &str = "General knowledge";
        const FLAGS: &str = "Flags";
        const SONGS: &str = "Guess the song";

        let questions = vec![
            Question::new(
                GENERAL,
                "How many continents are there?",
                &["5", "6", "7", "8"],
                2,
            ),
            Question::new(
                GENERAL,
                "What is the largest desert in the world?",
                &["Sahara", "Gobi", "Antarctica", "Kalahari"],
                2,
            ),
            Question::new(
                FLAGS,
                "Which flag belongs to Japan?",
                &["🇩🇪", "🇯🇵", "🇧🇷", "🇺🇸"],
                1,
            ),
            Question::new(
                FLAGS,
                "Which flag belongs to Brazil?",
                &["🇫🇷", "🇮🇹", "🇧🇷", "🇨🇦"],
                2,
            ),
            Question::new(
                SONGS,
                "\"We will, we will rock you…\" Which song is it?",
                &[
                    "Bohemian Rhapsody – Queen",
                    "We Will Rock You – Queen",
                    "Thunderstruck – AC/DC",
                    "Smells Like Teen Spirit – Nirvana",
                ],
                1,
            ),
            Question::new(
                SONGS,
                "\"I'm gonna take my horse to the old town road…\" Which song is it?",
                &[
                    "Old Town Road – Lil Nas X",
                    "Bad Guy – Billie Eilish",
                    "Blinding Lights – The Weeknd",
                    "Shape of You – Ed Sheeran",
                ],
                0,
            ),
        ];

        Self {
            questions: questions.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always false for a constructed bank.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// The question at a 0-based index.
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }
}
