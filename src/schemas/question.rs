use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Question;
use crate::db::types::{QuestionType, TaskDifficulty};

#[derive(Debug, Deserialize, Validate)]
pub struct QuestionCreate {
    #[serde(default)]
    #[serde(alias = "topicId")]
    pub topic_id: Option<String>,
    #[serde(alias = "egeNumber")]
    #[validate(range(min = 1, max = 19, message = "ege_number must be between 1 and 19"))]
    pub ege_number: i32,
    #[serde(default = "default_difficulty")]
    pub difficulty: TaskDifficulty,
    #[serde(default = "default_question_type")]
    #[serde(alias = "questionType")]
    pub question_type: QuestionType,
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
    #[validate(length(min = 1, message = "answer must not be empty"))]
    pub answer: String,
    #[serde(default)]
    #[serde(alias = "alternativeAnswers")]
    pub alternative_answers: Vec<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default = "default_points")]
    #[validate(range(min = 1, message = "points must be positive"))]
    pub points: i32,
    #[serde(default = "default_estimated_time")]
    #[serde(alias = "estimatedTimeMinutes")]
    #[validate(range(min = 1, message = "estimated_time_minutes must be positive"))]
    pub estimated_time_minutes: i32,
    #[serde(default)]
    #[serde(alias = "authorId")]
    pub author_id: Option<String>,
}

/// Every provided field replaces the current value; the update lands as a new
/// question version.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct QuestionUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "answer must not be empty"))]
    pub answer: Option<String>,
    #[serde(default)]
    #[serde(alias = "alternativeAnswers")]
    pub alternative_answers: Option<Vec<String>>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub difficulty: Option<TaskDifficulty>,
    #[serde(default)]
    #[validate(range(min = 1, message = "points must be positive"))]
    pub points: Option<i32>,
    #[serde(default)]
    #[serde(alias = "estimatedTimeMinutes")]
    #[validate(range(min = 1, message = "estimated_time_minutes must be positive"))]
    pub estimated_time_minutes: Option<i32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct QuestionSearch {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    #[serde(alias = "egeNumber")]
    #[validate(range(min = 1, max = 19, message = "ege_number must be between 1 and 19"))]
    pub ege_number: Option<i32>,
    #[serde(default)]
    pub difficulty: Option<TaskDifficulty>,
    #[serde(default)]
    #[serde(alias = "topicId")]
    pub topic_id: Option<String>,
    #[serde(default)]
    #[serde(alias = "verifiedOnly")]
    pub verified_only: bool,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
    #[serde(default)]
    #[validate(range(min = 0, message = "offset must be non-negative"))]
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub id: String,
    pub topic_id: Option<String>,
    pub ege_number: i32,
    pub difficulty: TaskDifficulty,
    pub question_type: QuestionType,
    pub content: String,
    pub answer: String,
    pub alternative_answers: Vec<String>,
    pub solution: Option<String>,
    pub hint: Option<String>,
    pub points: i32,
    pub estimated_time_minutes: i32,
    pub is_verified: bool,
    pub times_shown: i32,
    pub times_attempted: i32,
    pub times_correct: i32,
    pub average_time_seconds: Option<f64>,
    pub question_version: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Question> for QuestionResponse {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            topic_id: question.topic_id.clone(),
            ege_number: question.ege_number,
            difficulty: question.difficulty,
            question_type: question.question_type,
            content: question.content.clone(),
            answer: question.answer.clone(),
            alternative_answers: question.alternative_answers.0.clone(),
            solution: question.solution.clone(),
            hint: question.hint.clone(),
            points: question.points,
            estimated_time_minutes: question.estimated_time_minutes,
            is_verified: question.is_verified,
            times_shown: question.times_shown,
            times_attempted: question.times_attempted,
            times_correct: question.times_correct,
            average_time_seconds: question.average_time_seconds,
            question_version: question.question_version,
            created_at: format_primitive(question.created_at),
            updated_at: format_primitive(question.updated_at),
        }
    }
}

/// Student-facing view: no answer, no solution.
#[derive(Debug, Serialize)]
pub struct QuestionPublicResponse {
    pub id: String,
    pub ege_number: i32,
    pub difficulty: TaskDifficulty,
    pub question_type: QuestionType,
    pub content: String,
    pub hint: Option<String>,
    pub points: i32,
    pub estimated_time_minutes: i32,
}

impl From<&Question> for QuestionPublicResponse {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            ege_number: question.ege_number,
            difficulty: question.difficulty,
            question_type: question.question_type,
            content: question.content.clone(),
            hint: question.hint.clone(),
            points: question.points,
            estimated_time_minutes: question.estimated_time_minutes,
        }
    }
}

fn default_difficulty() -> TaskDifficulty {
    TaskDifficulty::Medium
}

fn default_question_type() -> QuestionType {
    QuestionType::ShortAnswer
}

fn default_points() -> i32 {
    1
}

fn default_estimated_time() -> i32 {
    5
}

fn default_search_limit() -> i64 {
    50
}
