use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Attempt;
use crate::db::types::{AiCheckStatus, AttemptStatus};

#[derive(Debug, Deserialize, Validate)]
pub struct AttemptStart {
    #[serde(alias = "studentId")]
    #[validate(length(min = 1, message = "student_id must not be empty"))]
    pub student_id: String,
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub question_id: String,
    #[serde(default)]
    #[serde(alias = "assignmentId")]
    pub assignment_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnswerSubmit {
    #[validate(length(min = 1, message = "answer must not be empty"))]
    pub answer: String,
    #[serde(default)]
    #[serde(alias = "timeSpentSeconds")]
    #[validate(range(min = 0, message = "time_spent_seconds must be non-negative"))]
    pub time_spent_seconds: Option<i32>,
}

/// Long-answer submission: free text, an uploaded image, or both.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct SolutionSubmit {
    #[serde(default)]
    #[serde(alias = "solutionText")]
    pub solution_text: Option<String>,
    #[serde(default)]
    #[serde(alias = "solutionImageUrl")]
    pub solution_image_url: Option<String>,
    #[serde(default)]
    #[serde(alias = "timeSpentSeconds")]
    #[validate(range(min = 0, message = "time_spent_seconds must be non-negative"))]
    pub time_spent_seconds: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ScoreOverride {
    #[serde(alias = "pointsEarned")]
    #[validate(range(min = 0, message = "points_earned must be non-negative"))]
    pub points_earned: i32,
    #[serde(alias = "checkedById")]
    #[validate(length(min = 1, message = "checked_by_id must not be empty"))]
    pub checked_by_id: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    pub id: String,
    pub student_id: String,
    pub question_id: String,
    pub assignment_id: Option<String>,
    pub attempt_number: i32,
    pub status: AttemptStatus,
    pub is_correct: Option<bool>,
    pub points_earned: i32,
    pub max_points: i32,
    pub started_at: String,
    pub answered_at: Option<String>,
    pub checked_at: Option<String>,
    pub time_spent_seconds: Option<i32>,
    pub is_suspicious: bool,
    pub ai_check_status: Option<AiCheckStatus>,
    pub ai_feedback: Option<String>,
}

impl From<&Attempt> for AttemptResponse {
    fn from(attempt: &Attempt) -> Self {
        Self {
            id: attempt.id.clone(),
            student_id: attempt.student_id.clone(),
            question_id: attempt.question_id.clone(),
            assignment_id: attempt.assignment_id.clone(),
            attempt_number: attempt.attempt_number,
            status: attempt.status,
            is_correct: attempt.is_correct,
            points_earned: attempt.points_earned,
            max_points: attempt.max_points,
            started_at: format_primitive(attempt.started_at),
            answered_at: attempt.answered_at.map(format_primitive),
            checked_at: attempt.checked_at.map(format_primitive),
            time_spent_seconds: attempt.time_spent_seconds,
            is_suspicious: attempt.is_suspicious,
            ai_check_status: attempt.ai_check_status,
            ai_feedback: attempt.ai_feedback.clone(),
        }
    }
}

/// What the student sees right after a short-answer submit. Solution fields
/// obey the assignment's visibility switches.
#[derive(Debug, Serialize)]
pub struct GradeResponse {
    pub attempt_id: String,
    pub is_correct: bool,
    pub points_earned: i32,
    pub max_points: i32,
    pub correct_answer: Option<String>,
    pub solution: Option<String>,
}
