use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    AiCheckStatus, AssignmentStatus, AttemptStatus, QuestionType, TaskDifficulty, TopicStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudyGroup {
    pub id: String,
    pub title: String,
    pub student_count: i32,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: String,
    pub topic_id: Option<String>,
    pub ege_number: i32,
    pub difficulty: TaskDifficulty,
    pub question_type: QuestionType,
    pub content: String,
    pub answer: String,
    pub alternative_answers: Json<Vec<String>>,
    pub solution: Option<String>,
    pub hint: Option<String>,
    pub points: i32,
    pub estimated_time_minutes: i32,
    pub author_id: Option<String>,
    pub is_verified: bool,
    pub verified_by_id: Option<String>,
    pub verified_at: Option<PrimitiveDateTime>,
    pub times_shown: i32,
    pub times_attempted: i32,
    pub times_correct: i32,
    pub average_time_seconds: Option<f64>,
    pub question_version: i32,
    pub parent_question_id: Option<String>,
    pub is_latest_version: bool,
    pub is_deleted: bool,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub teacher_id: String,
    pub group_id: Option<String>,
    pub status: AssignmentStatus,
    pub start_date: Option<PrimitiveDateTime>,
    pub deadline: PrimitiveDateTime,
    pub soft_deadline: Option<PrimitiveDateTime>,
    pub late_penalty_percent: i32,
    pub time_limit_minutes: Option<i32>,
    pub max_attempts: Option<i32>,
    pub cooldown_minutes: i32,
    pub use_best_attempt: bool,
    pub show_correct_answers: bool,
    pub show_solutions: bool,
    pub show_immediate_feedback: bool,
    pub shuffle_questions: bool,
    pub total_points: i32,
    pub views_count: i32,
    pub started_count: i32,
    pub completed_count: i32,
    pub average_score: Option<f64>,
    pub average_time_minutes: Option<f64>,
    pub reminder_sent_at: Option<PrimitiveDateTime>,
    pub published_at: Option<PrimitiveDateTime>,
    pub archived_at: Option<PrimitiveDateTime>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssignmentQuestion {
    pub assignment_id: String,
    pub question_id: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attempt {
    pub id: String,
    pub student_id: String,
    pub question_id: String,
    pub assignment_id: Option<String>,
    pub attempt_number: i32,
    pub parent_attempt_id: Option<String>,
    pub user_answer: Option<String>,
    pub normalized_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub partial_score: Option<f64>,
    pub points_earned: i32,
    pub max_points: i32,
    pub started_at: PrimitiveDateTime,
    pub answered_at: Option<PrimitiveDateTime>,
    pub checked_at: Option<PrimitiveDateTime>,
    pub time_spent_seconds: Option<i32>,
    pub status: AttemptStatus,
    pub interruption_reason: Option<String>,
    pub is_suspicious: bool,
    pub suspicious_reason: Option<String>,
    pub is_manually_checked: bool,
    pub checked_by_id: Option<String>,
    pub teacher_comment: Option<String>,
    pub score_overridden: bool,
    pub original_points: Option<i32>,
    pub solution_image_url: Option<String>,
    pub solution_text: Option<String>,
    pub recognized_text: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub ai_check_status: Option<AiCheckStatus>,
    pub ai_feedback: Option<String>,
    pub ai_error_type: Option<String>,
    pub ai_recommendations: Option<String>,
    pub ai_quality_score: Option<i32>,
    pub ai_error: Option<String>,
    pub ai_retry_count: i32,
    pub ai_started_at: Option<PrimitiveDateTime>,
    pub ai_completed_at: Option<PrimitiveDateTime>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgressStats {
    pub id: String,
    pub student_id: String,
    pub topic_id: String,
    pub total_attempts: i32,
    pub correct_attempts: i32,
    pub success_rate: f64,
    pub average_time_seconds: Option<f64>,
    pub points_earned: i32,
    pub current_streak: i32,
    pub best_streak: i32,
    pub status: TopicStatus,
    pub last_attempt_at: Option<PrimitiveDateTime>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}
