use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::db::types::{AssignmentStatus, TaskDifficulty};
use crate::schemas::{
    deserialize_offset_datetime_flexible, deserialize_option_offset_datetime_flexible,
};

#[derive(Debug, Deserialize, Validate)]
pub struct AssignmentCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(alias = "teacherId")]
    #[validate(length(min = 1, message = "teacher_id must not be empty"))]
    pub teacher_id: String,
    #[serde(default)]
    #[serde(alias = "groupId")]
    pub group_id: Option<String>,
    #[serde(
        default,
        alias = "startDate",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub start_date: Option<OffsetDateTime>,
    #[serde(deserialize_with = "deserialize_offset_datetime_flexible")]
    pub deadline: OffsetDateTime,
    #[serde(
        default,
        alias = "softDeadline",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub soft_deadline: Option<OffsetDateTime>,
    #[serde(default)]
    #[serde(alias = "latePenaltyPercent")]
    #[validate(range(min = 0, max = 100, message = "late_penalty_percent must be 0-100"))]
    pub late_penalty_percent: i32,
    #[serde(default)]
    #[serde(alias = "timeLimitMinutes")]
    #[validate(range(min = 1, message = "time_limit_minutes must be positive"))]
    pub time_limit_minutes: Option<i32>,
    #[serde(default)]
    #[serde(alias = "maxAttempts")]
    #[validate(range(min = 1, message = "max_attempts must be positive"))]
    pub max_attempts: Option<i32>,
    #[serde(default)]
    #[serde(alias = "cooldownMinutes")]
    #[validate(range(min = 0, message = "cooldown_minutes must be non-negative"))]
    pub cooldown_minutes: i32,
    #[serde(default = "default_true")]
    #[serde(alias = "useBestAttempt")]
    pub use_best_attempt: bool,
    #[serde(default = "default_true")]
    #[serde(alias = "showCorrectAnswers")]
    pub show_correct_answers: bool,
    #[serde(default = "default_true")]
    #[serde(alias = "showSolutions")]
    pub show_solutions: bool,
    #[serde(default)]
    #[serde(alias = "showImmediateFeedback")]
    pub show_immediate_feedback: bool,
    #[serde(default)]
    #[serde(alias = "shuffleQuestions")]
    pub shuffle_questions: bool,
    #[serde(default)]
    #[serde(alias = "questionIds")]
    pub question_ids: Vec<String>,
}

/// Criteria-based generation request. The selection is best-effort: a result
/// shorter than `target_count` is a signal, not an error.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct GenerateRequest {
    #[serde(alias = "targetCount")]
    #[validate(range(min = 1, message = "target_count must be positive"))]
    pub target_count: i32,
    #[serde(default)]
    #[serde(alias = "egeNumbers")]
    pub ege_numbers: Vec<i32>,
    #[serde(default)]
    #[serde(alias = "difficultyCounts")]
    #[validate(nested)]
    pub difficulty_counts: Vec<DifficultyQuota>,
    #[serde(default)]
    #[serde(alias = "topicCounts")]
    #[validate(nested)]
    pub topic_counts: Vec<TopicQuota>,
    #[serde(default)]
    #[serde(alias = "excludeQuestionIds")]
    pub exclude_question_ids: Vec<String>,
    /// Students whose already-solved questions are dropped from the result.
    #[serde(default)]
    #[serde(alias = "excludeSolvedBy")]
    pub exclude_solved_by: Vec<String>,
    #[serde(default)]
    #[serde(alias = "verifiedOnly")]
    pub verified_only: bool,
    #[serde(default)]
    pub shuffle: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DifficultyQuota {
    pub difficulty: TaskDifficulty,
    #[validate(range(min = 1, message = "count must be positive"))]
    pub count: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TopicQuota {
    #[serde(alias = "topicId")]
    pub topic_id: String,
    #[validate(range(min = 1, message = "count must be positive"))]
    pub count: i32,
}

#[derive(Debug, Serialize)]
pub struct GenerationReport {
    pub question_ids: Vec<String>,
    pub requested: i32,
    pub selected: i32,
    /// True when the pool ran out before `target_count` was reached.
    pub short: bool,
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub teacher_id: String,
    pub group_id: Option<String>,
    pub status: AssignmentStatus,
    pub start_date: Option<String>,
    pub deadline: String,
    pub soft_deadline: Option<String>,
    pub late_penalty_percent: i32,
    pub time_limit_minutes: Option<i32>,
    pub max_attempts: Option<i32>,
    pub cooldown_minutes: i32,
    pub use_best_attempt: bool,
    pub total_points: i32,
    pub question_count: i64,
    pub views_count: i32,
    pub started_count: i32,
    pub completed_count: i32,
    pub average_score: Option<f64>,
    pub average_time_minutes: Option<f64>,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AssignmentResponse {
    pub fn from_model(assignment: &crate::db::models::Assignment, question_count: i64) -> Self {
        use crate::core::time::format_primitive;
        Self {
            id: assignment.id.clone(),
            title: assignment.title.clone(),
            description: assignment.description.clone(),
            teacher_id: assignment.teacher_id.clone(),
            group_id: assignment.group_id.clone(),
            status: assignment.status,
            start_date: assignment.start_date.map(format_primitive),
            deadline: format_primitive(assignment.deadline),
            soft_deadline: assignment.soft_deadline.map(format_primitive),
            late_penalty_percent: assignment.late_penalty_percent,
            time_limit_minutes: assignment.time_limit_minutes,
            max_attempts: assignment.max_attempts,
            cooldown_minutes: assignment.cooldown_minutes,
            use_best_attempt: assignment.use_best_attempt,
            total_points: assignment.total_points,
            question_count,
            views_count: assignment.views_count,
            started_count: assignment.started_count,
            completed_count: assignment.completed_count,
            average_score: assignment.average_score,
            average_time_minutes: assignment.average_time_minutes,
            published_at: assignment.published_at.map(format_primitive),
            created_at: format_primitive(assignment.created_at),
            updated_at: format_primitive(assignment.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssignmentProgressResponse {
    pub assignment_id: String,
    pub student_id: String,
    pub questions_total: i64,
    pub questions_answered: i64,
    pub points_earned: i32,
    pub total_points: i32,
    pub completed: bool,
}

fn default_true() -> bool {
    true
}
