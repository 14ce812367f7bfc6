use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Attempt;
use crate::db::types::{AiCheckStatus, AttemptStatus};

pub(crate) const COLUMNS: &str = "\
    id, student_id, question_id, assignment_id, attempt_number, parent_attempt_id, \
    user_answer, normalized_answer, is_correct, partial_score, points_earned, \
    max_points, started_at, answered_at, checked_at, time_spent_seconds, status, \
    interruption_reason, is_suspicious, suspicious_reason, is_manually_checked, \
    checked_by_id, teacher_comment, score_overridden, original_points, \
    solution_image_url, solution_text, recognized_text, ocr_confidence, \
    ai_check_status, ai_feedback, ai_error_type, ai_recommendations, \
    ai_quality_score, ai_error, ai_retry_count, ai_started_at, ai_completed_at, \
    created_at, updated_at";

#[derive(Debug, Clone)]
pub(crate) struct GradeUpdate {
    pub(crate) normalized_answer: Option<String>,
    pub(crate) is_correct: bool,
    pub(crate) points_earned: i32,
    /// Pre-penalty score, kept when a late penalty or override rewrites the
    /// earned points.
    pub(crate) original_points: Option<i32>,
    pub(crate) score_overridden: bool,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Inserting relies on the partial unique index over live attempts; a unique
/// violation here means another start won the race.
pub(crate) async fn insert(pool: &PgPool, attempt: &Attempt) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO attempts (
            id, student_id, question_id, assignment_id, attempt_number,
            parent_attempt_id, user_answer, normalized_answer, is_correct,
            partial_score, points_earned, max_points, started_at, answered_at,
            checked_at, time_spent_seconds, status, interruption_reason,
            is_suspicious, suspicious_reason, is_manually_checked, checked_by_id,
            teacher_comment, score_overridden, original_points, solution_image_url,
            solution_text, recognized_text, ocr_confidence, ai_check_status,
            ai_feedback, ai_error_type, ai_recommendations, ai_quality_score,
            ai_error, ai_retry_count, ai_started_at, ai_completed_at, created_at,
            updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
            $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30,
            $31, $32, $33, $34, $35, $36, $37, $38, $39, $40
        )",
    )
    .bind(&attempt.id)
    .bind(&attempt.student_id)
    .bind(&attempt.question_id)
    .bind(&attempt.assignment_id)
    .bind(attempt.attempt_number)
    .bind(&attempt.parent_attempt_id)
    .bind(&attempt.user_answer)
    .bind(&attempt.normalized_answer)
    .bind(attempt.is_correct)
    .bind(attempt.partial_score)
    .bind(attempt.points_earned)
    .bind(attempt.max_points)
    .bind(attempt.started_at)
    .bind(attempt.answered_at)
    .bind(attempt.checked_at)
    .bind(attempt.time_spent_seconds)
    .bind(attempt.status)
    .bind(&attempt.interruption_reason)
    .bind(attempt.is_suspicious)
    .bind(&attempt.suspicious_reason)
    .bind(attempt.is_manually_checked)
    .bind(&attempt.checked_by_id)
    .bind(&attempt.teacher_comment)
    .bind(attempt.score_overridden)
    .bind(attempt.original_points)
    .bind(&attempt.solution_image_url)
    .bind(&attempt.solution_text)
    .bind(&attempt.recognized_text)
    .bind(attempt.ocr_confidence)
    .bind(attempt.ai_check_status)
    .bind(&attempt.ai_feedback)
    .bind(&attempt.ai_error_type)
    .bind(&attempt.ai_recommendations)
    .bind(attempt.ai_quality_score)
    .bind(&attempt.ai_error)
    .bind(attempt.ai_retry_count)
    .bind(attempt.ai_started_at)
    .bind(attempt.ai_completed_at)
    .bind(attempt.created_at)
    .bind(attempt.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn count_for_context(
    pool: &PgPool,
    student_id: &str,
    question_id: &str,
    assignment_id: Option<&str>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM attempts
         WHERE student_id = $1
           AND question_id = $2
           AND assignment_id IS NOT DISTINCT FROM $3",
    )
    .bind(student_id)
    .bind(question_id)
    .bind(assignment_id)
    .fetch_one(pool)
    .await
}

/// Start time of the most recent attempt in the context; drives the
/// cooldown check.
pub(crate) async fn last_started_at(
    pool: &PgPool,
    student_id: &str,
    question_id: &str,
    assignment_id: Option<&str>,
) -> Result<Option<PrimitiveDateTime>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT MAX(started_at) FROM attempts
         WHERE student_id = $1
           AND question_id = $2
           AND assignment_id IS NOT DISTINCT FROM $3",
    )
    .bind(student_id)
    .bind(question_id)
    .bind(assignment_id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_live(
    pool: &PgPool,
    student_id: &str,
    question_id: &str,
    assignment_id: Option<&str>,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts
         WHERE student_id = $1
           AND question_id = $2
           AND assignment_id IS NOT DISTINCT FROM $3
           AND status IN ($4, $5, $6)"
    ))
    .bind(student_id)
    .bind(question_id)
    .bind(assignment_id)
    .bind(AttemptStatus::InProgress)
    .bind(AttemptStatus::Submitted)
    .bind(AttemptStatus::NeedsReview)
    .fetch_optional(pool)
    .await
}

/// Most recent attempt in the context, live or finished. New retries link to
/// it through parent_attempt_id.
pub(crate) async fn latest_in_context(
    pool: &PgPool,
    student_id: &str,
    question_id: &str,
    assignment_id: Option<&str>,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts
         WHERE student_id = $1
           AND question_id = $2
           AND assignment_id IS NOT DISTINCT FROM $3
         ORDER BY attempt_number DESC
         LIMIT 1"
    ))
    .bind(student_id)
    .bind(question_id)
    .bind(assignment_id)
    .fetch_optional(pool)
    .await
}

/// Records the raw answer and moves in_progress to submitted. Guarded, so a
/// duplicate submit or a racing sweep loses cleanly.
pub(crate) async fn record_submission(
    pool: &PgPool,
    id: &str,
    user_answer: Option<&str>,
    solution_text: Option<&str>,
    solution_image_url: Option<&str>,
    time_spent_seconds: Option<i32>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE attempts
         SET status = $1,
             user_answer = $2,
             solution_text = $3,
             solution_image_url = $4,
             time_spent_seconds = $5,
             answered_at = $6,
             updated_at = $6
         WHERE id = $7 AND status = $8",
    )
    .bind(AttemptStatus::Submitted)
    .bind(user_answer)
    .bind(solution_text)
    .bind(solution_image_url)
    .bind(time_spent_seconds)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::InProgress)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

/// Writes the grading verdict and moves submitted to checked.
pub(crate) async fn apply_grade(
    pool: &PgPool,
    id: &str,
    update: &GradeUpdate,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE attempts
         SET normalized_answer = $1,
             is_correct = $2,
             points_earned = $3,
             original_points = $4,
             score_overridden = $5,
             status = $6,
             checked_at = $7,
             updated_at = $7
         WHERE id = $8 AND status = $9",
    )
    .bind(&update.normalized_answer)
    .bind(update.is_correct)
    .bind(update.points_earned)
    .bind(update.original_points)
    .bind(update.score_overridden)
    .bind(AttemptStatus::Checked)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::Submitted)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

/// Routes an attempt to manual/AI review and queues the AI check. Allowed
/// from submitted or checked, so a reviewer can reopen an automatic verdict;
/// an attempt already in review matches too, making the call idempotent.
/// The optional reason lands in teacher_comment, and a settled AI status is
/// left alone.
pub(crate) async fn mark_needs_review(
    pool: &PgPool,
    id: &str,
    reason: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE attempts
         SET status = $1,
             ai_check_status = COALESCE(ai_check_status, $2),
             teacher_comment = COALESCE($3, teacher_comment),
             updated_at = $4
         WHERE id = $5 AND status IN ($6, $7, $1)",
    )
    .bind(AttemptStatus::NeedsReview)
    .bind(AiCheckStatus::Pending)
    .bind(reason)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::Submitted)
    .bind(AttemptStatus::Checked)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

/// Terminal interruption of a single in-progress attempt.
pub(crate) async fn interrupt_one(
    pool: &PgPool,
    id: &str,
    reason: &str,
    time_spent_seconds: Option<i32>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE attempts
         SET status = $1, interruption_reason = $2, time_spent_seconds = $3, updated_at = $4
         WHERE id = $5 AND status = $6",
    )
    .bind(AttemptStatus::Interrupted)
    .bind(reason)
    .bind(time_spent_seconds)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::InProgress)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn override_score(
    pool: &PgPool,
    id: &str,
    points_earned: i32,
    is_correct: bool,
    score_overridden: bool,
    original_points: Option<i32>,
    checked_by: &str,
    comment: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE attempts
         SET points_earned = $1,
             is_correct = $2,
             score_overridden = $3,
             original_points = $4,
             is_manually_checked = TRUE,
             checked_by_id = $5,
             teacher_comment = $6,
             status = $7,
             checked_at = $8,
             updated_at = $8
         WHERE id = $9 AND status IN ($7, $10, $11)",
    )
    .bind(points_earned)
    .bind(is_correct)
    .bind(score_overridden)
    .bind(original_points)
    .bind(checked_by)
    .bind(comment)
    .bind(AttemptStatus::Checked)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::Submitted)
    .bind(AttemptStatus::NeedsReview)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

pub(crate) async fn flag_suspicious(
    pool: &PgPool,
    id: &str,
    reason: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE attempts
         SET is_suspicious = TRUE, suspicious_reason = $1, updated_at = $2
         WHERE id = $3",
    )
    .bind(reason)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

/// Bulk-interrupts in-progress attempts older than the cutoff. Returns the
/// interrupted rows so callers can log them.
pub(crate) async fn interrupt_stale(
    pool: &PgPool,
    cutoff: PrimitiveDateTime,
    reason: &str,
    now: PrimitiveDateTime,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "UPDATE attempts
         SET status = $1, interruption_reason = $2, updated_at = $3
         WHERE status = $4 AND started_at < $5
         RETURNING id",
    )
    .bind(AttemptStatus::Interrupted)
    .bind(reason)
    .bind(now)
    .bind(AttemptStatus::InProgress)
    .bind(cutoff)
    .fetch_all(pool)
    .await
}

/// Claims the next attempt waiting for AI review. SKIP LOCKED keeps
/// concurrent workers off each other's rows.
pub(crate) async fn claim_next_for_ai(
    pool: &PgPool,
    max_retries: i32,
    now: PrimitiveDateTime,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "WITH candidate AS (
            SELECT id FROM attempts
            WHERE status = $1
              AND ai_check_status = $2
              AND ai_retry_count <= $3
            ORDER BY ai_retry_count, answered_at
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        UPDATE attempts
        SET ai_check_status = $4,
            ai_started_at = $5,
            ai_error = NULL,
            updated_at = $5
        FROM candidate
        WHERE attempts.id = candidate.id
        RETURNING {COLUMNS}"
    ))
    .bind(AttemptStatus::NeedsReview)
    .bind(AiCheckStatus::Pending)
    .bind(max_retries)
    .bind(AiCheckStatus::Processing)
    .bind(now)
    .fetch_optional(pool)
    .await
}

/// Records an AI verdict. Guarded on ai_check_status so a late or duplicate
/// worker response cannot overwrite a finished review.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn complete_ai_check(
    pool: &PgPool,
    id: &str,
    points_earned: i32,
    is_correct: bool,
    feedback: Option<&str>,
    error_type: Option<&str>,
    recommendations: Option<&str>,
    quality_score: Option<i32>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE attempts
         SET ai_check_status = $1,
             points_earned = $2,
             is_correct = $3,
             ai_feedback = $4,
             ai_error_type = $5,
             ai_recommendations = $6,
             ai_quality_score = $7,
             ai_completed_at = $8,
             status = $9,
             checked_at = $8,
             updated_at = $8
         WHERE id = $10 AND ai_check_status <> $1",
    )
    .bind(AiCheckStatus::Completed)
    .bind(points_earned)
    .bind(is_correct)
    .bind(feedback)
    .bind(error_type)
    .bind(recommendations)
    .bind(quality_score)
    .bind(now)
    .bind(AttemptStatus::Checked)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

/// (Re)queues the AI check on an attempt already sitting in review. A
/// completed or in-flight check is left alone.
pub(crate) async fn queue_ai_check(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE attempts
         SET ai_check_status = $1, ai_error = NULL, updated_at = $2
         WHERE id = $3
           AND status = $4
           AND (ai_check_status IS NULL OR ai_check_status IN ($1, $5))",
    )
    .bind(AiCheckStatus::Pending)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::NeedsReview)
    .bind(AiCheckStatus::Failed)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

pub(crate) async fn fail_ai_check(
    pool: &PgPool,
    id: &str,
    error: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE attempts
         SET ai_check_status = $1,
             ai_error = $2,
             ai_retry_count = ai_retry_count + 1,
             updated_at = $3
         WHERE id = $4 AND ai_check_status = $5",
    )
    .bind(AiCheckStatus::Failed)
    .bind(error)
    .bind(now)
    .bind(id)
    .bind(AiCheckStatus::Processing)
    .execute(pool)
    .await?;
    Ok(())
}

/// Puts failed AI checks back in the queue while they still have retry
/// budget left.
pub(crate) async fn requeue_failed_ai(
    pool: &PgPool,
    max_retries: i32,
    now: PrimitiveDateTime,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "UPDATE attempts
         SET ai_check_status = $1, ai_started_at = NULL, updated_at = $2
         WHERE ai_check_status = $3 AND ai_retry_count <= $4
         RETURNING id",
    )
    .bind(AiCheckStatus::Pending)
    .bind(now)
    .bind(AiCheckStatus::Failed)
    .bind(max_retries)
    .fetch_all(pool)
    .await
}

/// Attaches OCR output to an attempt awaiting review.
pub(crate) async fn store_ocr_result(
    pool: &PgPool,
    id: &str,
    recognized_text: &str,
    confidence: Option<f64>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE attempts
         SET recognized_text = $1, ocr_confidence = $2, updated_at = $3
         WHERE id = $4 AND status = $5",
    )
    .bind(recognized_text)
    .bind(confidence)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::NeedsReview)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

/// Questions any of the given students has already answered correctly.
pub(crate) async fn question_ids_solved_by(
    pool: &PgPool,
    student_ids: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    if student_ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT question_id FROM attempts
         WHERE student_id = ANY($1) AND is_correct = TRUE",
    )
    .bind(student_ids)
    .fetch_all(pool)
    .await
}

/// Best finished attempt per question for one student in an assignment.
pub(crate) async fn best_scores_for_assignment(
    pool: &PgPool,
    assignment_id: &str,
    student_id: &str,
) -> Result<Vec<(String, i32, i32)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i32, i32)>(
        "SELECT question_id, MAX(points_earned), MAX(max_points)
         FROM attempts
         WHERE assignment_id = $1 AND student_id = $2 AND status = $3
         GROUP BY question_id",
    )
    .bind(assignment_id)
    .bind(student_id)
    .bind(AttemptStatus::Checked)
    .fetch_all(pool)
    .await
}

/// Latest finished attempt per question (by attempt_number) for one student.
pub(crate) async fn latest_scores_for_assignment(
    pool: &PgPool,
    assignment_id: &str,
    student_id: &str,
) -> Result<Vec<(String, i32, i32)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i32, i32)>(
        "SELECT DISTINCT ON (question_id) question_id, points_earned, max_points
         FROM attempts
         WHERE assignment_id = $1 AND student_id = $2 AND status = $3
         ORDER BY question_id, attempt_number DESC",
    )
    .bind(assignment_id)
    .bind(student_id)
    .bind(AttemptStatus::Checked)
    .fetch_all(pool)
    .await
}

pub(crate) async fn total_time_spent_seconds(
    pool: &PgPool,
    assignment_id: &str,
    student_id: &str,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT SUM(time_spent_seconds)::bigint FROM attempts
         WHERE assignment_id = $1 AND student_id = $2 AND status = $3",
    )
    .bind(assignment_id)
    .bind(student_id)
    .bind(AttemptStatus::Checked)
    .fetch_one(pool)
    .await
}
