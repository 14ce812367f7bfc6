use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Assignment, Question};
use crate::db::types::AssignmentStatus;
use crate::repositories::questions;

pub(crate) const COLUMNS: &str = "\
    id, title, description, teacher_id, group_id, status, start_date, deadline, \
    soft_deadline, late_penalty_percent, time_limit_minutes, max_attempts, \
    cooldown_minutes, use_best_attempt, show_correct_answers, show_solutions, \
    show_immediate_feedback, shuffle_questions, total_points, views_count, \
    started_count, completed_count, average_score, average_time_minutes, \
    reminder_sent_at, published_at, archived_at, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!("SELECT {COLUMNS} FROM assignments WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn insert(pool: &PgPool, assignment: &Assignment) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO assignments (
            id, title, description, teacher_id, group_id, status, start_date, deadline,
            soft_deadline, late_penalty_percent, time_limit_minutes, max_attempts,
            cooldown_minutes, use_best_attempt, show_correct_answers, show_solutions,
            show_immediate_feedback, shuffle_questions, total_points, views_count,
            started_count, completed_count, average_score, average_time_minutes,
            reminder_sent_at, published_at, archived_at, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
            $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29
        )",
    )
    .bind(&assignment.id)
    .bind(&assignment.title)
    .bind(&assignment.description)
    .bind(&assignment.teacher_id)
    .bind(&assignment.group_id)
    .bind(assignment.status)
    .bind(assignment.start_date)
    .bind(assignment.deadline)
    .bind(assignment.soft_deadline)
    .bind(assignment.late_penalty_percent)
    .bind(assignment.time_limit_minutes)
    .bind(assignment.max_attempts)
    .bind(assignment.cooldown_minutes)
    .bind(assignment.use_best_attempt)
    .bind(assignment.show_correct_answers)
    .bind(assignment.show_solutions)
    .bind(assignment.show_immediate_feedback)
    .bind(assignment.shuffle_questions)
    .bind(assignment.total_points)
    .bind(assignment.views_count)
    .bind(assignment.started_count)
    .bind(assignment.completed_count)
    .bind(assignment.average_score)
    .bind(assignment.average_time_minutes)
    .bind(assignment.reminder_sent_at)
    .bind(assignment.published_at)
    .bind(assignment.archived_at)
    .bind(assignment.created_at)
    .bind(assignment.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Replaces the question list of a draft. Positions follow the slice order.
pub(crate) async fn replace_questions(
    pool: &PgPool,
    assignment_id: &str,
    question_ids: &[String],
    total_points: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM assignment_questions WHERE assignment_id = $1")
        .bind(assignment_id)
        .execute(&mut *tx)
        .await?;

    for (position, question_id) in question_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO assignment_questions (assignment_id, question_id, position)
             VALUES ($1, $2, $3)",
        )
        .bind(assignment_id)
        .bind(question_id)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE assignments SET total_points = $1, updated_at = $2 WHERE id = $3")
        .bind(total_points)
        .bind(now)
        .bind(assignment_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub(crate) async fn list_questions(
    pool: &PgPool,
    assignment_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {} FROM questions q
         JOIN assignment_questions aq ON aq.question_id = q.id
         WHERE aq.assignment_id = $1
         ORDER BY aq.position",
        questions::COLUMNS
    ))
    .bind(assignment_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_questions(
    pool: &PgPool,
    assignment_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM assignment_questions WHERE assignment_id = $1")
        .bind(assignment_id)
        .fetch_one(pool)
        .await
}

/// Guarded status transition. Returns false when the row was not in
/// `expected`, which callers surface as a state conflict.
pub(crate) async fn transition(
    pool: &PgPool,
    id: &str,
    expected: &[AssignmentStatus],
    next: AssignmentStatus,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE assignments SET status = $1, updated_at = $2
         WHERE id = $3 AND status = ANY($4)",
    )
    .bind(next)
    .bind(now)
    .bind(id)
    .bind(expected)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

/// Publishes a draft and freezes its total points in the same statement. A
/// second call matches no row and leaves the frozen total untouched.
pub(crate) async fn publish(
    pool: &PgPool,
    id: &str,
    next: AssignmentStatus,
    total_points: i32,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE assignments
         SET status = $1, total_points = $2, published_at = $3, updated_at = $3
         WHERE id = $4 AND status = $5",
    )
    .bind(next)
    .bind(total_points)
    .bind(now)
    .bind(id)
    .bind(AssignmentStatus::Draft)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

pub(crate) async fn set_deadline(
    pool: &PgPool,
    id: &str,
    deadline: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query("UPDATE assignments SET deadline = $1, updated_at = $2 WHERE id = $3")
        .bind(deadline)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(updated.rows_affected() > 0)
}

pub(crate) async fn archive(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE assignments
         SET status = $1, archived_at = $2, updated_at = $2
         WHERE id = $3 AND status <> $1",
    )
    .bind(AssignmentStatus::Archived)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

pub(crate) async fn delete_draft(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM assignment_questions WHERE assignment_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let deleted = sqlx::query("DELETE FROM assignments WHERE id = $1 AND status = $2")
        .bind(id)
        .bind(AssignmentStatus::Draft)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(deleted.rows_affected() > 0)
}

pub(crate) async fn increment_views(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE assignments SET views_count = views_count + 1, updated_at = $1 WHERE id = $2")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn increment_started(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE assignments SET started_count = started_count + 1, updated_at = $1 WHERE id = $2",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Claims the one completion slot a student gets per assignment. The primary
/// key makes a repeated finish lose the insert, so the aggregates fold each
/// student exactly once.
pub(crate) async fn record_first_completion(
    pool: &PgPool,
    id: &str,
    student_id: &str,
    score: f64,
    time_minutes: Option<f64>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let inserted = sqlx::query(
        "INSERT INTO assignment_completions (
            assignment_id, student_id, score_percent, time_spent_minutes, completed_at
        ) VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (assignment_id, student_id) DO NOTHING",
    )
    .bind(id)
    .bind(student_id)
    .bind(score)
    .bind(time_minutes)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(inserted.rows_affected() > 0)
}

/// Folds one finished student into the assignment aggregates. Averages read
/// the pre-update completed_count, so the math happens in one statement.
pub(crate) async fn record_completion(
    pool: &PgPool,
    id: &str,
    score: f64,
    time_minutes: Option<f64>,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE assignments
         SET completed_count = completed_count + 1,
             average_score = (COALESCE(average_score, 0) * completed_count + $1)
                             / (completed_count + 1),
             average_time_minutes = CASE
                 WHEN $2::double precision IS NULL THEN average_time_minutes
                 ELSE (COALESCE(average_time_minutes, 0) * completed_count + $2)
                      / (completed_count + 1)
             END,
             updated_at = $3
         WHERE id = $4",
    )
    .bind(score)
    .bind(time_minutes)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn promote_scheduled(
    pool: &PgPool,
    now: PrimitiveDateTime,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "UPDATE assignments
         SET status = $1, published_at = COALESCE(published_at, $2), updated_at = $2
         WHERE status = $3 AND start_date IS NOT NULL AND start_date <= $2
         RETURNING id",
    )
    .bind(AssignmentStatus::Published)
    .bind(now)
    .bind(AssignmentStatus::Scheduled)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_published_past_deadline(
    pool: &PgPool,
    now: PrimitiveDateTime,
) -> Result<Vec<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {COLUMNS} FROM assignments WHERE status = $1 AND deadline < $2"
    ))
    .bind(AssignmentStatus::Published)
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Published assignments whose deadline falls inside the reminder window and
/// that have not been reminded yet.
pub(crate) async fn list_due_for_reminder(
    pool: &PgPool,
    now: PrimitiveDateTime,
    window_end: PrimitiveDateTime,
) -> Result<Vec<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {COLUMNS} FROM assignments
         WHERE status = $1
           AND deadline > $2
           AND deadline <= $3
           AND reminder_sent_at IS NULL"
    ))
    .bind(AssignmentStatus::Published)
    .bind(now)
    .bind(window_end)
    .fetch_all(pool)
    .await
}

/// Guarded so concurrent sweeps send at most one reminder per assignment.
pub(crate) async fn mark_reminder_sent(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE assignments SET reminder_sent_at = $1, updated_at = $1
         WHERE id = $2 AND reminder_sent_at IS NULL",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}
