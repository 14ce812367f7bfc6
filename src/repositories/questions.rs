use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Question;
use crate::db::types::TaskDifficulty;

pub(crate) const COLUMNS: &str = "\
    id, topic_id, ege_number, difficulty, question_type, content, answer, \
    alternative_answers, solution, hint, points, estimated_time_minutes, author_id, \
    is_verified, verified_by_id, verified_at, times_shown, times_attempted, \
    times_correct, average_time_seconds, question_version, parent_question_id, \
    is_latest_version, is_deleted, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub(crate) struct BankFilter {
    pub(crate) ege_number: Option<i32>,
    pub(crate) difficulty: Option<TaskDifficulty>,
    pub(crate) topic_id: Option<String>,
    pub(crate) verified_only: bool,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_active_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions
         WHERE id = $1 AND is_deleted = FALSE AND is_latest_version = TRUE"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn insert(pool: &PgPool, question: &Question) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO questions (
            id, topic_id, ege_number, difficulty, question_type, content, answer,
            alternative_answers, solution, hint, points, estimated_time_minutes,
            author_id, is_verified, verified_by_id, verified_at, times_shown,
            times_attempted, times_correct, average_time_seconds, question_version,
            parent_question_id, is_latest_version, is_deleted, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
            $17, $18, $19, $20, $21, $22, $23, $24, $25, $26
        )",
    )
    .bind(&question.id)
    .bind(&question.topic_id)
    .bind(question.ege_number)
    .bind(question.difficulty)
    .bind(question.question_type)
    .bind(&question.content)
    .bind(&question.answer)
    .bind(&question.alternative_answers)
    .bind(&question.solution)
    .bind(&question.hint)
    .bind(question.points)
    .bind(question.estimated_time_minutes)
    .bind(&question.author_id)
    .bind(question.is_verified)
    .bind(&question.verified_by_id)
    .bind(question.verified_at)
    .bind(question.times_shown)
    .bind(question.times_attempted)
    .bind(question.times_correct)
    .bind(question.average_time_seconds)
    .bind(question.question_version)
    .bind(&question.parent_question_id)
    .bind(question.is_latest_version)
    .bind(question.is_deleted)
    .bind(question.created_at)
    .bind(question.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Retires the previous version and inserts the replacement in one transaction.
pub(crate) async fn insert_new_version(
    pool: &PgPool,
    old_id: &str,
    replacement: &Question,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE questions SET is_latest_version = FALSE, updated_at = $1
         WHERE id = $2 AND is_latest_version = TRUE",
    )
    .bind(now)
    .bind(old_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO questions (
            id, topic_id, ege_number, difficulty, question_type, content, answer,
            alternative_answers, solution, hint, points, estimated_time_minutes,
            author_id, is_verified, verified_by_id, verified_at, times_shown,
            times_attempted, times_correct, average_time_seconds, question_version,
            parent_question_id, is_latest_version, is_deleted, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
            $17, $18, $19, $20, $21, $22, $23, $24, $25, $26
        )",
    )
    .bind(&replacement.id)
    .bind(&replacement.topic_id)
    .bind(replacement.ege_number)
    .bind(replacement.difficulty)
    .bind(replacement.question_type)
    .bind(&replacement.content)
    .bind(&replacement.answer)
    .bind(&replacement.alternative_answers)
    .bind(&replacement.solution)
    .bind(&replacement.hint)
    .bind(replacement.points)
    .bind(replacement.estimated_time_minutes)
    .bind(&replacement.author_id)
    .bind(replacement.is_verified)
    .bind(&replacement.verified_by_id)
    .bind(replacement.verified_at)
    .bind(replacement.times_shown)
    .bind(replacement.times_attempted)
    .bind(replacement.times_correct)
    .bind(replacement.average_time_seconds)
    .bind(replacement.question_version)
    .bind(&replacement.parent_question_id)
    .bind(replacement.is_latest_version)
    .bind(replacement.is_deleted)
    .bind(replacement.created_at)
    .bind(replacement.updated_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub(crate) async fn soft_delete(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE questions SET is_deleted = TRUE, updated_at = $1
         WHERE id = $2 AND is_deleted = FALSE",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

pub(crate) async fn mark_verified(
    pool: &PgPool,
    id: &str,
    verified_by: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE questions
         SET is_verified = TRUE, verified_by_id = $1, verified_at = $2, updated_at = $2
         WHERE id = $3 AND is_deleted = FALSE AND is_latest_version = TRUE",
    )
    .bind(verified_by)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

/// Pulls the candidate pool for assignment generation. Filters are optional;
/// the active/latest predicate always applies.
pub(crate) async fn list_candidates(
    pool: &PgPool,
    filter: &BankFilter,
    limit: i64,
) -> Result<Vec<Question>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {COLUMNS} FROM questions
         WHERE is_deleted = FALSE AND is_latest_version = TRUE"
    ));

    if let Some(ege_number) = filter.ege_number {
        builder.push(" AND ege_number = ");
        builder.push_bind(ege_number);
    }
    if let Some(difficulty) = filter.difficulty {
        builder.push(" AND difficulty = ");
        builder.push_bind(difficulty);
    }
    if let Some(topic_id) = &filter.topic_id {
        builder.push(" AND topic_id = ");
        builder.push_bind(topic_id.clone());
    }
    if filter.verified_only {
        builder.push(" AND is_verified = TRUE");
    }

    builder.push(" ORDER BY times_shown ASC, created_at ASC LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<Question>().fetch_all(pool).await
}

/// Paginated bank search. `text` matches the content case-insensitively.
pub(crate) async fn search(
    pool: &PgPool,
    filter: &BankFilter,
    text: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Question>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {COLUMNS} FROM questions
         WHERE is_deleted = FALSE AND is_latest_version = TRUE"
    ));

    if let Some(text) = text {
        builder.push(" AND content ILIKE ");
        builder.push_bind(format!("%{}%", text.replace('%', "\\%").replace('_', "\\_")));
    }
    if let Some(ege_number) = filter.ege_number {
        builder.push(" AND ege_number = ");
        builder.push_bind(ege_number);
    }
    if let Some(difficulty) = filter.difficulty {
        builder.push(" AND difficulty = ");
        builder.push_bind(difficulty);
    }
    if let Some(topic_id) = &filter.topic_id {
        builder.push(" AND topic_id = ");
        builder.push_bind(topic_id.clone());
    }
    if filter.verified_only {
        builder.push(" AND is_verified = TRUE");
    }

    builder.push(" ORDER BY ege_number, created_at LIMIT ");
    builder.push_bind(limit.clamp(1, 200));
    builder.push(" OFFSET ");
    builder.push_bind(offset.max(0));

    builder.build_query_as::<Question>().fetch_all(pool).await
}

pub(crate) async fn list_by_ids(
    pool: &PgPool,
    ids: &[String],
) -> Result<Vec<Question>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = ANY($1)"))
        .bind(ids)
        .fetch_all(pool)
        .await
}

pub(crate) async fn record_shown(
    pool: &PgPool,
    ids: &[String],
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    if ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "UPDATE questions SET times_shown = times_shown + 1, updated_at = $1
         WHERE id = ANY($2)",
    )
    .bind(now)
    .bind(ids)
    .execute(pool)
    .await?;
    Ok(())
}

/// Folds one graded attempt into the question counters. The running average
/// reads the pre-update counter, so the whole computation stays one statement.
pub(crate) async fn record_attempt_outcome(
    pool: &PgPool,
    id: &str,
    correct: bool,
    time_spent_seconds: Option<i32>,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE questions
         SET times_attempted = times_attempted + 1,
             times_correct = times_correct + CASE WHEN $1 THEN 1 ELSE 0 END,
             average_time_seconds = CASE
                 WHEN $2::int IS NULL THEN average_time_seconds
                 ELSE (COALESCE(average_time_seconds, 0) * times_attempted + $2::int)
                      / (times_attempted + 1)
             END,
             updated_at = $3
         WHERE id = $4",
    )
    .bind(correct)
    .bind(time_spent_seconds)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn replace_alternative_answers(
    pool: &PgPool,
    id: &str,
    alternatives: Vec<String>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE questions SET alternative_answers = $1, updated_at = $2
         WHERE id = $3 AND is_deleted = FALSE",
    )
    .bind(Json(alternatives))
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

