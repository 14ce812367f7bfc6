use sqlx::{PgConnection, PgPool};

use crate::db::models::ProgressStats;

pub(crate) const COLUMNS: &str = "\
    id, student_id, topic_id, total_attempts, correct_attempts, success_rate, \
    average_time_seconds, points_earned, current_streak, best_streak, status, \
    last_attempt_at, created_at, updated_at";

pub(crate) async fn find(
    pool: &PgPool,
    student_id: &str,
    topic_id: &str,
) -> Result<Option<ProgressStats>, sqlx::Error> {
    sqlx::query_as::<_, ProgressStats>(&format!(
        "SELECT {COLUMNS} FROM progress_stats WHERE student_id = $1 AND topic_id = $2"
    ))
    .bind(student_id)
    .bind(topic_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_for_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<ProgressStats>, sqlx::Error> {
    sqlx::query_as::<_, ProgressStats>(&format!(
        "SELECT {COLUMNS} FROM progress_stats
         WHERE student_id = $1
         ORDER BY success_rate ASC, topic_id"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

/// Row-locks the student/topic stats for the duration of the transaction.
pub(crate) async fn find_for_update(
    conn: &mut PgConnection,
    student_id: &str,
    topic_id: &str,
) -> Result<Option<ProgressStats>, sqlx::Error> {
    sqlx::query_as::<_, ProgressStats>(&format!(
        "SELECT {COLUMNS} FROM progress_stats
         WHERE student_id = $1 AND topic_id = $2
         FOR UPDATE"
    ))
    .bind(student_id)
    .bind(topic_id)
    .fetch_optional(conn)
    .await
}

pub(crate) async fn insert(
    conn: &mut PgConnection,
    stats: &ProgressStats,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO progress_stats (
            id, student_id, topic_id, total_attempts, correct_attempts, success_rate,
            average_time_seconds, points_earned, current_streak, best_streak, status,
            last_attempt_at, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(&stats.id)
    .bind(&stats.student_id)
    .bind(&stats.topic_id)
    .bind(stats.total_attempts)
    .bind(stats.correct_attempts)
    .bind(stats.success_rate)
    .bind(stats.average_time_seconds)
    .bind(stats.points_earned)
    .bind(stats.current_streak)
    .bind(stats.best_streak)
    .bind(stats.status)
    .bind(stats.last_attempt_at)
    .bind(stats.created_at)
    .bind(stats.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn save(
    conn: &mut PgConnection,
    stats: &ProgressStats,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE progress_stats
         SET total_attempts = $1,
             correct_attempts = $2,
             success_rate = $3,
             average_time_seconds = $4,
             points_earned = $5,
             current_streak = $6,
             best_streak = $7,
             status = $8,
             last_attempt_at = $9,
             updated_at = $10
         WHERE id = $11",
    )
    .bind(stats.total_attempts)
    .bind(stats.correct_attempts)
    .bind(stats.success_rate)
    .bind(stats.average_time_seconds)
    .bind(stats.points_earned)
    .bind(stats.current_streak)
    .bind(stats.best_streak)
    .bind(stats.status)
    .bind(stats.last_attempt_at)
    .bind(stats.updated_at)
    .bind(&stats.id)
    .execute(conn)
    .await?;
    Ok(())
}
