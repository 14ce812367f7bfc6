use sqlx::PgPool;

use crate::db::models::StudyGroup;

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<StudyGroup>, sqlx::Error> {
    sqlx::query_as::<_, StudyGroup>(
        "SELECT id, title, student_count, created_at, updated_at
         FROM study_groups WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn student_count(pool: &PgPool, id: &str) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar("SELECT student_count FROM study_groups WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}
