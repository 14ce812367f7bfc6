//! Question bank management: authoring, versioning, verification and
//! import.

use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::core::errors::{EngineError, EngineResult};
use crate::db::models::Question;
use crate::repositories::questions;
use crate::schemas::question::{QuestionCreate, QuestionSearch, QuestionUpdate};

/// Rejects content whose LaTeX delimiters do not pair up. A `\$` escape does
/// not open math mode.
pub fn validate_markup(content: &str) -> EngineResult<()> {
    let mut dollars = 0usize;
    let mut escaped = false;
    for ch in content.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '$' => dollars += 1,
            _ => {}
        }
    }
    if dollars % 2 != 0 {
        return Err(EngineError::Validation(
            "unbalanced $ math delimiters in content".to_string(),
        ));
    }

    let begins = content.matches("\\begin{").count();
    let ends = content.matches("\\end{").count();
    if begins != ends {
        return Err(EngineError::Validation(
            "unbalanced \\begin/\\end environments in content".to_string(),
        ));
    }
    Ok(())
}

pub async fn get_question(pool: &PgPool, id: &str) -> EngineResult<Question> {
    questions::find_active_by_id(pool, id)
        .await?
        .ok_or_else(|| EngineError::not_found("question", id))
}

pub async fn create(
    pool: &PgPool,
    request: QuestionCreate,
    now: PrimitiveDateTime,
) -> EngineResult<Question> {
    request.validate()?;
    validate_markup(&request.content)?;
    if let Some(solution) = &request.solution {
        validate_markup(solution)?;
    }

    let question = Question {
        id: Uuid::new_v4().to_string(),
        topic_id: request.topic_id,
        ege_number: request.ege_number,
        difficulty: request.difficulty,
        question_type: request.question_type,
        content: request.content,
        answer: request.answer,
        alternative_answers: Json(request.alternative_answers),
        solution: request.solution,
        hint: request.hint,
        points: request.points,
        estimated_time_minutes: request.estimated_time_minutes,
        author_id: request.author_id,
        is_verified: false,
        verified_by_id: None,
        verified_at: None,
        times_shown: 0,
        times_attempted: 0,
        times_correct: 0,
        average_time_seconds: None,
        question_version: 1,
        parent_question_id: None,
        is_latest_version: true,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };
    questions::insert(pool, &question).await?;
    Ok(question)
}

/// Builds the next version of a question. Verification resets because the
/// reviewed content is gone; usage counters carry over so generation balance
/// survives the edit.
fn next_version(current: &Question, update: QuestionUpdate, now: PrimitiveDateTime) -> Question {
    Question {
        id: Uuid::new_v4().to_string(),
        content: update.content.unwrap_or_else(|| current.content.clone()),
        answer: update.answer.unwrap_or_else(|| current.answer.clone()),
        alternative_answers: update
            .alternative_answers
            .map(Json)
            .unwrap_or_else(|| current.alternative_answers.clone()),
        solution: update.solution.or_else(|| current.solution.clone()),
        hint: update.hint.or_else(|| current.hint.clone()),
        difficulty: update.difficulty.unwrap_or(current.difficulty),
        points: update.points.unwrap_or(current.points),
        estimated_time_minutes: update
            .estimated_time_minutes
            .unwrap_or(current.estimated_time_minutes),
        is_verified: false,
        verified_by_id: None,
        verified_at: None,
        question_version: current.question_version + 1,
        parent_question_id: Some(current.id.clone()),
        is_latest_version: true,
        is_deleted: false,
        created_at: now,
        updated_at: now,
        ..current.clone()
    }
}

/// Applies an update as a new question version; the old row stays for
/// attempts that already reference it.
pub async fn update(
    pool: &PgPool,
    id: &str,
    request: QuestionUpdate,
    now: PrimitiveDateTime,
) -> EngineResult<Question> {
    request.validate()?;
    if let Some(content) = &request.content {
        validate_markup(content)?;
    }
    if let Some(solution) = &request.solution {
        validate_markup(solution)?;
    }

    let current = get_question(pool, id).await?;
    let replacement = next_version(&current, request, now);
    questions::insert_new_version(pool, id, &replacement, now).await?;
    Ok(replacement)
}

pub async fn verify(
    pool: &PgPool,
    id: &str,
    verified_by: &str,
    now: PrimitiveDateTime,
) -> EngineResult<()> {
    if !questions::mark_verified(pool, id, verified_by, now).await? {
        return Err(EngineError::not_found("question", id));
    }
    Ok(())
}

pub async fn delete(pool: &PgPool, id: &str, now: PrimitiveDateTime) -> EngineResult<()> {
    if !questions::soft_delete(pool, id, now).await? {
        return Err(EngineError::not_found("question", id));
    }
    Ok(())
}

pub async fn search(
    pool: &PgPool,
    request: &QuestionSearch,
) -> EngineResult<Vec<Question>> {
    request.validate()?;
    let filter = questions::BankFilter {
        ege_number: request.ege_number,
        difficulty: request.difficulty,
        topic_id: request.topic_id.clone(),
        verified_only: request.verified_only,
    };
    let found = questions::search(
        pool,
        &filter,
        request.text.as_deref().filter(|t| !t.trim().is_empty()),
        request.limit,
        request.offset,
    )
    .await?;
    Ok(found)
}

/// Swaps the accepted alternative spellings without re-versioning; the
/// canonical answer stays put.
pub async fn set_alternative_answers(
    pool: &PgPool,
    id: &str,
    alternatives: Vec<String>,
    now: PrimitiveDateTime,
) -> EngineResult<()> {
    if alternatives.iter().any(|alt| alt.trim().is_empty()) {
        return Err(EngineError::Validation(
            "alternative answers must not be blank".to_string(),
        ));
    }
    if !questions::replace_alternative_answers(pool, id, alternatives, now).await? {
        return Err(EngineError::not_found("question", id));
    }
    Ok(())
}

/// Copies a question as fresh unverified content with zeroed counters.
pub async fn duplicate(
    pool: &PgPool,
    id: &str,
    author_id: Option<&str>,
    now: PrimitiveDateTime,
) -> EngineResult<Question> {
    let source = get_question(pool, id).await?;
    let copy = Question {
        id: Uuid::new_v4().to_string(),
        author_id: author_id.map(str::to_string).or_else(|| source.author_id.clone()),
        is_verified: false,
        verified_by_id: None,
        verified_at: None,
        times_shown: 0,
        times_attempted: 0,
        times_correct: 0,
        average_time_seconds: None,
        question_version: 1,
        parent_question_id: None,
        is_latest_version: true,
        is_deleted: false,
        created_at: now,
        updated_at: now,
        ..source
    };
    questions::insert(pool, &copy).await?;
    Ok(copy)
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<String>,
    pub failed: Vec<(usize, String)>,
}

/// Best-effort batch import. Each item validates on its own; a bad row is
/// reported and skipped, the rest land.
pub async fn import(
    pool: &PgPool,
    items: Vec<QuestionCreate>,
    now: PrimitiveDateTime,
) -> EngineResult<ImportReport> {
    let mut report = ImportReport::default();
    for (index, item) in items.into_iter().enumerate() {
        match create(pool, item, now).await {
            Ok(question) => report.imported.push(question.id),
            Err(EngineError::Database(err)) => return Err(EngineError::Database(err)),
            Err(err) => report.failed.push((index, err.to_string())),
        }
    }
    tracing::info!(
        imported = report.imported.len(),
        failed = report.failed.len(),
        "Question import finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::{QuestionType, TaskDifficulty};

    #[test]
    fn markup_accepts_paired_delimiters() {
        assert!(validate_markup("solve $x^2 = 4$").is_ok());
        assert!(validate_markup("plain text, no math").is_ok());
        assert!(validate_markup("price is \\$5").is_ok());
        assert!(validate_markup("\\begin{align}x\\end{align}").is_ok());
    }

    #[test]
    fn markup_rejects_unbalanced_delimiters() {
        assert!(validate_markup("solve $x^2 = 4").is_err());
        assert!(validate_markup("\\begin{align}x").is_err());
    }

    fn sample_question() -> Question {
        let now = crate::core::time::primitive_now_utc();
        Question {
            id: "q1".to_string(),
            topic_id: Some("t1".to_string()),
            ege_number: 5,
            difficulty: TaskDifficulty::Medium,
            question_type: QuestionType::ShortAnswer,
            content: "2+2".to_string(),
            answer: "4".to_string(),
            alternative_answers: Json(vec!["4.0".to_string()]),
            solution: Some("add".to_string()),
            hint: None,
            points: 1,
            estimated_time_minutes: 5,
            author_id: Some("a1".to_string()),
            is_verified: true,
            verified_by_id: Some("rev".to_string()),
            verified_at: Some(now),
            times_shown: 12,
            times_attempted: 9,
            times_correct: 6,
            average_time_seconds: Some(40.0),
            question_version: 3,
            parent_question_id: Some("q0".to_string()),
            is_latest_version: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn next_version_resets_verification_and_links_parent() {
        let current = sample_question();
        let now = crate::core::time::primitive_now_utc();
        let update = QuestionUpdate {
            answer: Some("четыре".to_string()),
            ..QuestionUpdate::default()
        };
        let replacement = next_version(&current, update, now);

        assert_ne!(replacement.id, current.id);
        assert_eq!(replacement.answer, "четыре");
        assert_eq!(replacement.content, current.content);
        assert_eq!(replacement.question_version, 4);
        assert_eq!(replacement.parent_question_id.as_deref(), Some("q1"));
        assert!(!replacement.is_verified);
        assert!(replacement.verified_at.is_none());
        // usage counters survive the edit
        assert_eq!(replacement.times_shown, 12);
        assert_eq!(replacement.times_attempted, 9);
    }
}
