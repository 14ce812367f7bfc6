//! AI review worker: claims one queued attempt at a time, runs OCR when the
//! solution is a photo, then asks the model for a verdict.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Attempt;
use crate::repositories::{attempts, questions};
use crate::services::ai_review::{AiReviewService, ReviewRequest};
use crate::services::ocr::OcrService;
use crate::services::attempts as attempt_service;

pub(crate) async fn claim_next(pool: &PgPool, max_retries: i32) -> Result<Option<Attempt>> {
    let now = primitive_now_utc();
    attempts::claim_next_for_ai(pool, max_retries, now)
        .await
        .context("Failed to claim attempt for AI review")
}

pub(crate) async fn review_attempt(
    state: &AppState,
    ai: &AiReviewService,
    ocr: &OcrService,
    attempt: &Attempt,
) -> Result<()> {
    match run_review(state, ai, ocr, attempt).await {
        Ok(()) => {
            metrics::counter!("ai_reviews_total", "status" => "completed").increment(1);
            Ok(())
        }
        Err(err) => {
            metrics::counter!("ai_reviews_total", "status" => "failed").increment(1);
            attempt_service::fail_ai_analysis(
                state.db(),
                &attempt.id,
                &err.to_string(),
                primitive_now_utc(),
            )
            .await
            .context("Failed to record AI review failure")?;
            Err(err)
        }
    }
}

async fn run_review(
    state: &AppState,
    ai: &AiReviewService,
    ocr: &OcrService,
    attempt: &Attempt,
) -> Result<()> {
    let question = questions::find_by_id(state.db(), &attempt.question_id)
        .await
        .context("Failed to load question for AI review")?
        .context("Question for AI review not found")?;

    let mut recognized = attempt.recognized_text.clone();
    if recognized.is_none() {
        if let Some(image_url) = &attempt.solution_image_url {
            let result = ocr
                .recognize_image_url(image_url)
                .await
                .context("OCR recognition failed")?;
            attempts::store_ocr_result(
                state.db(),
                &attempt.id,
                &result.text,
                result.confidence,
                primitive_now_utc(),
            )
            .await
            .context("Failed to store OCR result")?;
            recognized = Some(result.text);
        }
    }

    let student_solution = match (&attempt.solution_text, &recognized) {
        (Some(text), Some(ocr_text)) => format!("{text}\n\n[Распознанный текст с фото]\n{ocr_text}"),
        (Some(text), None) => text.clone(),
        (None, Some(ocr_text)) => ocr_text.clone(),
        (None, None) => anyhow::bail!("Attempt has no solution text and no recognizable image"),
    };

    let request = ReviewRequest {
        attempt_id: attempt.id.clone(),
        question_content: question.content.clone(),
        reference_answer: question.answer.clone(),
        reference_solution: question.solution.clone(),
        student_solution,
        solution_image_url: attempt.solution_image_url.clone(),
        max_points: attempt.max_points,
    };

    let verdict = ai.review_solution(request).await?;

    let applied = attempt_service::apply_ai_result(
        state.db(),
        &attempt.id,
        verdict.points_earned,
        Some(&verdict.feedback),
        Some(&verdict.error_type),
        Some(&verdict.recommendations.join("\n")),
        verdict.quality_score,
        primitive_now_utc(),
    )
    .await
    .context("Failed to apply AI verdict")?;

    if !applied {
        tracing::info!(attempt_id = %attempt.id, "AI verdict already applied; skipping");
    }

    Ok(())
}
