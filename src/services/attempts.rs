//! Per-question attempt state machine: start, submit, grading, manual
//! review, interruption and the AI-review hooks.

use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::core::errors::{map_unique_violation, EngineError, EngineResult};
use crate::db::models::{Assignment, Attempt};
use crate::db::types::{AiCheckStatus, AttemptStatus, QuestionType};
use crate::repositories::attempts::{self, GradeUpdate};
use crate::repositories::{assignments, questions};
use crate::schemas::assignment::AssignmentProgressResponse;
use crate::schemas::attempt::{AnswerSubmit, AttemptStart, GradeResponse, ScoreOverride, SolutionSubmit};
use crate::services::{answers, lifecycle, stats};

pub fn is_terminal(status: AttemptStatus) -> bool {
    matches!(status, AttemptStatus::Checked | AttemptStatus::Interrupted)
}

pub fn is_auto_gradable(question_type: QuestionType) -> bool {
    matches!(question_type, QuestionType::ShortAnswer | QuestionType::MultipleChoice)
}

/// Inclusive 50% threshold used when a reviewer sets points by hand.
pub fn correctness_from_points(points_earned: i32, max_points: i32) -> bool {
    max_points > 0 && points_earned * 2 >= max_points
}

/// Review can be forced from any submitted, checked or already-in-review
/// attempt; routing an attempt that is already there is a no-op, not an
/// error.
pub fn can_route_to_review(status: AttemptStatus) -> bool {
    matches!(
        status,
        AttemptStatus::Submitted | AttemptStatus::Checked | AttemptStatus::NeedsReview
    )
}

/// Override bookkeeping: the flag flips and the original score is saved only
/// when the reviewer's points differ from the stored value. A reviewer
/// confirming the automatic score leaves the audit fields alone, and a
/// second override keeps the first original.
fn override_audit(attempt: &Attempt, new_points: i32) -> (bool, Option<i32>) {
    if new_points == attempt.points_earned {
        (attempt.score_overridden, attempt.original_points)
    } else if attempt.score_overridden {
        (true, attempt.original_points)
    } else {
        (true, Some(attempt.points_earned))
    }
}

pub async fn get_attempt(pool: &PgPool, id: &str) -> EngineResult<Attempt> {
    attempts::find_by_id(pool, id).await?.ok_or_else(|| EngineError::not_found("attempt", id))
}

/// Starts a new attempt after the eligibility checks. The live-attempt
/// uniqueness constraint closes the count-then-insert race: a lost insert
/// surfaces as a retryable conflict, never as a duplicate attempt.
pub async fn start_attempt(
    pool: &PgPool,
    request: AttemptStart,
    now: PrimitiveDateTime,
) -> EngineResult<Attempt> {
    request.validate()?;

    let question = questions::find_active_by_id(pool, &request.question_id)
        .await?
        .ok_or_else(|| EngineError::not_found("question", request.question_id.clone()))?;

    let assignment = match &request.assignment_id {
        Some(id) => Some(lifecycle::get_assignment(pool, id).await?),
        None => None,
    };

    let prior = attempts::count_for_context(
        pool,
        &request.student_id,
        &request.question_id,
        request.assignment_id.as_deref(),
    )
    .await?;

    if let Some(assignment) = &assignment {
        let last_started = attempts::last_started_at(
            pool,
            &request.student_id,
            &request.question_id,
            request.assignment_id.as_deref(),
        )
        .await?;
        lifecycle::check_eligibility(assignment, prior, last_started, now)?;
    }

    let parent = attempts::find_live(
        pool,
        &request.student_id,
        &request.question_id,
        request.assignment_id.as_deref(),
    )
    .await?;
    if let Some(live) = parent {
        return Err(EngineError::InvalidState(format!(
            "attempt {} is still open for this question",
            live.id
        )));
    }

    let attempt = Attempt {
        id: Uuid::new_v4().to_string(),
        student_id: request.student_id,
        question_id: request.question_id,
        assignment_id: request.assignment_id,
        attempt_number: (prior + 1) as i32,
        parent_attempt_id: None,
        user_answer: None,
        normalized_answer: None,
        is_correct: None,
        partial_score: None,
        points_earned: 0,
        max_points: question.points,
        started_at: now,
        answered_at: None,
        checked_at: None,
        time_spent_seconds: None,
        status: AttemptStatus::InProgress,
        interruption_reason: None,
        is_suspicious: false,
        suspicious_reason: None,
        is_manually_checked: false,
        checked_by_id: None,
        teacher_comment: None,
        score_overridden: false,
        original_points: None,
        solution_image_url: None,
        solution_text: None,
        recognized_text: None,
        ocr_confidence: None,
        ai_check_status: None,
        ai_feedback: None,
        ai_error_type: None,
        ai_recommendations: None,
        ai_quality_score: None,
        ai_error: None,
        ai_retry_count: 0,
        ai_started_at: None,
        ai_completed_at: None,
        created_at: now,
        updated_at: now,
    };

    let attempt = link_retry_chain(pool, attempt).await?;

    attempts::insert(pool, &attempt)
        .await
        .map_err(|err| map_unique_violation(err, "another attempt start won the race"))?;

    if let Some(assignment) = &assignment {
        if attempt.attempt_number == 1 {
            assignments::increment_started(pool, &assignment.id, now).await?;
        }
    }

    Ok(attempt)
}

async fn link_retry_chain(pool: &PgPool, mut attempt: Attempt) -> EngineResult<Attempt> {
    if attempt.attempt_number <= 1 {
        return Ok(attempt);
    }
    // Retries chain to the latest finished predecessor.
    let predecessor = attempts::latest_in_context(
        pool,
        &attempt.student_id,
        &attempt.question_id,
        attempt.assignment_id.as_deref(),
    )
    .await?;
    attempt.parent_attempt_id = predecessor.map(|p| p.id);
    Ok(attempt)
}

/// Submits a typed answer and, for auto-gradable question types, chains
/// straight into checking.
pub async fn submit_answer(
    pool: &PgPool,
    attempt_id: &str,
    submission: AnswerSubmit,
    now: PrimitiveDateTime,
) -> EngineResult<GradeResponse> {
    submission.validate()?;

    let attempt = get_attempt(pool, attempt_id).await?;
    if attempt.status != AttemptStatus::InProgress {
        return Err(EngineError::InvalidState(format!(
            "attempt {attempt_id} is {:?}, answers are accepted only in progress",
            attempt.status
        )));
    }

    let time_spent = submission
        .time_spent_seconds
        .or_else(|| elapsed_seconds(attempt.started_at, now));

    if !attempts::record_submission(
        pool,
        attempt_id,
        Some(&submission.answer),
        None,
        None,
        time_spent,
        now,
    )
    .await?
    {
        return Err(EngineError::Conflict(format!(
            "attempt {attempt_id} was modified concurrently"
        )));
    }

    check_answer(pool, attempt_id, now).await
}

/// Submits long-form work (text and/or an image) for review.
pub async fn submit_solution(
    pool: &PgPool,
    attempt_id: &str,
    submission: SolutionSubmit,
    now: PrimitiveDateTime,
) -> EngineResult<Attempt> {
    submission.validate()?;
    if submission.solution_text.is_none() && submission.solution_image_url.is_none() {
        return Err(EngineError::Validation(
            "solution_text or solution_image_url is required".to_string(),
        ));
    }

    let attempt = get_attempt(pool, attempt_id).await?;
    if attempt.status != AttemptStatus::InProgress {
        return Err(EngineError::InvalidState(format!(
            "attempt {attempt_id} is {:?}, solutions are accepted only in progress",
            attempt.status
        )));
    }

    let time_spent = submission
        .time_spent_seconds
        .or_else(|| elapsed_seconds(attempt.started_at, now));

    if !attempts::record_submission(
        pool,
        attempt_id,
        None,
        submission.solution_text.as_deref(),
        submission.solution_image_url.as_deref(),
        time_spent,
        now,
    )
    .await?
    {
        return Err(EngineError::Conflict(format!(
            "attempt {attempt_id} was modified concurrently"
        )));
    }

    if !attempts::mark_needs_review(pool, attempt_id, None, now).await? {
        return Err(EngineError::Conflict(format!(
            "attempt {attempt_id} was modified concurrently"
        )));
    }

    get_attempt(pool, attempt_id).await
}

/// Grades a submitted attempt. Long-form question types route to review;
/// everything else runs the matcher for a binary score. Partial credit is a
/// manual-review concern only.
pub async fn check_answer(
    pool: &PgPool,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> EngineResult<GradeResponse> {
    let attempt = get_attempt(pool, attempt_id).await?;
    if attempt.status != AttemptStatus::Submitted {
        return Err(EngineError::InvalidState(format!(
            "attempt {attempt_id} is {:?}, only submitted attempts can be checked",
            attempt.status
        )));
    }

    let question = questions::find_by_id(pool, &attempt.question_id)
        .await?
        .ok_or_else(|| EngineError::not_found("question", attempt.question_id.clone()))?;

    if !is_auto_gradable(question.question_type) {
        if !attempts::mark_needs_review(pool, attempt_id, None, now).await? {
            return Err(EngineError::Conflict(format!(
                "attempt {attempt_id} was modified concurrently"
            )));
        }
        return Ok(GradeResponse {
            attempt_id: attempt_id.to_string(),
            is_correct: false,
            points_earned: 0,
            max_points: attempt.max_points,
            correct_answer: None,
            solution: None,
        });
    }

    let raw = attempt.user_answer.clone().unwrap_or_default();
    let normalized = answers::normalize(&raw);
    let correct = answers::matches(&raw, &question.answer, &question.alternative_answers.0);

    let full_points = if correct { attempt.max_points } else { 0 };
    let assignment = match &attempt.assignment_id {
        Some(id) => Some(lifecycle::get_assignment(pool, id).await?),
        None => None,
    };

    // The late window is judged by when the answer landed, not by when this
    // check runs; a re-check after a lost race must not add a penalty.
    let answered_at = attempt.answered_at.unwrap_or(now);
    let (points_earned, original_points, overridden) =
        apply_late_policy(assignment.as_ref(), full_points, answered_at);

    let update = GradeUpdate {
        normalized_answer: Some(normalized),
        is_correct: correct,
        points_earned,
        original_points,
        score_overridden: overridden,
    };

    if !attempts::apply_grade(pool, attempt_id, &update, now).await? {
        return Err(EngineError::Conflict(format!(
            "attempt {attempt_id} was checked concurrently"
        )));
    }

    questions::record_attempt_outcome(
        pool,
        &question.id,
        correct,
        attempt.time_spent_seconds,
        now,
    )
    .await?;

    if let Some(topic_id) = &question.topic_id {
        let sample = stats::AttemptSample {
            correct,
            points_earned,
            time_spent_seconds: attempt.time_spent_seconds,
        };
        stats::record_progress(pool, &attempt.student_id, topic_id, sample, now).await?;
    }

    let show = assignment.as_ref().map_or(true, |a| a.show_correct_answers);
    let show_solution = assignment.as_ref().map_or(true, |a| a.show_solutions);
    Ok(GradeResponse {
        attempt_id: attempt_id.to_string(),
        is_correct: correct,
        points_earned,
        max_points: attempt.max_points,
        correct_answer: show.then(|| question.answer.clone()),
        solution: if show_solution { question.solution.clone() } else { None },
    })
}

/// When the submission lands between the soft and hard deadlines, the late
/// penalty rewrites the score and keeps the original for audit.
fn apply_late_policy(
    assignment: Option<&Assignment>,
    points_earned: i32,
    answered_at: PrimitiveDateTime,
) -> (i32, Option<i32>, bool) {
    let Some(assignment) = assignment else {
        return (points_earned, None, false);
    };
    if !lifecycle::is_late(assignment, answered_at) || assignment.late_penalty_percent <= 0 {
        return (points_earned, None, false);
    }
    let penalty = lifecycle::late_penalty(points_earned, assignment.late_penalty_percent);
    if penalty == 0 {
        return (points_earned, None, false);
    }
    (points_earned - penalty, Some(points_earned), true)
}

/// Reviewer override: sets points, derives correctness at the inclusive 50%
/// boundary, keeps the prior score when it changes.
pub async fn manual_check(
    pool: &PgPool,
    attempt_id: &str,
    review: ScoreOverride,
    now: PrimitiveDateTime,
) -> EngineResult<Attempt> {
    review.validate()?;

    let attempt = get_attempt(pool, attempt_id).await?;
    if attempt.status == AttemptStatus::InProgress || attempt.status == AttemptStatus::Interrupted {
        return Err(EngineError::InvalidState(format!(
            "attempt {attempt_id} is {:?}, manual check needs a submitted attempt",
            attempt.status
        )));
    }
    if review.points_earned > attempt.max_points {
        return Err(EngineError::Validation(format!(
            "points_earned {} exceeds max_points {}",
            review.points_earned, attempt.max_points
        )));
    }

    let correct = correctness_from_points(review.points_earned, attempt.max_points);
    let (overridden, original_points) = override_audit(&attempt, review.points_earned);
    if !attempts::override_score(
        pool,
        attempt_id,
        review.points_earned,
        correct,
        overridden,
        original_points,
        &review.checked_by_id,
        review.comment.as_deref(),
        now,
    )
    .await?
    {
        return Err(EngineError::Conflict(format!(
            "attempt {attempt_id} was modified concurrently"
        )));
    }

    get_attempt(pool, attempt_id).await
}

/// Forces review regardless of a prior automatic verdict; the reason lands
/// in the teacher comment. Re-routing an attempt already in review succeeds.
pub async fn mark_for_review(
    pool: &PgPool,
    attempt_id: &str,
    reason: Option<&str>,
    now: PrimitiveDateTime,
) -> EngineResult<()> {
    let attempt = get_attempt(pool, attempt_id).await?;
    if !can_route_to_review(attempt.status) {
        return Err(EngineError::InvalidState(format!(
            "attempt {attempt_id} is {:?} and cannot be routed to review",
            attempt.status
        )));
    }
    if !attempts::mark_needs_review(pool, attempt_id, reason, now).await? {
        return Err(EngineError::Conflict(format!(
            "attempt {attempt_id} was modified concurrently"
        )));
    }
    Ok(())
}

/// Terminal by force; only an in-progress attempt can be interrupted.
pub async fn handle_interruption(
    pool: &PgPool,
    attempt_id: &str,
    reason: &str,
    now: PrimitiveDateTime,
) -> EngineResult<()> {
    let attempt = get_attempt(pool, attempt_id).await?;
    let elapsed = elapsed_seconds(attempt.started_at, now);
    if !attempts::interrupt_one(pool, attempt_id, reason, elapsed, now).await? {
        return Err(EngineError::InvalidState(format!(
            "attempt {attempt_id} is {:?} and cannot be interrupted",
            attempt.status
        )));
    }
    Ok(())
}

/// Antifraud flag; orthogonal to the status machine.
pub async fn mark_suspicious(
    pool: &PgPool,
    attempt_id: &str,
    reason: &str,
    now: PrimitiveDateTime,
) -> EngineResult<()> {
    if !attempts::flag_suspicious(pool, attempt_id, reason, now).await? {
        return Err(EngineError::not_found("attempt", attempt_id));
    }
    Ok(())
}

/// Aggregates a student's checked attempts for an assignment and, when every
/// question is answered, folds the result into the assignment counters.
pub async fn finish_assignment(
    pool: &PgPool,
    assignment_id: &str,
    student_id: &str,
    now: PrimitiveDateTime,
) -> EngineResult<AssignmentProgressResponse> {
    let assignment = lifecycle::get_assignment(pool, assignment_id).await?;
    let questions_total = assignments::count_questions(pool, assignment_id).await?;

    let scores = if assignment.use_best_attempt {
        attempts::best_scores_for_assignment(pool, assignment_id, student_id).await?
    } else {
        attempts::latest_scores_for_assignment(pool, assignment_id, student_id).await?
    };
    let (points_earned, questions_answered, completed) =
        completion_progress(questions_total, &scores);

    if completed {
        let score_percent = if assignment.total_points > 0 {
            f64::from(points_earned) / f64::from(assignment.total_points) * 100.0
        } else {
            0.0
        };
        let time_minutes = attempts::total_time_spent_seconds(pool, assignment_id, student_id)
            .await?
            .map(|seconds| seconds as f64 / 60.0);
        // The completion slot is claimed exactly once per student; a repeated
        // finish must not fold into the assignment aggregates again.
        if assignments::record_first_completion(
            pool,
            assignment_id,
            student_id,
            score_percent,
            time_minutes,
            now,
        )
        .await?
        {
            assignments::record_completion(pool, assignment_id, score_percent, time_minutes, now)
                .await?;
        }
    }

    Ok(AssignmentProgressResponse {
        assignment_id: assignment_id.to_string(),
        student_id: student_id.to_string(),
        questions_total,
        questions_answered,
        points_earned,
        total_points: assignment.total_points,
        completed,
    })
}

/// Queues an attempt for asynchronous AI analysis.
pub async fn request_ai_analysis(
    pool: &PgPool,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> EngineResult<()> {
    let attempt = get_attempt(pool, attempt_id).await?;
    if attempt.status != AttemptStatus::NeedsReview {
        return Err(EngineError::InvalidState(format!(
            "attempt {attempt_id} is {:?}, AI analysis applies to reviews",
            attempt.status
        )));
    }
    if attempt.ai_check_status == Some(AiCheckStatus::Completed) {
        return Ok(());
    }
    attempts::queue_ai_check(pool, attempt_id, now).await?;
    Ok(())
}

/// Applies an AI verdict; duplicate completions are no-ops thanks to the
/// guarded update.
#[allow(clippy::too_many_arguments)]
pub async fn apply_ai_result(
    pool: &PgPool,
    attempt_id: &str,
    points_earned: i32,
    feedback: Option<&str>,
    error_type: Option<&str>,
    recommendations: Option<&str>,
    quality_score: Option<i32>,
    now: PrimitiveDateTime,
) -> EngineResult<bool> {
    let attempt = get_attempt(pool, attempt_id).await?;
    let points = points_earned.clamp(0, attempt.max_points);
    let correct = correctness_from_points(points, attempt.max_points);

    let applied = attempts::complete_ai_check(
        pool,
        attempt_id,
        points,
        correct,
        feedback,
        error_type,
        recommendations,
        quality_score,
        now,
    )
    .await?;

    if applied {
        let question = questions::find_by_id(pool, &attempt.question_id)
            .await?
            .ok_or_else(|| EngineError::not_found("question", attempt.question_id.clone()))?;
        questions::record_attempt_outcome(
            pool,
            &question.id,
            correct,
            attempt.time_spent_seconds,
            now,
        )
        .await?;
        if let Some(topic_id) = &question.topic_id {
            let sample = stats::AttemptSample {
                correct,
                points_earned: points,
                time_spent_seconds: attempt.time_spent_seconds,
            };
            stats::record_progress(pool, &attempt.student_id, topic_id, sample, now).await?;
        }
    }

    Ok(applied)
}

/// AI failures never fail the attempt; they only leave state for the retry
/// sweep.
pub async fn fail_ai_analysis(
    pool: &PgPool,
    attempt_id: &str,
    error: &str,
    now: PrimitiveDateTime,
) -> EngineResult<()> {
    attempts::fail_ai_check(pool, attempt_id, error, now).await?;
    tracing::warn!(attempt_id = %attempt_id, error = %error, "AI analysis failed; left for retry");
    Ok(())
}

/// Folds per-question scores into assignment progress. Completion requires
/// at least one question and an answer for every one of them.
fn completion_progress(
    questions_total: i64,
    scores: &[(String, i32, i32)],
) -> (i32, i64, bool) {
    let points_earned: i32 = scores.iter().map(|(_, points, _)| *points).sum();
    let questions_answered = scores.len() as i64;
    let completed = questions_total > 0 && questions_answered >= questions_total;
    (points_earned, questions_answered, completed)
}

fn elapsed_seconds(started_at: PrimitiveDateTime, now: PrimitiveDateTime) -> Option<i32> {
    let seconds = (now - started_at).whole_seconds();
    if seconds < 0 {
        None
    } else {
        i32::try_from(seconds).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_checked_and_interrupted() {
        assert!(is_terminal(AttemptStatus::Checked));
        assert!(is_terminal(AttemptStatus::Interrupted));
        assert!(!is_terminal(AttemptStatus::InProgress));
        assert!(!is_terminal(AttemptStatus::Submitted));
        assert!(!is_terminal(AttemptStatus::NeedsReview));
    }

    #[test]
    fn long_answer_is_not_auto_gradable() {
        assert!(is_auto_gradable(QuestionType::ShortAnswer));
        assert!(is_auto_gradable(QuestionType::MultipleChoice));
        assert!(!is_auto_gradable(QuestionType::LongAnswer));
    }

    #[test]
    fn manual_correctness_boundary_is_inclusive() {
        assert!(correctness_from_points(5, 10));
        assert!(!correctness_from_points(4, 10));
        assert!(correctness_from_points(3, 5));
        assert!(!correctness_from_points(2, 5));
        assert!(!correctness_from_points(0, 0));
    }

    fn checked_attempt(points_earned: i32, max_points: i32) -> Attempt {
        let now = crate::core::time::primitive_now_utc();
        Attempt {
            id: "at1".to_string(),
            student_id: "s1".to_string(),
            question_id: "q1".to_string(),
            assignment_id: None,
            attempt_number: 1,
            parent_attempt_id: None,
            user_answer: Some("4".to_string()),
            normalized_answer: Some("4".to_string()),
            is_correct: Some(true),
            partial_score: None,
            points_earned,
            max_points,
            started_at: now,
            answered_at: Some(now),
            checked_at: Some(now),
            time_spent_seconds: Some(40),
            status: AttemptStatus::Checked,
            interruption_reason: None,
            is_suspicious: false,
            suspicious_reason: None,
            is_manually_checked: false,
            checked_by_id: None,
            teacher_comment: None,
            score_overridden: false,
            original_points: None,
            solution_image_url: None,
            solution_text: None,
            recognized_text: None,
            ocr_confidence: None,
            ai_check_status: None,
            ai_feedback: None,
            ai_error_type: None,
            ai_recommendations: None,
            ai_quality_score: None,
            ai_error: None,
            ai_retry_count: 0,
            ai_started_at: None,
            ai_completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn confirming_the_score_is_not_an_override() {
        let attempt = checked_attempt(2, 2);
        let (overridden, original) = override_audit(&attempt, 2);
        assert!(!overridden);
        assert_eq!(original, None);
    }

    #[test]
    fn changed_score_flags_override_and_saves_original() {
        let attempt = checked_attempt(2, 2);
        let (overridden, original) = override_audit(&attempt, 1);
        assert!(overridden);
        assert_eq!(original, Some(2));
    }

    #[test]
    fn repeated_override_keeps_the_first_original() {
        let mut attempt = checked_attempt(1, 2);
        attempt.score_overridden = true;
        attempt.original_points = Some(2);
        let (overridden, original) = override_audit(&attempt, 0);
        assert!(overridden);
        assert_eq!(original, Some(2));
    }

    #[test]
    fn review_routing_accepts_already_in_review() {
        assert!(can_route_to_review(AttemptStatus::Submitted));
        assert!(can_route_to_review(AttemptStatus::Checked));
        assert!(can_route_to_review(AttemptStatus::NeedsReview));
        assert!(!can_route_to_review(AttemptStatus::InProgress));
        assert!(!can_route_to_review(AttemptStatus::Interrupted));
    }

    #[test]
    fn completion_requires_every_question_answered() {
        let scores = vec![("q1".to_string(), 2, 2), ("q2".to_string(), 0, 1)];
        assert_eq!(completion_progress(3, &scores), (2, 2, false));
        assert_eq!(completion_progress(2, &scores), (2, 2, true));
        assert_eq!(completion_progress(0, &[]), (0, 0, false));
    }

    #[test]
    fn elapsed_seconds_never_negative() {
        let now = crate::core::time::primitive_now_utc();
        let later = now + time::Duration::seconds(90);
        assert_eq!(elapsed_seconds(now, later), Some(90));
        assert_eq!(elapsed_seconds(later, now), None);
    }

    fn penalized_assignment(now: time::PrimitiveDateTime) -> Assignment {
        use crate::db::types::AssignmentStatus;
        Assignment {
            id: "a1".to_string(),
            title: "t".to_string(),
            description: None,
            teacher_id: "t1".to_string(),
            group_id: None,
            status: AssignmentStatus::Published,
            start_date: None,
            deadline: now + time::Duration::days(2),
            soft_deadline: Some(now - time::Duration::hours(1)),
            late_penalty_percent: 20,
            time_limit_minutes: None,
            max_attempts: None,
            cooldown_minutes: 0,
            use_best_attempt: true,
            show_correct_answers: true,
            show_solutions: true,
            show_immediate_feedback: false,
            shuffle_questions: false,
            total_points: 10,
            views_count: 0,
            started_count: 0,
            completed_count: 0,
            average_score: None,
            average_time_minutes: None,
            reminder_sent_at: None,
            published_at: None,
            archived_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn late_policy_preserves_original_points() {
        let now = crate::core::time::primitive_now_utc();
        let mut assignment = penalized_assignment(now);

        let (points, original, overridden) = apply_late_policy(Some(&assignment), 10, now);
        assert_eq!(points, 8);
        assert_eq!(original, Some(10));
        assert!(overridden);

        // before the soft deadline: untouched
        assignment.soft_deadline = Some(now + time::Duration::hours(1));
        let (points, original, overridden) = apply_late_policy(Some(&assignment), 10, now);
        assert_eq!(points, 10);
        assert_eq!(original, None);
        assert!(!overridden);
    }

    #[test]
    fn late_policy_keys_on_answer_time() {
        let now = crate::core::time::primitive_now_utc();
        let mut assignment = penalized_assignment(now);
        assignment.soft_deadline = Some(now + time::Duration::minutes(30));

        // answered on time, even though grading may run after the soft
        // deadline has passed
        let answered_at = now;
        let (points, original, overridden) =
            apply_late_policy(Some(&assignment), 10, answered_at);
        assert_eq!(points, 10);
        assert_eq!(original, None);
        assert!(!overridden);

        // the same answer recorded inside the late window is penalized
        let answered_at = now + time::Duration::hours(1);
        let (points, original, overridden) =
            apply_late_policy(Some(&assignment), 10, answered_at);
        assert_eq!(points, 8);
        assert_eq!(original, Some(10));
        assert!(overridden);
    }
}
