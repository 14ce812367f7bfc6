//! Assignment status, availability and attempt-eligibility rules.

use sqlx::PgPool;
use time::{Duration, PrimitiveDateTime};
use uuid::Uuid;
use validator::Validate;

use crate::core::errors::{EngineError, EngineResult, PolicyCode};
use crate::core::time::to_primitive_utc;
use crate::db::models::Assignment;
use crate::db::types::AssignmentStatus;
use crate::repositories::{assignments, questions, study_groups};
use crate::schemas::assignment::AssignmentCreate;

pub const STALE_INTERRUPTION_REASON: &str = "timeout";

/// A published assignment inside its availability window.
pub fn is_available(assignment: &Assignment, now: PrimitiveDateTime) -> bool {
    assignment.status == AssignmentStatus::Published
        && assignment.start_date.map_or(true, |start| now >= start)
        && now <= assignment.deadline
}

/// Attempt-eligibility predicate; the reported code names the first rule
/// that failed.
pub fn check_eligibility(
    assignment: &Assignment,
    prior_attempts: i64,
    last_started_at: Option<PrimitiveDateTime>,
    now: PrimitiveDateTime,
) -> EngineResult<()> {
    if !is_available(assignment, now) {
        let code = if assignment.status == AssignmentStatus::Published
            && now > assignment.deadline
        {
            PolicyCode::DeadlinePassed
        } else {
            PolicyCode::NotAvailable
        };
        return Err(EngineError::policy(code, format!("assignment {} is not open", assignment.id)));
    }

    if let Some(max) = assignment.max_attempts {
        if prior_attempts >= i64::from(max) {
            return Err(EngineError::policy(
                PolicyCode::AttemptLimitReached,
                format!("attempt limit {max} reached"),
            ));
        }
    }

    if assignment.cooldown_minutes > 0 {
        if let Some(last) = last_started_at {
            let ready_at = last + Duration::minutes(i64::from(assignment.cooldown_minutes));
            if now < ready_at {
                return Err(EngineError::policy(
                    PolicyCode::CooldownActive,
                    format!("cooldown expires at {ready_at}"),
                ));
            }
        }
    }

    Ok(())
}

/// Penalty applied to answers landing between the soft and hard deadlines:
/// `ceil(points * percent / 100)` subtracted, never below zero.
pub fn late_penalty(points_earned: i32, penalty_percent: i32) -> i32 {
    if points_earned <= 0 || penalty_percent <= 0 {
        return 0;
    }
    let penalty = (points_earned * penalty_percent + 99) / 100;
    penalty.min(points_earned)
}

pub fn is_late(
    assignment: &Assignment,
    answered_at: PrimitiveDateTime,
) -> bool {
    match assignment.soft_deadline {
        Some(soft) => answered_at > soft && answered_at <= assignment.deadline,
        None => false,
    }
}

pub async fn get_assignment(pool: &PgPool, id: &str) -> EngineResult<Assignment> {
    assignments::find_by_id(pool, id)
        .await?
        .ok_or_else(|| EngineError::not_found("assignment", id))
}

pub async fn create_assignment(
    pool: &PgPool,
    create: AssignmentCreate,
    now: PrimitiveDateTime,
) -> EngineResult<Assignment> {
    create.validate()?;

    let deadline = to_primitive_utc(create.deadline);
    let start_date = create.start_date.map(to_primitive_utc);
    let soft_deadline = create.soft_deadline.map(to_primitive_utc);
    if let Some(soft) = soft_deadline {
        if soft > deadline {
            return Err(EngineError::Validation(
                "soft_deadline must not be after the hard deadline".to_string(),
            ));
        }
    }

    if let Some(group_id) = &create.group_id {
        if study_groups::find_by_id(pool, group_id).await?.is_none() {
            return Err(EngineError::not_found("study_group", group_id.clone()));
        }
    }

    let selected = questions::list_by_ids(pool, &create.question_ids).await?;
    if selected.len() != create.question_ids.len() {
        return Err(EngineError::Validation("question list contains unknown ids".to_string()));
    }
    let total_points: i32 = selected.iter().map(|q| q.points).sum();

    let assignment = Assignment {
        id: Uuid::new_v4().to_string(),
        title: create.title,
        description: create.description,
        teacher_id: create.teacher_id,
        group_id: create.group_id,
        status: AssignmentStatus::Draft,
        start_date,
        deadline,
        soft_deadline,
        late_penalty_percent: create.late_penalty_percent,
        time_limit_minutes: create.time_limit_minutes,
        max_attempts: create.max_attempts,
        cooldown_minutes: create.cooldown_minutes,
        use_best_attempt: create.use_best_attempt,
        show_correct_answers: create.show_correct_answers,
        show_solutions: create.show_solutions,
        show_immediate_feedback: create.show_immediate_feedback,
        shuffle_questions: create.shuffle_questions,
        total_points,
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
    };

    assignments::insert(pool, &assignment).await?;
    if !create.question_ids.is_empty() {
        assignments::replace_questions(pool, &assignment.id, &create.question_ids, total_points, now)
            .await?;
    }
    Ok(assignment)
}

/// Draft to Published, or to Scheduled when the start date is still ahead.
/// Freezes `total_points` from the current question list.
pub async fn publish(pool: &PgPool, id: &str, now: PrimitiveDateTime) -> EngineResult<Assignment> {
    let assignment = get_assignment(pool, id).await?;
    if assignment.status != AssignmentStatus::Draft {
        return Err(EngineError::InvalidState(format!(
            "assignment {id} is {:?}, only drafts can be published",
            assignment.status
        )));
    }

    let questions = assignments::list_questions(pool, id).await?;
    if questions.is_empty() {
        return Err(EngineError::Validation("cannot publish an empty assignment".to_string()));
    }
    let total_points: i32 = questions.iter().map(|q| q.points).sum();

    let next = match assignment.start_date {
        Some(start) if start > now => AssignmentStatus::Scheduled,
        _ => AssignmentStatus::Published,
    };

    if !assignments::publish(pool, id, next, total_points, now).await? {
        return Err(EngineError::InvalidState(format!("assignment {id} is no longer a draft")));
    }
    get_assignment(pool, id).await
}

/// Terminal; allowed from any state except archived itself.
/// Counts a student opening the assignment; separate from attempt starts.
pub async fn record_view(pool: &PgPool, id: &str, now: PrimitiveDateTime) -> EngineResult<()> {
    get_assignment(pool, id).await?;
    assignments::increment_views(pool, id, now).await?;
    Ok(())
}

pub async fn archive(pool: &PgPool, id: &str, now: PrimitiveDateTime) -> EngineResult<()> {
    let assignment = get_assignment(pool, id).await?;
    if assignment.status == AssignmentStatus::Archived {
        return Err(EngineError::InvalidState(format!("assignment {id} is already archived")));
    }
    if !assignments::archive(pool, id, now).await? {
        return Err(EngineError::Conflict(format!("assignment {id} archived concurrently")));
    }
    Ok(())
}

pub async fn extend_deadline(
    pool: &PgPool,
    id: &str,
    new_deadline: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> EngineResult<()> {
    let assignment = get_assignment(pool, id).await?;
    if assignment.status == AssignmentStatus::Archived {
        return Err(EngineError::InvalidState(format!("assignment {id} is archived")));
    }
    if new_deadline <= assignment.deadline {
        return Err(EngineError::Validation(
            "new deadline must be after the current one".to_string(),
        ));
    }
    assignments::set_deadline(pool, id, new_deadline, now).await?;
    Ok(())
}

/// Copy as a fresh draft, optionally retargeted; counters reset.
pub async fn duplicate(
    pool: &PgPool,
    id: &str,
    new_group_id: Option<String>,
    new_deadline: Option<PrimitiveDateTime>,
    now: PrimitiveDateTime,
) -> EngineResult<Assignment> {
    let source = get_assignment(pool, id).await?;
    let question_ids: Vec<String> =
        assignments::list_questions(pool, id).await?.into_iter().map(|q| q.id).collect();

    let copy = Assignment {
        id: Uuid::new_v4().to_string(),
        title: format!("{} (копия)", source.title),
        status: AssignmentStatus::Draft,
        group_id: new_group_id.or(source.group_id),
        deadline: new_deadline.unwrap_or(source.deadline),
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
        ..source
    };

    assignments::insert(pool, &copy).await?;
    if !question_ids.is_empty() {
        assignments::replace_questions(pool, &copy.id, &question_ids, copy.total_points, now)
            .await?;
    }
    Ok(copy)
}

/// Appends a question to a draft and recomputes the total.
pub async fn add_question(
    pool: &PgPool,
    assignment_id: &str,
    question_id: &str,
    now: PrimitiveDateTime,
) -> EngineResult<()> {
    let assignment = get_assignment(pool, assignment_id).await?;
    if assignment.status != AssignmentStatus::Draft {
        return Err(EngineError::InvalidState(format!(
            "assignment {assignment_id} is not a draft"
        )));
    }
    let question = questions::find_active_by_id(pool, question_id)
        .await?
        .ok_or_else(|| EngineError::not_found("question", question_id))?;

    let mut ids: Vec<String> = assignments::list_questions(pool, assignment_id)
        .await?
        .into_iter()
        .map(|q| q.id)
        .collect();
    if ids.iter().any(|id| id == question_id) {
        return Err(EngineError::Validation("question is already in the assignment".to_string()));
    }
    let total = assignment.total_points + question.points;
    ids.push(question_id.to_string());
    assignments::replace_questions(pool, assignment_id, &ids, total, now).await?;
    Ok(())
}

pub async fn remove_question(
    pool: &PgPool,
    assignment_id: &str,
    question_id: &str,
    now: PrimitiveDateTime,
) -> EngineResult<()> {
    let assignment = get_assignment(pool, assignment_id).await?;
    if assignment.status != AssignmentStatus::Draft {
        return Err(EngineError::InvalidState(format!(
            "assignment {assignment_id} is not a draft"
        )));
    }
    let current = assignments::list_questions(pool, assignment_id).await?;
    if !current.iter().any(|q| q.id == question_id) {
        return Err(EngineError::not_found("question", question_id));
    }
    let ids: Vec<String> =
        current.iter().filter(|q| q.id != question_id).map(|q| q.id.clone()).collect();
    let total: i32 = current.iter().filter(|q| q.id != question_id).map(|q| q.points).sum();
    assignments::replace_questions(pool, assignment_id, &ids, total, now).await?;
    Ok(())
}

pub async fn delete_draft(pool: &PgPool, id: &str) -> EngineResult<()> {
    let assignment = get_assignment(pool, id).await?;
    if assignment.status != AssignmentStatus::Draft {
        return Err(EngineError::InvalidState(format!("assignment {id} is not a draft")));
    }
    assignments::delete_draft(pool, id).await?;
    Ok(())
}

/// Deadline sweep: published assignments past their hard deadline become
/// completed when the whole group finished, overdue otherwise. Guarded
/// transitions keep concurrent sweeps from double-applying.
pub async fn sweep_deadlines(pool: &PgPool, now: PrimitiveDateTime) -> EngineResult<u64> {
    let expired = assignments::list_published_past_deadline(pool, now).await?;
    let mut transitioned = 0;

    for assignment in expired {
        let group_size = match &assignment.group_id {
            Some(group_id) => study_groups::student_count(pool, group_id).await?.unwrap_or(0),
            None => 0,
        };
        let everyone_done = group_size > 0 && assignment.completed_count >= group_size;
        let next =
            if everyone_done { AssignmentStatus::Completed } else { AssignmentStatus::Overdue };

        if assignments::transition(pool, &assignment.id, &[AssignmentStatus::Published], next, now)
            .await?
        {
            transitioned += 1;
            tracing::info!(assignment_id = %assignment.id, status = ?next, "Assignment left availability window");
        }
    }

    Ok(transitioned)
}

/// Promotes scheduled assignments whose start date has arrived.
pub async fn sweep_scheduled(pool: &PgPool, now: PrimitiveDateTime) -> EngineResult<u64> {
    let promoted = assignments::promote_scheduled(pool, now).await?;
    for id in &promoted {
        tracing::info!(assignment_id = %id, "Scheduled assignment published");
    }
    Ok(promoted.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;

    fn assignment(status: AssignmentStatus, now: PrimitiveDateTime) -> Assignment {
        Assignment {
            id: "a1".to_string(),
            title: "Вариант 1".to_string(),
            description: None,
            teacher_id: "t1".to_string(),
            group_id: None,
            status,
            start_date: None,
            deadline: now + Duration::days(7),
            soft_deadline: None,
            late_penalty_percent: 0,
            time_limit_minutes: None,
            max_attempts: None,
            cooldown_minutes: 0,
            use_best_attempt: true,
            show_correct_answers: true,
            show_solutions: true,
            show_immediate_feedback: false,
            shuffle_questions: false,
            total_points: 0,
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
    fn availability_requires_published_inside_window() {
        let now = primitive_now_utc();
        let mut published = assignment(AssignmentStatus::Published, now);
        assert!(is_available(&published, now));

        published.start_date = Some(now + Duration::hours(1));
        assert!(!is_available(&published, now));
        assert!(is_available(&published, now + Duration::hours(2)));

        let draft = assignment(AssignmentStatus::Draft, now);
        assert!(!is_available(&draft, now));

        let past = assignment(AssignmentStatus::Published, now - Duration::days(10));
        assert!(!is_available(&past, now));
    }

    #[test]
    fn eligibility_rejects_at_attempt_limit() {
        let now = primitive_now_utc();
        let mut a = assignment(AssignmentStatus::Published, now);
        a.max_attempts = Some(3);

        assert!(check_eligibility(&a, 2, None, now).is_ok());
        let err = check_eligibility(&a, 3, None, now).unwrap_err();
        assert!(matches!(
            err,
            EngineError::PolicyViolation { code: PolicyCode::AttemptLimitReached, .. }
        ));
    }

    #[test]
    fn eligibility_rejects_inside_cooldown_window() {
        let now = primitive_now_utc();
        let mut a = assignment(AssignmentStatus::Published, now);
        a.cooldown_minutes = 30;

        let last = now - Duration::minutes(10);
        let err = check_eligibility(&a, 1, Some(last), now).unwrap_err();
        assert!(matches!(
            err,
            EngineError::PolicyViolation { code: PolicyCode::CooldownActive, .. }
        ));

        let long_ago = now - Duration::minutes(31);
        assert!(check_eligibility(&a, 1, Some(long_ago), now).is_ok());
    }

    #[test]
    fn eligibility_reports_deadline_passed() {
        let now = primitive_now_utc();
        let mut a = assignment(AssignmentStatus::Published, now);
        a.deadline = now - Duration::hours(1);
        let err = check_eligibility(&a, 0, None, now).unwrap_err();
        assert!(matches!(
            err,
            EngineError::PolicyViolation { code: PolicyCode::DeadlinePassed, .. }
        ));
    }

    #[test]
    fn late_penalty_rounds_up() {
        assert_eq!(late_penalty(10, 20), 2);
        assert_eq!(late_penalty(1, 20), 1);
        assert_eq!(late_penalty(7, 33), 3);
        assert_eq!(late_penalty(0, 50), 0);
        assert_eq!(late_penalty(5, 0), 0);
    }

    #[test]
    fn late_window_is_between_soft_and_hard_deadline() {
        let now = primitive_now_utc();
        let mut a = assignment(AssignmentStatus::Published, now);
        a.soft_deadline = Some(now + Duration::days(1));
        a.deadline = now + Duration::days(3);

        assert!(!is_late(&a, now));
        assert!(is_late(&a, now + Duration::days(2)));
        assert!(!is_late(&a, now + Duration::days(1)));
    }
}
