//! Periodic maintenance passes over assignments and attempts.

use anyhow::{Context, Result};
use time::Duration;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories::{assignments, attempts};
use crate::services::lifecycle;

/// Publishes scheduled assignments whose window opened and settles published
/// ones past their deadline.
pub(crate) async fn sweep_assignment_statuses(state: &AppState) -> Result<()> {
    let now = primitive_now_utc();

    let promoted = lifecycle::sweep_scheduled(state.db(), now)
        .await
        .context("Failed to promote scheduled assignments")?;
    let settled = lifecycle::sweep_deadlines(state.db(), now)
        .await
        .context("Failed to settle assignments past deadline")?;

    if promoted > 0 || settled > 0 {
        tracing::info!(promoted, settled, "Assignment status sweep finished");
    }
    metrics::counter!("assignments_promoted_total").increment(promoted);
    metrics::counter!("assignments_settled_total").increment(settled);

    Ok(())
}

/// Interrupts in-progress attempts that sat idle longer than the configured
/// window.
pub(crate) async fn sweep_stale_attempts(state: &AppState) -> Result<()> {
    let now = primitive_now_utc();
    let cutoff = now - Duration::minutes(state.settings().grading().stale_attempt_minutes);

    let interrupted =
        attempts::interrupt_stale(state.db(), cutoff, lifecycle::STALE_INTERRUPTION_REASON, now)
            .await
            .context("Failed to interrupt stale attempts")?;

    if !interrupted.is_empty() {
        tracing::warn!(interrupted = interrupted.len(), "Interrupted stale attempts");
    }
    metrics::counter!("attempts_interrupted_stale_total").increment(interrupted.len() as u64);

    Ok(())
}

/// Marks assignments approaching their deadline so the notification side can
/// pick them up. The guarded update keeps reminders to one per assignment.
pub(crate) async fn sweep_deadline_reminders(state: &AppState) -> Result<()> {
    let now = primitive_now_utc();
    let window_end =
        now + Duration::hours(state.settings().grading().reminder_hours_before_deadline);

    let due = assignments::list_due_for_reminder(state.db(), now, window_end)
        .await
        .context("Failed to list assignments due for reminder")?;

    let mut sent = 0;
    for assignment in due {
        if assignments::mark_reminder_sent(state.db(), &assignment.id, now)
            .await
            .context("Failed to mark reminder as sent")?
        {
            tracing::info!(
                assignment_id = %assignment.id,
                deadline = %crate::core::time::format_primitive(assignment.deadline),
                "Deadline reminder queued"
            );
            sent += 1;
        }
    }

    metrics::counter!("deadline_reminders_sent_total").increment(sent);

    Ok(())
}

/// Puts failed AI checks back in the queue while they still have retry
/// budget.
pub(crate) async fn requeue_failed_ai_checks(state: &AppState) -> Result<()> {
    let now = primitive_now_utc();
    let max_retries = state.settings().ai().max_retries as i32;

    let requeued = attempts::requeue_failed_ai(state.db(), max_retries, now)
        .await
        .context("Failed to requeue failed AI checks")?;

    if !requeued.is_empty() {
        tracing::info!(requeued = requeued.len(), "Requeued failed AI checks");
    }
    metrics::counter!("ai_checks_requeued_total").increment(requeued.len() as u64);

    Ok(())
}
