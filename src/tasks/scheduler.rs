use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration};

use crate::core::state::AppState;
use crate::services::ai_review::AiReviewService;
use crate::services::ocr::OcrService;
use crate::tasks::{ai_worker, sweeps};

pub(crate) async fn run(state: AppState) -> Result<()> {
    let ai = AiReviewService::from_settings(state.settings())?;
    let ocr = OcrService::from_settings(state.settings())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker_count = state.settings().grading().ai_worker_concurrency;
    let mut handles = Vec::with_capacity(worker_count + 3);

    for _ in 0..worker_count {
        handles.push(tokio::spawn(review_worker(
            state.clone(),
            ai.clone(),
            ocr.clone(),
            shutdown_rx.clone(),
        )));
    }

    handles.push(tokio::spawn(status_sweep_loop(state.clone(), shutdown_rx.clone())));
    handles.push(tokio::spawn(reminder_sweep_loop(state.clone(), shutdown_rx.clone())));
    handles.push(tokio::spawn(ai_retry_loop(state.clone(), shutdown_rx.clone())));

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    Ok(())
}

async fn review_worker(
    state: AppState,
    ai: AiReviewService,
    ocr: OcrService,
    mut shutdown: watch::Receiver<bool>,
) {
    let max_retries = state.settings().ai().max_retries as i32;
    loop {
        if *shutdown.borrow() {
            break;
        }

        match ai_worker::claim_next(state.db(), max_retries).await {
            Ok(Some(attempt)) => {
                if let Err(err) = ai_worker::review_attempt(&state, &ai, &ocr, &attempt).await {
                    tracing::error!(
                        attempt_id = %attempt.id,
                        error = %err,
                        "AI review failed"
                    );
                }
                continue;
            }
            Ok(None) => {}
            Err(err) => tracing::error!(error = %err, "Failed to claim attempt for AI review"),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(Duration::from_secs(3)) => {}
        }
    }
}

async fn status_sweep_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(Duration::from_secs(state.settings().grading().sweep_interval_seconds));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = sweeps::sweep_assignment_statuses(&state).await {
                    tracing::error!(error = %err, "sweep_assignment_statuses failed");
                }
                if let Err(err) = sweeps::sweep_stale_attempts(&state).await {
                    tracing::error!(error = %err, "sweep_stale_attempts failed");
                }
            }
        }
    }
}

async fn reminder_sweep_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick =
        interval(Duration::from_secs(state.settings().grading().reminder_sweep_interval_seconds));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = sweeps::sweep_deadline_reminders(&state).await {
                    tracing::error!(error = %err, "sweep_deadline_reminders failed");
                }
            }
        }
    }
}

async fn ai_retry_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick =
        interval(Duration::from_secs(state.settings().grading().ai_retry_interval_seconds));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = sweeps::requeue_failed_ai_checks(&state).await {
                    tracing::error!(error = %err, "requeue_failed_ai_checks failed");
                }
            }
        }
    }
}
