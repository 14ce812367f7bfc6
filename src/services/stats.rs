//! Incremental counter math shared by question, assignment and progress
//! statistics.

use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::errors::{map_unique_violation, EngineResult};
use crate::db::models::ProgressStats;
use crate::db::types::TopicStatus;
use crate::repositories::progress;

/// Running-average law: `avg' = (avg*n + x) / (n+1)`; with no prior samples
/// the new sample becomes the average.
pub fn running_average(current: Option<f64>, count: i64, sample: f64) -> f64 {
    if count <= 0 {
        return sample;
    }
    (current.unwrap_or(0.0) * count as f64 + sample) / (count as f64 + 1.0)
}

/// Success rate is recomputed from the raw counts every time, unlike the
/// running averages above. The two laws disagree after rounding; keeping
/// both mirrors the recorded behavior of the progress tracker.
pub fn success_rate(correct: i32, total: i32) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    f64::from(correct) / f64::from(total) * 100.0
}

pub fn classify_topic(total_attempts: i32, success_rate: f64) -> TopicStatus {
    if total_attempts == 0 {
        TopicStatus::NotStarted
    } else if total_attempts < 5 {
        TopicStatus::InProgress
    } else if success_rate >= 80.0 {
        TopicStatus::Strong
    } else if success_rate >= 60.0 {
        TopicStatus::Normal
    } else {
        TopicStatus::Weak
    }
}

/// One graded attempt folded into a progress row.
#[derive(Debug, Clone, Copy)]
pub struct AttemptSample {
    pub correct: bool,
    pub points_earned: i32,
    pub time_spent_seconds: Option<i32>,
}

pub fn apply_sample(stats: &mut ProgressStats, sample: AttemptSample, now: PrimitiveDateTime) {
    if let Some(seconds) = sample.time_spent_seconds {
        stats.average_time_seconds = Some(running_average(
            stats.average_time_seconds,
            i64::from(stats.total_attempts),
            f64::from(seconds),
        ));
    }

    stats.total_attempts += 1;
    if sample.correct {
        stats.correct_attempts += 1;
        stats.current_streak += 1;
        stats.best_streak = stats.best_streak.max(stats.current_streak);
        stats.points_earned += sample.points_earned;
    } else {
        stats.current_streak = 0;
    }
    stats.success_rate = success_rate(stats.correct_attempts, stats.total_attempts);
    stats.status = classify_topic(stats.total_attempts, stats.success_rate);
    stats.last_attempt_at = Some(now);
    stats.updated_at = now;
}

pub async fn get_progress(
    pool: &PgPool,
    student_id: &str,
    topic_id: &str,
) -> EngineResult<Option<ProgressStats>> {
    Ok(progress::find(pool, student_id, topic_id).await?)
}

/// Per-topic progress for one student, weakest topics first.
pub async fn list_progress(pool: &PgPool, student_id: &str) -> EngineResult<Vec<ProgressStats>> {
    Ok(progress::list_for_student(pool, student_id).await?)
}

/// Folds a graded attempt into the per-(student, topic) row under a row
/// lock. A lost race on the first insert surfaces as a retryable conflict.
pub async fn record_progress(
    pool: &PgPool,
    student_id: &str,
    topic_id: &str,
    sample: AttemptSample,
    now: PrimitiveDateTime,
) -> EngineResult<ProgressStats> {
    let mut tx = pool.begin().await?;

    let existing = progress::find_for_update(&mut *tx, student_id, topic_id).await?;
    let stats = match existing {
        Some(mut stats) => {
            apply_sample(&mut stats, sample, now);
            progress::save(&mut *tx, &stats).await?;
            stats
        }
        None => {
            let mut stats = ProgressStats {
                id: Uuid::new_v4().to_string(),
                student_id: student_id.to_string(),
                topic_id: topic_id.to_string(),
                total_attempts: 0,
                correct_attempts: 0,
                success_rate: 0.0,
                average_time_seconds: None,
                points_earned: 0,
                current_streak: 0,
                best_streak: 0,
                status: TopicStatus::NotStarted,
                last_attempt_at: None,
                created_at: now,
                updated_at: now,
            };
            apply_sample(&mut stats, sample, now);
            progress::insert(&mut *tx, &stats)
                .await
                .map_err(|err| map_unique_violation(err, "progress row already created"))?;
            stats
        }
    };

    tx.commit().await?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;

    fn fresh_stats() -> ProgressStats {
        let now = primitive_now_utc();
        ProgressStats {
            id: "ps1".to_string(),
            student_id: "s1".to_string(),
            topic_id: "t1".to_string(),
            total_attempts: 0,
            correct_attempts: 0,
            success_rate: 0.0,
            average_time_seconds: None,
            points_earned: 0,
            current_streak: 0,
            best_streak: 0,
            status: TopicStatus::NotStarted,
            last_attempt_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn running_average_folds_samples() {
        let first = running_average(None, 0, 80.0);
        assert_eq!(first, 80.0);
        let second = running_average(Some(first), 1, 60.0);
        assert_eq!(second, 70.0);
    }

    #[test]
    fn success_rate_recomputes_from_counts() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(3, 4), 75.0);
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(classify_topic(0, 0.0), TopicStatus::NotStarted);
        assert_eq!(classify_topic(4, 100.0), TopicStatus::InProgress);
        assert_eq!(classify_topic(5, 80.0), TopicStatus::Strong);
        assert_eq!(classify_topic(5, 79.9), TopicStatus::Normal);
        assert_eq!(classify_topic(5, 59.9), TopicStatus::Weak);
    }

    #[test]
    fn streaks_grow_and_reset() {
        let mut stats = fresh_stats();
        let now = primitive_now_utc();
        for _ in 0..3 {
            apply_sample(
                &mut stats,
                AttemptSample { correct: true, points_earned: 1, time_spent_seconds: None },
                now,
            );
        }
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.best_streak, 3);

        apply_sample(
            &mut stats,
            AttemptSample { correct: false, points_earned: 0, time_spent_seconds: None },
            now,
        );
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.best_streak, 3);
        assert_eq!(stats.total_attempts, 4);
        assert_eq!(stats.success_rate, 75.0);
    }

    #[test]
    fn incorrect_attempts_accrue_no_points() {
        let mut stats = fresh_stats();
        let now = primitive_now_utc();
        // partial credit below the correctness threshold
        apply_sample(
            &mut stats,
            AttemptSample { correct: false, points_earned: 1, time_spent_seconds: None },
            now,
        );
        assert_eq!(stats.points_earned, 0);
        assert_eq!(stats.total_attempts, 1);

        apply_sample(
            &mut stats,
            AttemptSample { correct: true, points_earned: 2, time_spent_seconds: None },
            now,
        );
        assert_eq!(stats.points_earned, 2);
    }

    #[test]
    fn average_time_uses_pre_increment_count() {
        let mut stats = fresh_stats();
        let now = primitive_now_utc();
        apply_sample(
            &mut stats,
            AttemptSample { correct: true, points_earned: 1, time_spent_seconds: Some(80) },
            now,
        );
        apply_sample(
            &mut stats,
            AttemptSample { correct: true, points_earned: 1, time_spent_seconds: Some(60) },
            now,
        );
        assert_eq!(stats.average_time_seconds, Some(70.0));
    }
}
