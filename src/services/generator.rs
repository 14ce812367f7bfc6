//! Criteria-based question selection for assignment generation.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::PgPool;
use time::PrimitiveDateTime;
use validator::Validate;

use crate::core::errors::EngineResult;
use crate::db::models::{Assignment, Question};
use crate::repositories::{attempts, questions};
use crate::schemas::assignment::{AssignmentCreate, GenerateRequest, GenerationReport};
use crate::services::lifecycle;

/// Best-effort selection over a candidate snapshot. The result is at most
/// `target_count` ids, duplicate-free; it may be shorter when the pool runs
/// out. Exclusions are dropped after selection, so they can shrink the
/// result below the target.
pub fn select_questions(
    candidates: &[Question],
    criteria: &GenerateRequest,
    exclusions: &HashSet<String>,
) -> Vec<String> {
    select_with(candidates, criteria, exclusions, &mut rand::thread_rng())
}

fn select_with<R: Rng>(
    candidates: &[Question],
    criteria: &GenerateRequest,
    exclusions: &HashSet<String>,
    rng: &mut R,
) -> Vec<String> {
    let target = criteria.target_count.max(0) as usize;
    let mut selected: Vec<String> = Vec::with_capacity(target);
    let mut used: HashSet<&str> = HashSet::new();

    // 1. One random pick per explicit exam number.
    for number in &criteria.ege_numbers {
        let matching: Vec<&Question> = candidates
            .iter()
            .filter(|q| q.ege_number == *number && !used.contains(q.id.as_str()))
            .collect();
        if let Some(pick) = matching.choose(rng) {
            used.insert(pick.id.as_str());
            selected.push(pick.id.clone());
        }
    }

    // 2. Per-difficulty quotas.
    for quota in &criteria.difficulty_counts {
        let mut matching: Vec<&Question> = candidates
            .iter()
            .filter(|q| q.difficulty == quota.difficulty && !used.contains(q.id.as_str()))
            .collect();
        matching.shuffle(rng);
        for pick in matching.into_iter().take(quota.count.max(0) as usize) {
            used.insert(pick.id.as_str());
            selected.push(pick.id.clone());
        }
    }

    // 3. Per-topic quotas.
    for quota in &criteria.topic_counts {
        let mut matching: Vec<&Question> = candidates
            .iter()
            .filter(|q| {
                q.topic_id.as_deref() == Some(quota.topic_id.as_str())
                    && !used.contains(q.id.as_str())
            })
            .collect();
        matching.shuffle(rng);
        for pick in matching.into_iter().take(quota.count.max(0) as usize) {
            used.insert(pick.id.as_str());
            selected.push(pick.id.clone());
        }
    }

    // 4. Random backfill until the target or the pool is exhausted.
    if selected.len() < target {
        let mut rest: Vec<&Question> =
            candidates.iter().filter(|q| !used.contains(q.id.as_str())).collect();
        rest.shuffle(rng);
        for pick in rest {
            if selected.len() >= target {
                break;
            }
            used.insert(pick.id.as_str());
            selected.push(pick.id.clone());
        }
    }

    // 5. Exclusions are removed after selection.
    selected.retain(|id| !exclusions.contains(id));

    // 6. Final order.
    if criteria.shuffle {
        selected.shuffle(rng);
    }
    selected.truncate(target);
    selected
}

/// Loads the candidate pool, runs the selection and persists the result as a
/// draft assignment.
pub async fn generate_draft(
    pool: &PgPool,
    mut create: AssignmentCreate,
    criteria: GenerateRequest,
    now: PrimitiveDateTime,
) -> EngineResult<(Assignment, GenerationReport)> {
    criteria.validate()?;

    let filter = questions::BankFilter {
        verified_only: criteria.verified_only,
        ..questions::BankFilter::default()
    };
    let candidates = questions::list_candidates(pool, &filter, 1000).await?;

    let mut exclusions: HashSet<String> =
        criteria.exclude_question_ids.iter().cloned().collect();
    if !criteria.exclude_solved_by.is_empty() {
        let solved =
            attempts::question_ids_solved_by(pool, &criteria.exclude_solved_by).await?;
        exclusions.extend(solved);
    }

    let question_ids = select_questions(&candidates, &criteria, &exclusions);
    let selected = question_ids.len() as i32;
    let short = selected < criteria.target_count;
    if short {
        tracing::info!(
            requested = criteria.target_count,
            selected,
            "Generation pool exhausted; returning short assignment"
        );
    }

    create.question_ids = question_ids.clone();
    let assignment = lifecycle::create_assignment(pool, create, now).await?;
    questions::record_shown(pool, &question_ids, now).await?;

    let report = GenerationReport {
        question_ids,
        requested: criteria.target_count,
        selected,
        short,
    };
    Ok((assignment, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::{QuestionType, TaskDifficulty};
    use crate::schemas::assignment::DifficultyQuota;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn question(id: &str, ege_number: i32, difficulty: TaskDifficulty) -> Question {
        let now = crate::core::time::primitive_now_utc();
        Question {
            id: id.to_string(),
            topic_id: None,
            ege_number,
            difficulty,
            question_type: QuestionType::ShortAnswer,
            content: "2+2".to_string(),
            answer: "4".to_string(),
            alternative_answers: sqlx::types::Json(Vec::new()),
            solution: None,
            hint: None,
            points: 1,
            estimated_time_minutes: 5,
            author_id: None,
            is_verified: true,
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
        }
    }

    fn pool_of(count: usize) -> Vec<Question> {
        (0..count)
            .map(|i| question(&format!("q{i}"), (i % 19 + 1) as i32, TaskDifficulty::Medium))
            .collect()
    }

    fn assert_unique(ids: &[String]) {
        let set: HashSet<&String> = ids.iter().collect();
        assert_eq!(set.len(), ids.len(), "duplicate ids in {ids:?}");
    }

    #[test]
    fn sufficient_pool_yields_exact_count() {
        let pool = pool_of(40);
        let criteria = GenerateRequest { target_count: 10, ..GenerateRequest::default() };
        let mut rng = StdRng::seed_from_u64(7);
        let ids = select_with(&pool, &criteria, &HashSet::new(), &mut rng);
        assert_eq!(ids.len(), 10);
        assert_unique(&ids);
    }

    #[test]
    fn insufficient_pool_yields_short_duplicate_free_result() {
        let pool = pool_of(6);
        let criteria = GenerateRequest { target_count: 10, ..GenerateRequest::default() };
        let mut rng = StdRng::seed_from_u64(7);
        let ids = select_with(&pool, &criteria, &HashSet::new(), &mut rng);
        assert_eq!(ids.len(), 6);
        assert_unique(&ids);
    }

    #[test]
    fn explicit_exam_numbers_are_honored() {
        let mut pool = pool_of(30);
        pool.push(question("target", 19, TaskDifficulty::Hard));
        let criteria = GenerateRequest {
            target_count: 3,
            ege_numbers: vec![19, 1, 2],
            ..GenerateRequest::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let ids = select_with(&pool, &criteria, &HashSet::new(), &mut rng);
        assert_eq!(ids.len(), 3);
        assert_unique(&ids);
        let numbers: HashSet<i32> = ids
            .iter()
            .map(|id| pool.iter().find(|q| &q.id == id).map(|q| q.ege_number).unwrap_or(0))
            .collect();
        assert!(numbers.contains(&19));
        assert!(numbers.contains(&1));
        assert!(numbers.contains(&2));
    }

    #[test]
    fn difficulty_quotas_take_up_to_count() {
        let mut pool = pool_of(10);
        pool.push(question("h1", 1, TaskDifficulty::Hard));
        pool.push(question("h2", 2, TaskDifficulty::Hard));
        let criteria = GenerateRequest {
            target_count: 4,
            difficulty_counts: vec![DifficultyQuota {
                difficulty: TaskDifficulty::Hard,
                count: 3,
            }],
            ..GenerateRequest::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let ids = select_with(&pool, &criteria, &HashSet::new(), &mut rng);
        assert_eq!(ids.len(), 4);
        assert!(ids.contains(&"h1".to_string()));
        assert!(ids.contains(&"h2".to_string()));
    }

    #[test]
    fn exclusions_shrink_result_after_selection() {
        let pool = pool_of(5);
        let criteria = GenerateRequest { target_count: 5, ..GenerateRequest::default() };
        let exclusions: HashSet<String> = ["q0".to_string(), "q1".to_string()].into();
        let mut rng = StdRng::seed_from_u64(11);
        let ids = select_with(&pool, &criteria, &exclusions, &mut rng);
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains(&"q0".to_string()));
        assert!(!ids.contains(&"q1".to_string()));
    }
}
