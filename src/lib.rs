pub mod core;
pub mod db;
pub(crate) mod repositories;
pub mod schemas;
pub mod services;
pub(crate) mod tasks;

use crate::core::{config::Settings, state::AppState, telemetry};

/// Runs the grading worker: AI review workers plus the periodic sweeps over
/// assignments and attempts.
pub async fn run_worker() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let state = AppState::new(settings, db_pool);

    tracing::info!(
        environment = %state.settings().runtime().environment.as_str(),
        ai_workers = state.settings().grading().ai_worker_concurrency,
        "Egelab grading worker starting"
    );

    tasks::scheduler::run(state).await
}
