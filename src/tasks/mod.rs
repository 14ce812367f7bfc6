pub(crate) mod ai_worker;
pub(crate) mod scheduler;
pub(crate) mod sweeps;
