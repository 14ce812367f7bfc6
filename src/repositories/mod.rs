pub(crate) mod assignments;
pub(crate) mod attempts;
pub(crate) mod progress;
pub(crate) mod questions;
pub(crate) mod study_groups;
