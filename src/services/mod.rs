pub mod ai_review;
pub mod answers;
pub mod attempts;
pub mod generator;
pub mod lifecycle;
pub mod ocr;
pub mod questions;
pub mod stats;
