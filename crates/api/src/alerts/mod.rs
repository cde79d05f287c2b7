//! Threshold rule evaluation.

pub mod engine;

pub use engine::{EvaluationReport, ThresholdEngine};
