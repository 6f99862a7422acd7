//! Driver efficiency scoring.
//!
//! Provides the five-factor weighted score calculation and the recording
//! service that persists snapshots and publishes score events.

pub mod baselines;
pub mod calculator;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use calculator::ScoreCalculator;
pub use service::{ScoreError, ScoreService};
pub use types::{AssignmentType, DriverMetrics, DriverScore, LoadAssignment, ScoreWeights};
