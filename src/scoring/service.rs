//! Score recording service.
//!
//! Wraps the pure [`ScoreCalculator`] with persistence and event
//! publication: every recorded load completion appends a snapshot, announces
//! `SCORE_UPDATED`, and fires `SCORE_MILESTONE_REACHED` for each milestone
//! the total crossed upward.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::calculator::ScoreCalculator;
use super::types::{DriverMetrics, DriverScore, LoadAssignment};
use crate::events::{emit, EventEnvelope, EventSink, EventType};
use crate::storage::{Database, DatabaseError, ScoreStore};

/// Records driver scores and publishes score events.
pub struct ScoreService {
    store: ScoreStore,
    calculator: ScoreCalculator,
    sink: Arc<dyn EventSink>,
    producer: String,
    milestones: Vec<f64>,
}

impl ScoreService {
    pub fn new(
        db: Arc<Database>,
        calculator: ScoreCalculator,
        sink: Arc<dyn EventSink>,
        producer: String,
        milestones: Vec<f64>,
    ) -> Self {
        Self {
            store: ScoreStore::new(db),
            calculator,
            sink,
            producer,
            milestones,
        }
    }

    /// Score a completed load, persist the snapshot, and publish events.
    pub fn record_load_completion(
        &self,
        assignment: &LoadAssignment,
        metrics: &DriverMetrics,
    ) -> Result<DriverScore, ScoreError> {
        validate_metrics(metrics)?;

        let previous_total = self
            .store
            .latest(assignment.driver_id)?
            .map(|s| s.total_score);

        let score = self
            .calculator
            .calculate(assignment.driver_id, assignment, metrics);
        self.store.insert(&score)?;

        tracing::debug!(
            driver_id = %score.driver_id,
            total_score = score.total_score,
            "Recorded driver score"
        );

        emit(
            self.sink.as_ref(),
            EventEnvelope::new(
                EventType::ScoreUpdated,
                &self.producer,
                serde_json::json!({
                    "driver_id": score.driver_id,
                    "score_id": score.id,
                    "total_score": score.total_score,
                    "assignment_id": assignment.id,
                }),
            )
            .with_correlation(assignment.id),
        );

        for milestone in crossed_milestones(previous_total, score.total_score, &self.milestones) {
            emit(
                self.sink.as_ref(),
                EventEnvelope::new(
                    EventType::ScoreMilestoneReached,
                    &self.producer,
                    serde_json::json!({
                        "driver_id": score.driver_id,
                        "milestone": milestone,
                        "total_score": score.total_score,
                    }),
                )
                .with_correlation(assignment.id),
            );
        }

        Ok(score)
    }

    /// Most recent score for a driver.
    pub fn latest_score(&self, driver_id: Uuid) -> Result<Option<DriverScore>, ScoreError> {
        Ok(self.store.latest(driver_id)?)
    }

    /// Score history for a driver, most recent first.
    pub fn score_history(&self, driver_id: Uuid, limit: u32) -> Result<Vec<DriverScore>, ScoreError> {
        Ok(self.store.history(driver_id, limit)?)
    }

    /// Scores within a date range, ascending.
    pub fn scores_in_range(
        &self,
        driver_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DriverScore>, ScoreError> {
        Ok(self.store.in_range(driver_id, from, to)?)
    }
}

/// Milestones crossed upward between two totals.
///
/// A driver with no prior score counts as starting from zero.
pub fn crossed_milestones(previous: Option<f64>, current: f64, milestones: &[f64]) -> Vec<f64> {
    let previous = previous.unwrap_or(0.0);
    milestones
        .iter()
        .copied()
        .filter(|m| previous < *m && current >= *m)
        .collect()
}

fn validate_metrics(metrics: &DriverMetrics) -> Result<(), ScoreError> {
    if let Some(pct) = metrics.empty_miles_pct {
        if !(0.0..=1.0).contains(&pct) {
            return Err(ScoreError::Validation(format!(
                "empty_miles_pct must be within [0, 1], got {pct}"
            )));
        }
    }
    if let Some(pct) = metrics.idling_pct {
        if !(0.0..=1.0).contains(&pct) {
            return Err(ScoreError::Validation(format!(
                "idling_pct must be within [0, 1], got {pct}"
            )));
        }
    }
    Ok(())
}

/// Scoring errors.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
