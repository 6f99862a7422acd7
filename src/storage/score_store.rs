//! Persistence for driver score snapshots.
//!
//! `driver_scores` is append-only: one row per calculation event, never
//! updated.

use chrono::{DateTime, Utc};
use rusqlite::params;
use std::sync::Arc;
use uuid::Uuid;

use crate::scoring::types::{DriverScore, ScoreFactors};
use crate::storage::{Database, DatabaseError};

/// Store for `driver_scores`.
pub struct ScoreStore {
    db: Arc<Database>,
}

impl ScoreStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new score snapshot.
    pub fn insert(&self, score: &DriverScore) -> Result<(), DatabaseError> {
        let factors_json = serde_json::to_string(&score.factors)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        self.db
            .connection()
            .execute(
                "INSERT INTO driver_scores (id, driver_id, empty_miles_score, network_score,
                 on_time_score, hub_score, fuel_score, total_score, factors_json, calculated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    score.id.to_string(),
                    score.driver_id.to_string(),
                    score.empty_miles_score,
                    score.network_score,
                    score.on_time_score,
                    score.hub_score,
                    score.fuel_score,
                    score.total_score,
                    factors_json,
                    score.calculated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Most recent score snapshot for a driver, if any.
    pub fn latest(&self, driver_id: Uuid) -> Result<Option<DriverScore>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(
                "SELECT id, driver_id, empty_miles_score, network_score, on_time_score,
                 hub_score, fuel_score, total_score, factors_json, calculated_at
                 FROM driver_scores WHERE driver_id = ?1
                 ORDER BY calculated_at DESC LIMIT 1",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(params![driver_id.to_string()], map_score_row);

        match result {
            Ok(row) => Ok(Some(row.into_score()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Score history for a driver, most recent first.
    pub fn history(&self, driver_id: Uuid, limit: u32) -> Result<Vec<DriverScore>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(
                "SELECT id, driver_id, empty_miles_score, network_score, on_time_score,
                 hub_score, fuel_score, total_score, factors_json, calculated_at
                 FROM driver_scores WHERE driver_id = ?1
                 ORDER BY calculated_at DESC LIMIT ?2",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![driver_id.to_string(), limit], map_score_row)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut scores = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            scores.push(row.into_score()?);
        }
        Ok(scores)
    }

    /// Scores for a driver within a date range, ascending.
    pub fn in_range(
        &self,
        driver_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DriverScore>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(
                "SELECT id, driver_id, empty_miles_score, network_score, on_time_score,
                 hub_score, fuel_score, total_score, factors_json, calculated_at
                 FROM driver_scores
                 WHERE driver_id = ?1 AND calculated_at >= ?2 AND calculated_at < ?3
                 ORDER BY calculated_at ASC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![driver_id.to_string(), from.to_rfc3339(), to.to_rfc3339()],
                map_score_row,
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut scores = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            scores.push(row.into_score()?);
        }
        Ok(scores)
    }
}

fn map_score_row(row: &rusqlite::Row) -> rusqlite::Result<ScoreRow> {
    Ok(ScoreRow {
        id: row.get(0)?,
        driver_id: row.get(1)?,
        empty_miles_score: row.get(2)?,
        network_score: row.get(3)?,
        on_time_score: row.get(4)?,
        hub_score: row.get(5)?,
        fuel_score: row.get(6)?,
        total_score: row.get(7)?,
        factors_json: row.get(8)?,
        calculated_at: row.get(9)?,
    })
}

/// Intermediate struct for reading score rows from the database.
struct ScoreRow {
    id: String,
    driver_id: String,
    empty_miles_score: f64,
    network_score: f64,
    on_time_score: f64,
    hub_score: f64,
    fuel_score: f64,
    total_score: f64,
    factors_json: String,
    calculated_at: String,
}

impl ScoreRow {
    fn into_score(self) -> Result<DriverScore, DatabaseError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| DatabaseError::DeserializationError(format!("Invalid UUID: {}", e)))?;
        let driver_id = Uuid::parse_str(&self.driver_id).map_err(|e| {
            DatabaseError::DeserializationError(format!("Invalid driver UUID: {}", e))
        })?;

        let factors: ScoreFactors = serde_json::from_str(&self.factors_json).map_err(|e| {
            DatabaseError::DeserializationError(format!("Invalid factors JSON: {}", e))
        })?;

        let calculated_at = DateTime::parse_from_rfc3339(&self.calculated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DatabaseError::DeserializationError(format!("Invalid date: {}", e)))?;

        Ok(DriverScore {
            id,
            driver_id,
            empty_miles_score: self.empty_miles_score,
            network_score: self.network_score,
            on_time_score: self.on_time_score,
            hub_score: self.hub_score,
            fuel_score: self.fuel_score,
            total_score: self.total_score,
            factors,
            calculated_at,
        })
    }
}
