//! Persistence for the achievement catalog and earned achievements.
//!
//! The award insert relies on the `UNIQUE(driver_id, achievement_id)`
//! constraint: `INSERT OR IGNORE` makes a losing concurrent award a no-op
//! rather than a duplicate row or an error.

use chrono::{DateTime, Utc};
use rusqlite::params;
use std::sync::Arc;
use uuid::Uuid;

use crate::achievements::types::{
    Achievement, AchievementCategory, AchievementCriteria, AchievementLevel, ComparisonOperator,
    CriteriaParams, CriteriaTimeframe, DriverAchievement, MetricType,
};
use crate::storage::{Database, DatabaseError};

/// Store for `achievements` and `driver_achievements`.
pub struct AchievementStore {
    db: Arc<Database>,
}

impl AchievementStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a catalog achievement. Used by catalog administration and
    /// test seeding; the engine itself only reads the catalog.
    pub fn insert_achievement(&self, achievement: &Achievement) -> Result<(), DatabaseError> {
        let params_json = achievement
            .criteria
            .additional_params
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        self.db
            .connection()
            .execute(
                "INSERT INTO achievements (id, name, description, category, level, points,
                 metric_type, threshold, timeframe, comparison_operator, params_json, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    achievement.id.to_string(),
                    achievement.name,
                    achievement.description,
                    achievement.category.as_str(),
                    achievement.level.as_str(),
                    achievement.points,
                    achievement.criteria.metric_type.as_str(),
                    achievement.criteria.threshold,
                    achievement.criteria.timeframe.as_str(),
                    achievement.criteria.comparison_operator.as_str(),
                    params_json,
                    achievement.is_active as i32,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Get an achievement by id.
    pub fn get(&self, id: Uuid) -> Result<Option<Achievement>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(
                "SELECT id, name, description, category, level, points, metric_type,
                 threshold, timeframe, comparison_operator, params_json, is_active
                 FROM achievements WHERE id = ?1",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(params![id.to_string()], map_achievement_row);

        match result {
            Ok(row) => Ok(Some(row.into_achievement()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// All active catalog achievements.
    pub fn active_achievements(&self) -> Result<Vec<Achievement>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(
                "SELECT id, name, description, category, level, points, metric_type,
                 threshold, timeframe, comparison_operator, params_json, is_active
                 FROM achievements WHERE is_active = 1 ORDER BY name",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], map_achievement_row)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut achievements = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            achievements.push(row.into_achievement()?);
        }
        Ok(achievements)
    }

    /// Earned achievements for a driver, most recent first.
    pub fn earned_for_driver(&self, driver_id: Uuid) -> Result<Vec<DriverAchievement>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(
                "SELECT id, driver_id, achievement_id, earned_at, data_json
                 FROM driver_achievements WHERE driver_id = ?1 ORDER BY earned_at DESC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![driver_id.to_string()], map_earned_row)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut earned = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            earned.push(row.into_driver_achievement()?);
        }
        Ok(earned)
    }

    /// Whether the driver has already earned the achievement.
    pub fn is_earned(&self, driver_id: Uuid, achievement_id: Uuid) -> Result<bool, DatabaseError> {
        let count: i64 = self
            .db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM driver_achievements
                 WHERE driver_id = ?1 AND achievement_id = ?2",
                params![driver_id.to_string(), achievement_id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(count > 0)
    }

    /// Award an achievement, at most once per (driver, achievement).
    ///
    /// Returns `None` when the pair already exists (a concurrent or repeated
    /// award attempt); the unique constraint makes the losing insert a no-op.
    pub fn award(
        &self,
        driver_id: Uuid,
        achievement_id: Uuid,
        data: Option<&serde_json::Value>,
    ) -> Result<Option<DriverAchievement>, DatabaseError> {
        let record = DriverAchievement {
            id: Uuid::new_v4(),
            driver_id,
            achievement_id,
            earned_at: Utc::now(),
            achievement_data: data.cloned(),
        };

        let data_json = data
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        let rows_affected = self
            .db
            .connection()
            .execute(
                "INSERT OR IGNORE INTO driver_achievements
                 (id, driver_id, achievement_id, earned_at, data_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id.to_string(),
                    driver_id.to_string(),
                    achievement_id.to_string(),
                    record.earned_at.to_rfc3339(),
                    data_json,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if rows_affected == 0 {
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Revoke an earned achievement. Returns whether a row was deleted.
    pub fn revoke(&self, driver_id: Uuid, achievement_id: Uuid) -> Result<bool, DatabaseError> {
        let rows_affected = self
            .db
            .connection()
            .execute(
                "DELETE FROM driver_achievements
                 WHERE driver_id = ?1 AND achievement_id = ?2",
                params![driver_id.to_string(), achievement_id.to_string()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(rows_affected > 0)
    }
}

fn map_achievement_row(row: &rusqlite::Row) -> rusqlite::Result<AchievementRow> {
    Ok(AchievementRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        level: row.get(4)?,
        points: row.get(5)?,
        metric_type: row.get(6)?,
        threshold: row.get(7)?,
        timeframe: row.get(8)?,
        comparison_operator: row.get(9)?,
        params_json: row.get(10)?,
        is_active: row.get(11)?,
    })
}

fn map_earned_row(row: &rusqlite::Row) -> rusqlite::Result<EarnedRow> {
    Ok(EarnedRow {
        id: row.get(0)?,
        driver_id: row.get(1)?,
        achievement_id: row.get(2)?,
        earned_at: row.get(3)?,
        data_json: row.get(4)?,
    })
}

/// Intermediate struct for reading achievement rows from the database.
struct AchievementRow {
    id: String,
    name: String,
    description: Option<String>,
    category: String,
    level: String,
    points: f64,
    metric_type: String,
    threshold: f64,
    timeframe: String,
    comparison_operator: String,
    params_json: Option<String>,
    is_active: i32,
}

impl AchievementRow {
    fn into_achievement(self) -> Result<Achievement, DatabaseError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| DatabaseError::DeserializationError(format!("Invalid UUID: {}", e)))?;

        let category = AchievementCategory::from_str(&self.category).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown category: {}", self.category))
        })?;
        let level = AchievementLevel::from_str(&self.level).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown level: {}", self.level))
        })?;
        let metric_type = MetricType::from_str(&self.metric_type).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown metric type: {}", self.metric_type))
        })?;
        let timeframe = CriteriaTimeframe::from_str(&self.timeframe).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown timeframe: {}", self.timeframe))
        })?;
        let comparison_operator = ComparisonOperator::from_str(&self.comparison_operator)
            .ok_or_else(|| {
                DatabaseError::DeserializationError(format!(
                    "Unknown operator: {}",
                    self.comparison_operator
                ))
            })?;

        let additional_params: Option<CriteriaParams> = self
            .params_json
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| {
                DatabaseError::DeserializationError(format!("Invalid params JSON: {}", e))
            })?;

        Ok(Achievement {
            id,
            name: self.name,
            description: self.description,
            category,
            level,
            points: self.points,
            criteria: AchievementCriteria {
                metric_type,
                threshold: self.threshold,
                timeframe,
                comparison_operator,
                additional_params,
            },
            is_active: self.is_active != 0,
        })
    }
}

/// Intermediate struct for reading earned-achievement rows from the database.
struct EarnedRow {
    id: String,
    driver_id: String,
    achievement_id: String,
    earned_at: String,
    data_json: Option<String>,
}

impl EarnedRow {
    fn into_driver_achievement(self) -> Result<DriverAchievement, DatabaseError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| DatabaseError::DeserializationError(format!("Invalid UUID: {}", e)))?;
        let driver_id = Uuid::parse_str(&self.driver_id).map_err(|e| {
            DatabaseError::DeserializationError(format!("Invalid driver UUID: {}", e))
        })?;
        let achievement_id = Uuid::parse_str(&self.achievement_id).map_err(|e| {
            DatabaseError::DeserializationError(format!("Invalid achievement UUID: {}", e))
        })?;

        let earned_at = DateTime::parse_from_rfc3339(&self.earned_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DatabaseError::DeserializationError(format!("Invalid date: {}", e)))?;

        let achievement_data = self
            .data_json
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| {
                DatabaseError::DeserializationError(format!("Invalid data JSON: {}", e))
            })?;

        Ok(DriverAchievement {
            id,
            driver_id,
            achievement_id,
            earned_at,
            achievement_data,
        })
    }
}
