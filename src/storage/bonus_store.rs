//! Persistence for bonus zones and driver bonuses.

use chrono::{DateTime, Utc};
use rusqlite::params;
use std::sync::Arc;
use uuid::Uuid;

use crate::rewards::types::{BonusSource, DriverBonus};
use crate::storage::{Database, DatabaseError};
use crate::zones::types::{BonusZone, GeoPoint};

/// Store for `bonus_zones` and `driver_bonuses`.
pub struct BonusStore {
    db: Arc<Database>,
}

impl BonusStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn insert_zone(&self, zone: &BonusZone) -> Result<(), DatabaseError> {
        let boundary_json = serde_json::to_string(&zone.boundary)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        self.db
            .connection()
            .execute(
                "INSERT INTO bonus_zones (id, name, boundary_json, multiplier,
                 start_time, end_time, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    zone.id.to_string(),
                    zone.name,
                    boundary_json,
                    zone.multiplier,
                    zone.start_time.to_rfc3339(),
                    zone.end_time.to_rfc3339(),
                    zone.is_active as i32,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Get a zone by id.
    pub fn get_zone(&self, id: Uuid) -> Result<Option<BonusZone>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(
                "SELECT id, name, boundary_json, multiplier, start_time, end_time, is_active
                 FROM bonus_zones WHERE id = ?1",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(params![id.to_string()], map_zone_row);
        match result {
            Ok(row) => Ok(Some(row.into_zone()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// All zones with the active flag set. Window filtering is the
    /// caller's concern.
    pub fn active_zones(&self) -> Result<Vec<BonusZone>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(
                "SELECT id, name, boundary_json, multiplier, start_time, end_time, is_active
                 FROM bonus_zones WHERE is_active = 1 ORDER BY start_time",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], map_zone_row)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut zones = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            zones.push(row.into_zone()?);
        }
        Ok(zones)
    }

    /// Deactivate a zone.
    pub fn deactivate_zone(&self, id: Uuid) -> Result<(), DatabaseError> {
        let rows = self
            .db
            .connection()
            .execute(
                "UPDATE bonus_zones SET is_active = 0 WHERE id = ?1",
                params![id.to_string()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if rows == 0 {
            return Err(DatabaseError::NotFound(format!("bonus zone {id}")));
        }
        Ok(())
    }

    pub fn insert_bonus(&self, bonus: &DriverBonus) -> Result<(), DatabaseError> {
        self.db
            .connection()
            .execute(
                "INSERT INTO driver_bonuses (id, driver_id, source_type, source_id,
                 assignment_id, amount, reason, paid, earned_at, paid_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    bonus.id.to_string(),
                    bonus.driver_id.to_string(),
                    bonus.source_type.as_str(),
                    bonus.source_id.to_string(),
                    bonus.assignment_id.map(|id| id.to_string()),
                    bonus.amount,
                    bonus.reason,
                    bonus.paid as i32,
                    bonus.earned_at.to_rfc3339(),
                    bonus.paid_at.map(|dt| dt.to_rfc3339()),
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Get a bonus by id.
    pub fn get_bonus(&self, id: Uuid) -> Result<Option<DriverBonus>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(&format!("{SELECT_BONUS} FROM driver_bonuses WHERE id = ?1"))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(params![id.to_string()], map_bonus_row);
        match result {
            Ok(row) => Ok(Some(row.into_bonus()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// All of a driver's bonuses, most recent first.
    pub fn bonuses_for_driver(&self, driver_id: Uuid) -> Result<Vec<DriverBonus>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(&format!(
                "{SELECT_BONUS} FROM driver_bonuses
                 WHERE driver_id = ?1 ORDER BY earned_at DESC"
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        collect_bonuses(stmt.query_map(params![driver_id.to_string()], map_bonus_row))
    }

    /// A driver's bonuses earned within a date range, ascending.
    pub fn bonuses_in_range(
        &self,
        driver_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DriverBonus>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(&format!(
                "{SELECT_BONUS} FROM driver_bonuses
                 WHERE driver_id = ?1 AND earned_at >= ?2 AND earned_at <= ?3
                 ORDER BY earned_at"
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        collect_bonuses(stmt.query_map(
            params![driver_id.to_string(), from.to_rfc3339(), to.to_rfc3339()],
            map_bonus_row,
        ))
    }

    /// Record the paid transition. Returns false if the bonus was already
    /// paid (no row changed).
    pub fn mark_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let rows = self
            .db
            .connection()
            .execute(
                "UPDATE driver_bonuses SET paid = 1, paid_at = ?2
                 WHERE id = ?1 AND paid = 0",
                params![id.to_string(), paid_at.to_rfc3339()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(rows > 0)
    }
}

const SELECT_BONUS: &str = "SELECT id, driver_id, source_type, source_id, assignment_id, \
                            amount, reason, paid, earned_at, paid_at";

fn collect_bonuses(
    rows: rusqlite::Result<rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row) -> rusqlite::Result<BonusRow>>>,
) -> Result<Vec<DriverBonus>, DatabaseError> {
    let rows = rows.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
    let mut bonuses = Vec::new();
    for row in rows {
        let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        bonuses.push(row.into_bonus()?);
    }
    Ok(bonuses)
}

fn map_zone_row(row: &rusqlite::Row) -> rusqlite::Result<ZoneRow> {
    Ok(ZoneRow {
        id: row.get(0)?,
        name: row.get(1)?,
        boundary_json: row.get(2)?,
        multiplier: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        is_active: row.get(6)?,
    })
}

fn map_bonus_row(row: &rusqlite::Row) -> rusqlite::Result<BonusRow> {
    Ok(BonusRow {
        id: row.get(0)?,
        driver_id: row.get(1)?,
        source_type: row.get(2)?,
        source_id: row.get(3)?,
        assignment_id: row.get(4)?,
        amount: row.get(5)?,
        reason: row.get(6)?,
        paid: row.get(7)?,
        earned_at: row.get(8)?,
        paid_at: row.get(9)?,
    })
}

/// Intermediate struct for reading zone rows from the database.
struct ZoneRow {
    id: String,
    name: String,
    boundary_json: String,
    multiplier: f64,
    start_time: String,
    end_time: String,
    is_active: i32,
}

impl ZoneRow {
    fn into_zone(self) -> Result<BonusZone, DatabaseError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| DatabaseError::DeserializationError(format!("Invalid UUID: {}", e)))?;
        let boundary: Vec<GeoPoint> = serde_json::from_str(&self.boundary_json)
            .map_err(|e| DatabaseError::DeserializationError(format!("Invalid boundary: {}", e)))?;
        let start_time = parse_utc(&self.start_time)?;
        let end_time = parse_utc(&self.end_time)?;

        Ok(BonusZone {
            id,
            name: self.name,
            boundary,
            multiplier: self.multiplier,
            start_time,
            end_time,
            is_active: self.is_active != 0,
        })
    }
}

/// Intermediate struct for reading bonus rows from the database.
struct BonusRow {
    id: String,
    driver_id: String,
    source_type: String,
    source_id: String,
    assignment_id: Option<String>,
    amount: f64,
    reason: String,
    paid: i32,
    earned_at: String,
    paid_at: Option<String>,
}

impl BonusRow {
    fn into_bonus(self) -> Result<DriverBonus, DatabaseError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| DatabaseError::DeserializationError(format!("Invalid UUID: {}", e)))?;
        let driver_id = Uuid::parse_str(&self.driver_id).map_err(|e| {
            DatabaseError::DeserializationError(format!("Invalid driver UUID: {}", e))
        })?;
        let source_type = BonusSource::from_str(&self.source_type).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown source type: {}", self.source_type))
        })?;
        let source_id = Uuid::parse_str(&self.source_id).map_err(|e| {
            DatabaseError::DeserializationError(format!("Invalid source UUID: {}", e))
        })?;
        let assignment_id = self
            .assignment_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| {
                DatabaseError::DeserializationError(format!("Invalid assignment UUID: {}", e))
            })?;
        let earned_at = parse_utc(&self.earned_at)?;
        let paid_at = self.paid_at.map(|s| parse_utc(&s)).transpose()?;

        Ok(DriverBonus {
            id,
            driver_id,
            source_type,
            source_id,
            assignment_id,
            amount: self.amount,
            reason: self.reason,
            paid: self.paid != 0,
            earned_at,
            paid_at,
        })
    }
}

fn parse_utc(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::DeserializationError(format!("Invalid date: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_zone() -> BonusZone {
        let now = Utc::now();
        BonusZone::polygon(
            "I-80 corridor",
            vec![
                GeoPoint::new(41.0, -88.0),
                GeoPoint::new(41.0, -87.0),
                GeoPoint::new(41.5, -87.5),
            ],
            1.8,
            now - Duration::hours(1),
            now + Duration::hours(6),
        )
        .expect("valid zone")
    }

    #[test]
    fn test_zone_round_trip() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = BonusStore::new(db);
        let zone = sample_zone();
        store.insert_zone(&zone).unwrap();

        let loaded = store.get_zone(zone.id).unwrap().unwrap();
        assert_eq!(loaded.name, zone.name);
        assert_eq!(loaded.boundary, zone.boundary);
        assert_eq!(loaded.multiplier, 1.8);
    }

    #[test]
    fn test_deactivated_zone_excluded() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = BonusStore::new(db);
        let zone = sample_zone();
        store.insert_zone(&zone).unwrap();

        assert_eq!(store.active_zones().unwrap().len(), 1);
        store.deactivate_zone(zone.id).unwrap();
        assert!(store.active_zones().unwrap().is_empty());
    }

    #[test]
    fn test_bonus_round_trip_and_range_query() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = BonusStore::new(db);
        let driver_id = Uuid::new_v4();

        let bonus = DriverBonus::new(
            driver_id,
            BonusSource::Achievement,
            Uuid::new_v4(),
            None,
            250.0,
            "Achievement earned: Efficiency Ace",
        );
        store.insert_bonus(&bonus).unwrap();

        let loaded = store.get_bonus(bonus.id).unwrap().unwrap();
        assert_eq!(loaded.amount, 250.0);
        assert!(!loaded.paid);

        let now = Utc::now();
        let in_range = store
            .bonuses_in_range(driver_id, now - Duration::days(1), now + Duration::days(1))
            .unwrap();
        assert_eq!(in_range.len(), 1);

        let out_of_range = store
            .bonuses_in_range(driver_id, now - Duration::days(9), now - Duration::days(2))
            .unwrap();
        assert!(out_of_range.is_empty());
    }

    #[test]
    fn test_mark_paid_once() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = BonusStore::new(db);

        let bonus = DriverBonus::new(
            Uuid::new_v4(),
            BonusSource::Zone,
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            45.0,
            "Bonus zone traversal",
        );
        store.insert_bonus(&bonus).unwrap();

        assert!(store.mark_paid(bonus.id, Utc::now()).unwrap());
        // Second transition is a no-op
        assert!(!store.mark_paid(bonus.id, Utc::now()).unwrap());

        let loaded = store.get_bonus(bonus.id).unwrap().unwrap();
        assert!(loaded.paid);
        assert!(loaded.paid_at.is_some());
    }
}
