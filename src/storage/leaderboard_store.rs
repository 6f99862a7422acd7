//! Persistence for leaderboards and their ranked entries.
//!
//! Rank rewrites are issued by the engine inside a single write
//! transaction; this store only owns the per-table SQL.

use chrono::{DateTime, Utc};
use rusqlite::params;
use std::sync::Arc;
use uuid::Uuid;

use crate::leaderboards::types::{
    BonusStructure, Leaderboard, LeaderboardEntry, LeaderboardTimeframe, LeaderboardType,
};
use crate::storage::{Database, DatabaseError};

/// Store for `leaderboards` and `leaderboard_entries`.
pub struct LeaderboardStore {
    db: Arc<Database>,
}

impl LeaderboardStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn insert_leaderboard(&self, board: &Leaderboard) -> Result<(), DatabaseError> {
        let bonus_json = serde_json::to_string(&board.bonus_structure)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        self.db
            .connection()
            .execute(
                "INSERT INTO leaderboards (id, name, board_type, timeframe, region,
                 period_start, period_end, is_active, bonus_structure_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    board.id.to_string(),
                    board.name,
                    board.board_type.as_str(),
                    board.timeframe.as_str(),
                    board.region,
                    board.period_start.to_rfc3339(),
                    board.period_end.to_rfc3339(),
                    board.is_active as i32,
                    bonus_json,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Get a leaderboard by id.
    pub fn get_leaderboard(&self, id: Uuid) -> Result<Option<Leaderboard>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(&format!(
                "{SELECT_BOARD} FROM leaderboards WHERE id = ?1"
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(params![id.to_string()], map_board_row);
        match result {
            Ok(row) => Ok(Some(row.into_leaderboard()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Active leaderboards whose period covers the instant.
    pub fn active_covering(&self, now: DateTime<Utc>) -> Result<Vec<Leaderboard>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(&format!(
                "{SELECT_BOARD} FROM leaderboards
                 WHERE is_active = 1 AND period_start <= ?1 AND period_end > ?1
                 ORDER BY period_end"
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        collect_boards(stmt.query_map(params![now.to_rfc3339()], map_board_row))
    }

    /// Active leaderboards ending at or before the horizon.
    pub fn active_ending_by(
        &self,
        horizon: DateTime<Utc>,
    ) -> Result<Vec<Leaderboard>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(&format!(
                "{SELECT_BOARD} FROM leaderboards
                 WHERE is_active = 1 AND period_end <= ?1
                 ORDER BY period_end"
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        collect_boards(stmt.query_map(params![horizon.to_rfc3339()], map_board_row))
    }

    /// Deactivate (finalize) a leaderboard.
    pub fn deactivate(&self, id: Uuid) -> Result<(), DatabaseError> {
        let rows = self
            .db
            .connection()
            .execute(
                "UPDATE leaderboards SET is_active = 0 WHERE id = ?1",
                params![id.to_string()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if rows == 0 {
            return Err(DatabaseError::NotFound(format!("leaderboard {id}")));
        }
        Ok(())
    }

    /// Insert or update the driver's entry score, preserving rank fields.
    pub fn upsert_entry_score(
        &self,
        leaderboard_id: Uuid,
        driver_id: Uuid,
        score: f64,
    ) -> Result<(), DatabaseError> {
        self.db
            .connection()
            .execute(
                "INSERT INTO leaderboard_entries
                 (id, leaderboard_id, driver_id, score, rank, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)
                 ON CONFLICT(leaderboard_id, driver_id)
                 DO UPDATE SET score = excluded.score, updated_at = excluded.updated_at",
                params![
                    Uuid::new_v4().to_string(),
                    leaderboard_id.to_string(),
                    driver_id.to_string(),
                    score,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// All entries for a leaderboard, score descending.
    pub fn entries_sorted(&self, leaderboard_id: Uuid) -> Result<Vec<LeaderboardEntry>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(&format!(
                "{SELECT_ENTRY} FROM leaderboard_entries
                 WHERE leaderboard_id = ?1 ORDER BY score DESC"
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        collect_entries(stmt.query_map(params![leaderboard_id.to_string()], map_entry_row))
    }

    /// Top N entries by rank.
    pub fn top_entries(
        &self,
        leaderboard_id: Uuid,
        limit: u32,
    ) -> Result<Vec<LeaderboardEntry>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(&format!(
                "{SELECT_ENTRY} FROM leaderboard_entries
                 WHERE leaderboard_id = ?1 AND rank > 0 ORDER BY rank LIMIT ?2"
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        collect_entries(stmt.query_map(params![leaderboard_id.to_string(), limit], map_entry_row))
    }

    /// A single driver's entry on a leaderboard.
    pub fn entry_for(
        &self,
        leaderboard_id: Uuid,
        driver_id: Uuid,
    ) -> Result<Option<LeaderboardEntry>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(&format!(
                "{SELECT_ENTRY} FROM leaderboard_entries
                 WHERE leaderboard_id = ?1 AND driver_id = ?2"
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(
            params![leaderboard_id.to_string(), driver_id.to_string()],
            map_entry_row,
        );
        match result {
            Ok(row) => Ok(Some(row.into_entry()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Rewrite one entry's rank fields. Called for every entry inside the
    /// engine's re-sort transaction.
    pub fn update_entry_rank(
        &self,
        entry_id: Uuid,
        rank: u32,
        previous_rank: Option<u32>,
        rank_change: i64,
    ) -> Result<(), DatabaseError> {
        self.db
            .connection()
            .execute(
                "UPDATE leaderboard_entries
                 SET rank = ?2, previous_rank = ?3, rank_change = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    entry_id.to_string(),
                    rank,
                    previous_rank,
                    rank_change,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Record the payout owed to an entry at finalization.
    pub fn set_entry_bonus(&self, entry_id: Uuid, amount: f64) -> Result<(), DatabaseError> {
        self.db
            .connection()
            .execute(
                "UPDATE leaderboard_entries SET bonus_amount = ?2 WHERE id = ?1",
                params![entry_id.to_string(), amount],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Mark an entry's bonus as handed off to the reward pipeline.
    pub fn mark_entry_bonus_paid(&self, entry_id: Uuid) -> Result<(), DatabaseError> {
        self.db
            .connection()
            .execute(
                "UPDATE leaderboard_entries SET bonus_paid = 1 WHERE id = ?1",
                params![entry_id.to_string()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Entries owed an unpaid bonus, best rank first.
    pub fn unpaid_bonus_entries(
        &self,
        leaderboard_id: Uuid,
    ) -> Result<Vec<LeaderboardEntry>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(&format!(
                "{SELECT_ENTRY} FROM leaderboard_entries
                 WHERE leaderboard_id = ?1 AND bonus_amount > 0 AND bonus_paid = 0
                 ORDER BY rank"
            ))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        collect_entries(stmt.query_map(params![leaderboard_id.to_string()], map_entry_row))
    }
}

const SELECT_BOARD: &str = "SELECT id, name, board_type, timeframe, region, period_start, \
                            period_end, is_active, bonus_structure_json";

const SELECT_ENTRY: &str = "SELECT id, leaderboard_id, driver_id, score, rank, previous_rank, \
                            rank_change, bonus_amount, bonus_paid, updated_at";

fn collect_boards(
    rows: rusqlite::Result<rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row) -> rusqlite::Result<BoardRow>>>,
) -> Result<Vec<Leaderboard>, DatabaseError> {
    let rows = rows.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
    let mut boards = Vec::new();
    for row in rows {
        let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        boards.push(row.into_leaderboard()?);
    }
    Ok(boards)
}

fn collect_entries(
    rows: rusqlite::Result<rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row) -> rusqlite::Result<EntryRow>>>,
) -> Result<Vec<LeaderboardEntry>, DatabaseError> {
    let rows = rows.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
    let mut entries = Vec::new();
    for row in rows {
        let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        entries.push(row.into_entry()?);
    }
    Ok(entries)
}

fn map_board_row(row: &rusqlite::Row) -> rusqlite::Result<BoardRow> {
    Ok(BoardRow {
        id: row.get(0)?,
        name: row.get(1)?,
        board_type: row.get(2)?,
        timeframe: row.get(3)?,
        region: row.get(4)?,
        period_start: row.get(5)?,
        period_end: row.get(6)?,
        is_active: row.get(7)?,
        bonus_structure_json: row.get(8)?,
    })
}

fn map_entry_row(row: &rusqlite::Row) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        leaderboard_id: row.get(1)?,
        driver_id: row.get(2)?,
        score: row.get(3)?,
        rank: row.get(4)?,
        previous_rank: row.get(5)?,
        rank_change: row.get(6)?,
        bonus_amount: row.get(7)?,
        bonus_paid: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Intermediate struct for reading leaderboard rows from the database.
struct BoardRow {
    id: String,
    name: String,
    board_type: String,
    timeframe: String,
    region: Option<String>,
    period_start: String,
    period_end: String,
    is_active: i32,
    bonus_structure_json: String,
}

impl BoardRow {
    fn into_leaderboard(self) -> Result<Leaderboard, DatabaseError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| DatabaseError::DeserializationError(format!("Invalid UUID: {}", e)))?;
        let board_type = LeaderboardType::from_str(&self.board_type).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown board type: {}", self.board_type))
        })?;
        let timeframe = LeaderboardTimeframe::from_str(&self.timeframe).ok_or_else(|| {
            DatabaseError::DeserializationError(format!("Unknown timeframe: {}", self.timeframe))
        })?;
        let period_start = parse_utc(&self.period_start)?;
        let period_end = parse_utc(&self.period_end)?;
        let bonus_structure: BonusStructure = serde_json::from_str(&self.bonus_structure_json)
            .map_err(|e| {
                DatabaseError::DeserializationError(format!("Invalid bonus structure: {}", e))
            })?;

        Ok(Leaderboard {
            id,
            name: self.name,
            board_type,
            timeframe,
            region: self.region,
            period_start,
            period_end,
            is_active: self.is_active != 0,
            bonus_structure,
        })
    }
}

/// Intermediate struct for reading entry rows from the database.
struct EntryRow {
    id: String,
    leaderboard_id: String,
    driver_id: String,
    score: f64,
    rank: u32,
    previous_rank: Option<u32>,
    rank_change: i64,
    bonus_amount: f64,
    bonus_paid: i32,
    updated_at: String,
}

impl EntryRow {
    fn into_entry(self) -> Result<LeaderboardEntry, DatabaseError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| DatabaseError::DeserializationError(format!("Invalid UUID: {}", e)))?;
        let leaderboard_id = Uuid::parse_str(&self.leaderboard_id).map_err(|e| {
            DatabaseError::DeserializationError(format!("Invalid leaderboard UUID: {}", e))
        })?;
        let driver_id = Uuid::parse_str(&self.driver_id).map_err(|e| {
            DatabaseError::DeserializationError(format!("Invalid driver UUID: {}", e))
        })?;
        let updated_at = parse_utc(&self.updated_at)?;

        Ok(LeaderboardEntry {
            id,
            leaderboard_id,
            driver_id,
            score: self.score,
            rank: self.rank,
            previous_rank: self.previous_rank,
            rank_change: self.rank_change,
            bonus_amount: self.bonus_amount,
            bonus_paid: self.bonus_paid != 0,
            updated_at,
        })
    }
}

fn parse_utc(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::DeserializationError(format!("Invalid date: {}", e)))
}
