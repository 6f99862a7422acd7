//! Leaderboard ranking, period rollover, and finalization.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::periods::{next_period, period_name};
use super::types::{Leaderboard, LeaderboardEntry};
use crate::events::{emit, EventEnvelope, EventSink, EventType};
use crate::scoring::types::DriverScore;
use crate::storage::{Database, DatabaseError, LeaderboardStore};

/// Maintains ranked leaderboard entries and rolls periods over.
pub struct LeaderboardEngine {
    db: Arc<Database>,
    store: LeaderboardStore,
    sink: Arc<dyn EventSink>,
    producer: String,
}

/// Aggregate result of a finalization batch. Per-board failures are
/// counted, not propagated.
#[derive(Debug, Default)]
pub struct RolloverOutcome {
    pub finalized: Vec<Uuid>,
    pub failed: u32,
}

impl LeaderboardEngine {
    pub fn new(db: Arc<Database>, sink: Arc<dyn EventSink>, producer: String) -> Self {
        Self {
            store: LeaderboardStore::new(db.clone()),
            db,
            sink,
            producer,
        }
    }

    pub fn store(&self) -> &LeaderboardStore {
        &self.store
    }

    /// Apply a new score snapshot to every leaderboard covering now.
    ///
    /// For each matching board the driver's entry is upserted and the whole
    /// board is re-ranked inside one transaction, so concurrent updates to
    /// the same board never interleave partial rank writes.
    pub fn update_driver_ranking(
        &self,
        score: &DriverScore,
        driver_region: Option<&str>,
    ) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        let now = Utc::now();
        let boards = self.store.active_covering(now)?;

        let mut driver_entries = Vec::new();
        for board in boards {
            if !board.covers(now, driver_region) {
                continue;
            }

            let value = board.board_type.score_component(score);
            let changed = self.rerank_with_update(&board, score.driver_id, value)?;

            emit(
                self.sink.as_ref(),
                EventEnvelope::new(
                    EventType::LeaderboardUpdated,
                    &self.producer,
                    serde_json::json!({
                        "leaderboard_id": board.id,
                        "driver_id": score.driver_id,
                        "score": value,
                    }),
                ),
            );

            for entry in &changed {
                emit(
                    self.sink.as_ref(),
                    EventEnvelope::new(
                        EventType::LeaderboardRankChanged,
                        &self.producer,
                        serde_json::json!({
                            "leaderboard_id": board.id,
                            "driver_id": entry.driver_id,
                            "rank": entry.rank,
                            "previous_rank": entry.previous_rank,
                            "rank_change": entry.rank_change,
                        }),
                    ),
                );
            }

            if let Some(entry) = self.store.entry_for(board.id, score.driver_id)? {
                driver_entries.push(entry);
            }
        }

        Ok(driver_entries)
    }

    /// Upsert one score and rewrite dense ranks 1..N for the whole board.
    ///
    /// Returns the entries whose rank changed.
    fn rerank_with_update(
        &self,
        board: &Leaderboard,
        driver_id: Uuid,
        value: f64,
    ) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        let tx = self.db.write_transaction()?;

        self.store.upsert_entry_score(board.id, driver_id, value)?;
        let changed = self.rewrite_ranks(board.id)?;

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        Ok(changed)
    }

    /// Assign dense ranks to all entries sorted by score descending.
    ///
    /// Must be called with a transaction open on the shared connection.
    fn rewrite_ranks(&self, leaderboard_id: Uuid) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        let entries = self.store.entries_sorted(leaderboard_id)?;

        let mut changed = Vec::new();
        for (i, entry) in entries.into_iter().enumerate() {
            let new_rank = (i + 1) as u32;
            let previous = if entry.rank > 0 { Some(entry.rank) } else { None };
            let rank_change = previous.map(|p| p as i64 - new_rank as i64).unwrap_or(0);

            self.store
                .update_entry_rank(entry.id, new_rank, previous, rank_change)?;

            if previous != Some(new_rank) {
                changed.push(LeaderboardEntry {
                    rank: new_rank,
                    previous_rank: previous,
                    rank_change,
                    ..entry
                });
            }
        }
        Ok(changed)
    }

    /// Create the successor leaderboard for a finalized board.
    pub fn generate_next_period(&self, board: &Leaderboard) -> Result<Leaderboard, LeaderboardError> {
        let (start, end) = next_period(board.timeframe, board.period_end);
        if start >= end {
            return Err(LeaderboardError::Validation(format!(
                "successor period start {start} is not before end {end}"
            )));
        }

        let successor = Leaderboard::new(
            &period_name(board.board_type, board.timeframe, start),
            board.board_type,
            board.timeframe,
            board.region.clone(),
            start,
            end,
            board.bonus_structure.clone(),
        );
        self.store.insert_leaderboard(&successor)?;

        tracing::info!(
            leaderboard_id = %successor.id,
            name = %successor.name,
            "Created successor leaderboard"
        );
        Ok(successor)
    }

    /// Finalize every active leaderboard ending within the threshold.
    ///
    /// Per board, in order: recompute final ranks, record bonus amounts for
    /// qualifying entries, create the successor, deactivate. A failure on
    /// one board is logged and skipped; the rest of the batch proceeds.
    pub fn process_ending_leaderboards(
        &self,
        days_threshold: i64,
    ) -> Result<RolloverOutcome, LeaderboardError> {
        let horizon = Utc::now() + Duration::days(days_threshold);
        let ending = self.store.active_ending_by(horizon)?;

        let mut outcome = RolloverOutcome::default();
        for board in ending {
            match self.finalize_board(&board) {
                Ok(()) => outcome.finalized.push(board.id),
                Err(e) => {
                    tracing::error!(
                        leaderboard_id = %board.id,
                        error = %e,
                        "Failed to finalize leaderboard"
                    );
                    outcome.failed += 1;
                }
            }
        }

        tracing::info!(
            finalized = outcome.finalized.len(),
            failed = outcome.failed,
            "Leaderboard rollover complete"
        );
        Ok(outcome)
    }

    fn finalize_board(&self, board: &Leaderboard) -> Result<(), LeaderboardError> {
        let tx = self.db.write_transaction()?;

        // Final ranks first, then payouts, then the successor; deactivation
        // is last so the earlier steps operate on a live board.
        self.rewrite_ranks(board.id)?;

        for entry in self.store.entries_sorted(board.id)? {
            let amount = board.bonus_structure.amount_for_rank(entry.rank);
            if amount > 0.0 {
                self.store.set_entry_bonus(entry.id, amount)?;
            }
        }

        self.generate_next_period(board)?;
        self.store.deactivate(board.id)?;

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        emit(
            self.sink.as_ref(),
            EventEnvelope::new(
                EventType::LeaderboardPeriodEnded,
                &self.producer,
                serde_json::json!({
                    "leaderboard_id": board.id,
                    "name": board.name,
                    "period_end": board.period_end,
                }),
            ),
        );
        Ok(())
    }
}

/// Leaderboard errors.
#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Leaderboard not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::leaderboards::types::{BonusStructure, LeaderboardTimeframe, LeaderboardType};
    use crate::scoring::types::ScoreFactors;

    fn engine() -> (LeaderboardEngine, Arc<MemorySink>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let sink = Arc::new(MemorySink::new());
        (
            LeaderboardEngine::new(db, sink.clone(), "haulscore-test".to_string()),
            sink,
        )
    }

    fn live_board() -> Leaderboard {
        let now = Utc::now();
        Leaderboard::new(
            "Weekly Efficiency",
            LeaderboardType::OverallEfficiency,
            LeaderboardTimeframe::Weekly,
            None,
            now - Duration::days(3),
            now + Duration::days(4),
            BonusStructure::default(),
        )
    }

    fn score_for(driver_id: Uuid, total: f64) -> DriverScore {
        DriverScore {
            id: Uuid::new_v4(),
            driver_id,
            empty_miles_score: total,
            network_score: total,
            on_time_score: total,
            hub_score: total,
            fuel_score: total,
            total_score: total,
            factors: ScoreFactors::default(),
            calculated_at: Utc::now(),
        }
    }

    #[test]
    fn test_ranks_are_dense_after_updates() {
        let (engine, _) = engine();
        let board = live_board();
        engine.store().insert_leaderboard(&board).unwrap();

        for total in [62.0, 88.0, 74.0, 88.0, 51.0] {
            engine
                .update_driver_ranking(&score_for(Uuid::new_v4(), total), None)
                .unwrap();
        }

        let entries = engine.store().entries_sorted(board.id).unwrap();
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.rank, (i + 1) as u32);
        }
    }

    #[test]
    fn test_rank_change_is_previous_minus_new() {
        let (engine, _) = engine();
        let board = live_board();
        engine.store().insert_leaderboard(&board).unwrap();

        let driver = Uuid::new_v4();
        engine
            .update_driver_ranking(&score_for(driver, 50.0), None)
            .unwrap();
        engine
            .update_driver_ranking(&score_for(Uuid::new_v4(), 90.0), None)
            .unwrap();

        // Driver is now rank 2; a better score moves them back to rank 1
        let entries = engine
            .update_driver_ranking(&score_for(driver, 95.0), None)
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[0].previous_rank, Some(2));
        assert_eq!(entries[0].rank_change, 1);
    }

    #[test]
    fn test_regional_board_skips_other_regions() {
        let (engine, _) = engine();
        let now = Utc::now();
        let board = Leaderboard::new(
            "Midwest Weekly",
            LeaderboardType::OverallEfficiency,
            LeaderboardTimeframe::Weekly,
            Some("midwest".to_string()),
            now - Duration::days(1),
            now + Duration::days(6),
            BonusStructure::default(),
        );
        engine.store().insert_leaderboard(&board).unwrap();

        let entries = engine
            .update_driver_ranking(&score_for(Uuid::new_v4(), 80.0), Some("west"))
            .unwrap();
        assert!(entries.is_empty());

        let entries = engine
            .update_driver_ranking(&score_for(Uuid::new_v4(), 80.0), Some("midwest"))
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_rank_seven_draws_mid_tier_bonus() {
        let (engine, _) = engine();
        let now = Utc::now();
        let board = Leaderboard::new(
            "Ending Weekly",
            LeaderboardType::OverallEfficiency,
            LeaderboardTimeframe::Weekly,
            None,
            now - Duration::days(7),
            now + Duration::hours(1),
            BonusStructure::default(),
        );
        engine.store().insert_leaderboard(&board).unwrap();

        let mut drivers = Vec::new();
        for i in 0..12 {
            let driver = Uuid::new_v4();
            drivers.push(driver);
            engine
                .update_driver_ranking(&score_for(driver, 100.0 - i as f64), None)
                .unwrap();
        }

        let outcome = engine.process_ending_leaderboards(1).unwrap();
        assert_eq!(outcome.finalized, vec![board.id]);
        assert_eq!(outcome.failed, 0);

        let seventh = engine.store().entry_for(board.id, drivers[6]).unwrap().unwrap();
        assert_eq!(seventh.rank, 7);
        // 6-10 tier of the default table
        assert_eq!(seventh.bonus_amount, 225.0);
    }

    #[test]
    fn test_rollover_creates_successor_and_deactivates() {
        let (engine, sink) = engine();
        let now = Utc::now();
        let board = Leaderboard::new(
            "Ending Weekly",
            LeaderboardType::OverallEfficiency,
            LeaderboardTimeframe::Weekly,
            None,
            now - Duration::days(7),
            now - Duration::hours(1),
            BonusStructure::default(),
        );
        engine.store().insert_leaderboard(&board).unwrap();

        let outcome = engine.process_ending_leaderboards(3).unwrap();
        assert_eq!(outcome.finalized.len(), 1);

        let finalized = engine.store().get_leaderboard(board.id).unwrap().unwrap();
        assert!(!finalized.is_active);

        // Exactly one active successor exists, starting after the old end
        let active = engine
            .store()
            .active_covering(board.period_end + Duration::days(2))
            .unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].period_start > board.period_end);

        assert_eq!(sink.events_of(EventType::LeaderboardPeriodEnded).len(), 1);
    }
}
