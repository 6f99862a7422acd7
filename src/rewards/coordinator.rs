//! Reward coordination.
//!
//! Turns achievement awards, leaderboard finalizations, and bonus zone
//! traversals into immutable bonus records, and owns the paid transition.
//! Actual fund transfer belongs to an external payment collaborator.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::types::{BonusSource, DriverBonus, RewardSummary};
use crate::events::{emit, EventEnvelope, EventSink, EventType};
use crate::leaderboards::types::{Leaderboard, LeaderboardEntry};
use crate::storage::{AchievementStore, BonusStore, Database, DatabaseError, LeaderboardStore};

/// Creates bonus records and manages their payment status.
pub struct RewardCoordinator {
    db: Arc<Database>,
    bonus_store: BonusStore,
    achievement_store: AchievementStore,
    leaderboard_store: LeaderboardStore,
    sink: Arc<dyn EventSink>,
    producer: String,
    /// Base payout for a zone traversal, scaled by the zone multiplier.
    zone_base_bonus: f64,
}

/// Aggregate result of a leaderboard payout run.
#[derive(Debug, Default)]
pub struct PayoutOutcome {
    pub created: u32,
    pub failed: u32,
}

impl RewardCoordinator {
    pub fn new(
        db: Arc<Database>,
        sink: Arc<dyn EventSink>,
        producer: String,
        zone_base_bonus: f64,
    ) -> Self {
        Self {
            bonus_store: BonusStore::new(db.clone()),
            achievement_store: AchievementStore::new(db.clone()),
            leaderboard_store: LeaderboardStore::new(db.clone()),
            db,
            sink,
            producer,
            zone_base_bonus,
        }
    }

    pub fn bonus_store(&self) -> &BonusStore {
        &self.bonus_store
    }

    /// Create an immutable bonus after validating its source still exists.
    pub fn create_bonus_for_driver(
        &self,
        driver_id: Uuid,
        source_type: BonusSource,
        source_id: Uuid,
        assignment_id: Option<Uuid>,
        amount: f64,
        reason: &str,
    ) -> Result<DriverBonus, RewardError> {
        if amount < 0.0 {
            return Err(RewardError::Validation(format!(
                "bonus amount must be non-negative, got {amount}"
            )));
        }
        self.validate_source(source_type, source_id)?;

        let bonus = DriverBonus::new(driver_id, source_type, source_id, assignment_id, amount, reason);
        self.bonus_store.insert_bonus(&bonus)?;

        tracing::info!(
            driver_id = %driver_id,
            source = source_type.as_str(),
            amount = amount,
            "Created driver bonus"
        );

        emit(
            self.sink.as_ref(),
            EventEnvelope::new(
                EventType::RewardCreated,
                &self.producer,
                serde_json::json!({
                    "bonus_id": bonus.id,
                    "driver_id": driver_id,
                    "source_type": source_type.as_str(),
                    "source_id": source_id,
                    "amount": amount,
                    "reason": reason,
                }),
            ),
        );

        Ok(bonus)
    }

    /// Record the paid transition. Idempotent: paying an already-paid bonus
    /// is a no-op and publishes nothing.
    pub fn mark_bonus_paid(&self, bonus_id: Uuid) -> Result<DriverBonus, RewardError> {
        let bonus = self
            .bonus_store
            .get_bonus(bonus_id)?
            .ok_or_else(|| RewardError::NotFound(format!("bonus {bonus_id}")))?;

        if bonus.paid {
            return Ok(bonus);
        }

        let paid_at = Utc::now();
        if !self.bonus_store.mark_paid(bonus_id, paid_at)? {
            // Lost a race with another payer; already paid is still success
            return self
                .bonus_store
                .get_bonus(bonus_id)?
                .ok_or_else(|| RewardError::NotFound(format!("bonus {bonus_id}")));
        }

        emit(
            self.sink.as_ref(),
            EventEnvelope::new(
                EventType::RewardIssued,
                &self.producer,
                serde_json::json!({
                    "bonus_id": bonus_id,
                    "driver_id": bonus.driver_id,
                    "amount": bonus.amount,
                    "paid_at": paid_at,
                }),
            ),
        );

        Ok(DriverBonus {
            paid: true,
            paid_at: Some(paid_at),
            ..bonus
        })
    }

    /// An earned achievement pays out its catalog points.
    pub fn handle_achievement_earned(
        &self,
        driver_id: Uuid,
        achievement_id: Uuid,
    ) -> Result<DriverBonus, RewardError> {
        let achievement = self
            .achievement_store
            .get(achievement_id)?
            .ok_or_else(|| RewardError::NotFound(format!("achievement {achievement_id}")))?;

        self.create_bonus_for_driver(
            driver_id,
            BonusSource::Achievement,
            achievement_id,
            None,
            achievement.points,
            &format!("Achievement earned: {}", achievement.name),
        )
    }

    /// A traversal through a live zone pays the base amount scaled by the
    /// zone multiplier.
    pub fn handle_zone_traversal(
        &self,
        driver_id: Uuid,
        zone_id: Uuid,
        assignment_id: Option<Uuid>,
    ) -> Result<DriverBonus, RewardError> {
        let zone = self
            .bonus_store
            .get_zone(zone_id)?
            .ok_or_else(|| RewardError::NotFound(format!("bonus zone {zone_id}")))?;

        if !zone.is_live(Utc::now()) {
            return Err(RewardError::Validation(format!(
                "bonus zone {} is not currently live",
                zone.name
            )));
        }

        self.create_bonus_for_driver(
            driver_id,
            BonusSource::Zone,
            zone_id,
            assignment_id,
            self.zone_base_bonus * zone.multiplier,
            &format!("Bonus zone traversal: {}", zone.name),
        )
    }

    /// Pay out a finalized leaderboard's qualifying entries.
    ///
    /// Entries already handed off are skipped; a failure on one entry is
    /// logged and counted, and the rest of the run proceeds.
    pub fn award_leaderboard_bonuses(
        &self,
        leaderboard_id: Uuid,
    ) -> Result<PayoutOutcome, RewardError> {
        let board = self
            .leaderboard_store
            .get_leaderboard(leaderboard_id)?
            .ok_or_else(|| RewardError::NotFound(format!("leaderboard {leaderboard_id}")))?;

        let mut outcome = PayoutOutcome::default();
        for entry in self.leaderboard_store.unpaid_bonus_entries(leaderboard_id)? {
            match self.pay_entry(&board, &entry) {
                Ok(_) => outcome.created += 1,
                Err(e) => {
                    tracing::error!(
                        driver_id = %entry.driver_id,
                        leaderboard_id = %leaderboard_id,
                        error = %e,
                        "Failed to pay leaderboard bonus"
                    );
                    outcome.failed += 1;
                }
            }
        }

        tracing::info!(
            leaderboard_id = %leaderboard_id,
            created = outcome.created,
            failed = outcome.failed,
            "Leaderboard payout complete"
        );
        Ok(outcome)
    }

    /// Create the bonus record and mark the entry handed off in one
    /// transaction. A rerun after a mid-payout failure must never produce a
    /// second bonus for the same entry.
    fn pay_entry(
        &self,
        board: &Leaderboard,
        entry: &LeaderboardEntry,
    ) -> Result<DriverBonus, RewardError> {
        let reason = format!("Rank {} on {}", entry.rank, board.name);
        let bonus = DriverBonus::new(
            entry.driver_id,
            BonusSource::Leaderboard,
            board.id,
            None,
            entry.bonus_amount,
            &reason,
        );

        let tx = self.db.write_transaction()?;
        self.bonus_store.insert_bonus(&bonus)?;
        self.leaderboard_store.mark_entry_bonus_paid(entry.id)?;
        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tracing::info!(
            driver_id = %entry.driver_id,
            leaderboard_id = %board.id,
            amount = entry.bonus_amount,
            "Created leaderboard bonus"
        );

        emit(
            self.sink.as_ref(),
            EventEnvelope::new(
                EventType::RewardCreated,
                &self.producer,
                serde_json::json!({
                    "bonus_id": bonus.id,
                    "driver_id": entry.driver_id,
                    "source_type": BonusSource::Leaderboard.as_str(),
                    "source_id": board.id,
                    "amount": entry.bonus_amount,
                    "reason": reason,
                }),
            ),
        );

        Ok(bonus)
    }

    /// Read-only bonus aggregation over a date range.
    pub fn driver_reward_summary(
        &self,
        driver_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<RewardSummary, RewardError> {
        let mut summary = RewardSummary::default();
        for bonus in self.bonus_store.bonuses_in_range(driver_id, from, to)? {
            summary.total_amount += bonus.amount;
            summary.bonus_count += 1;
            if bonus.paid {
                summary.paid_amount += bonus.amount;
            } else {
                summary.unpaid_amount += bonus.amount;
            }
            match bonus.source_type {
                BonusSource::Zone => summary.zone_amount += bonus.amount,
                BonusSource::Achievement => summary.achievement_amount += bonus.amount,
                BonusSource::Leaderboard => summary.leaderboard_amount += bonus.amount,
            }
        }
        Ok(summary)
    }

    fn validate_source(&self, source_type: BonusSource, source_id: Uuid) -> Result<(), RewardError> {
        let exists = match source_type {
            BonusSource::Zone => self.bonus_store.get_zone(source_id)?.is_some(),
            BonusSource::Achievement => self.achievement_store.get(source_id)?.is_some(),
            BonusSource::Leaderboard => self
                .leaderboard_store
                .get_leaderboard(source_id)?
                .is_some(),
        };
        if !exists {
            return Err(RewardError::NotFound(format!(
                "{} {source_id}",
                source_type.as_str()
            )));
        }
        Ok(())
    }
}

/// Fuel discount tier for a fuel score. Not persisted as a bonus.
pub fn fuel_discount_percentage(fuel_score: f64) -> f64 {
    if fuel_score >= 90.0 {
        10.0
    } else if fuel_score >= 80.0 {
        5.0
    } else {
        0.0
    }
}

/// Reward errors.
#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
