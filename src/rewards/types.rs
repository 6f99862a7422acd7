//! Bonus records and reward summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of source a bonus references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusSource {
    Zone,
    Achievement,
    Leaderboard,
}

impl BonusSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BonusSource::Zone => "zone",
            BonusSource::Achievement => "achievement",
            BonusSource::Leaderboard => "leaderboard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "zone" => Some(BonusSource::Zone),
            "achievement" => Some(BonusSource::Achievement),
            "leaderboard" => Some(BonusSource::Leaderboard),
            _ => None,
        }
    }
}

/// A bonus owed to a driver. Immutable except the paid transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverBonus {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub source_type: BonusSource,
    /// Id of the zone, achievement, or leaderboard that produced the bonus.
    pub source_id: Uuid,
    pub assignment_id: Option<Uuid>,
    pub amount: f64,
    pub reason: String,
    pub paid: bool,
    pub earned_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl DriverBonus {
    pub fn new(
        driver_id: Uuid,
        source_type: BonusSource,
        source_id: Uuid,
        assignment_id: Option<Uuid>,
        amount: f64,
        reason: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            driver_id,
            source_type,
            source_id,
            assignment_id,
            amount,
            reason: reason.to_string(),
            paid: false,
            earned_at: Utc::now(),
            paid_at: None,
        }
    }
}

/// Read-only aggregation of a driver's bonuses over a date range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardSummary {
    pub total_amount: f64,
    pub paid_amount: f64,
    pub unpaid_amount: f64,
    pub bonus_count: u32,
    pub zone_amount: f64,
    pub achievement_amount: f64,
    pub leaderboard_amount: f64,
}
