//! Core types for leaderboards and ranked entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::scoring::types::DriverScore;

/// Which score dimension a leaderboard ranks drivers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardType {
    OverallEfficiency,
    EmptyMiles,
    NetworkContribution,
    OnTime,
    FuelEfficiency,
}

impl LeaderboardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardType::OverallEfficiency => "overall_efficiency",
            LeaderboardType::EmptyMiles => "empty_miles",
            LeaderboardType::NetworkContribution => "network_contribution",
            LeaderboardType::OnTime => "on_time",
            LeaderboardType::FuelEfficiency => "fuel_efficiency",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "overall_efficiency" => Some(LeaderboardType::OverallEfficiency),
            "empty_miles" => Some(LeaderboardType::EmptyMiles),
            "network_contribution" => Some(LeaderboardType::NetworkContribution),
            "on_time" => Some(LeaderboardType::OnTime),
            "fuel_efficiency" => Some(LeaderboardType::FuelEfficiency),
            _ => None,
        }
    }

    /// The component of a score snapshot this board ranks on.
    pub fn score_component(&self, score: &DriverScore) -> f64 {
        match self {
            LeaderboardType::OverallEfficiency => score.total_score,
            LeaderboardType::EmptyMiles => score.empty_miles_score,
            LeaderboardType::NetworkContribution => score.network_score,
            LeaderboardType::OnTime => score.on_time_score,
            LeaderboardType::FuelEfficiency => score.fuel_score,
        }
    }

    /// Display name used when generating period names.
    pub fn display_name(&self) -> &'static str {
        match self {
            LeaderboardType::OverallEfficiency => "Overall Efficiency",
            LeaderboardType::EmptyMiles => "Empty Miles",
            LeaderboardType::NetworkContribution => "Network Contribution",
            LeaderboardType::OnTime => "On-Time",
            LeaderboardType::FuelEfficiency => "Fuel Efficiency",
        }
    }
}

/// Period length of a leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardTimeframe {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl LeaderboardTimeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardTimeframe::Weekly => "weekly",
            LeaderboardTimeframe::Monthly => "monthly",
            LeaderboardTimeframe::Quarterly => "quarterly",
            LeaderboardTimeframe::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(LeaderboardTimeframe::Weekly),
            "monthly" => Some(LeaderboardTimeframe::Monthly),
            "quarterly" => Some(LeaderboardTimeframe::Quarterly),
            "yearly" => Some(LeaderboardTimeframe::Yearly),
            _ => None,
        }
    }
}

/// Rank-tier payout map.
///
/// Keys are either exact ranks (`"1"`) or inclusive ranges (`"6-10"`).
/// Lookup order: exact key, then the narrowest matching range (ties broken
/// by lower start), then the built-in decay table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BonusStructure {
    pub tiers: HashMap<String, f64>,
}

impl BonusStructure {
    pub fn amount_for_rank(&self, rank: u32) -> f64 {
        if let Some(amount) = self.tiers.get(&rank.to_string()) {
            return *amount;
        }

        // Overlapping ranges resolve to the narrowest; map iteration order
        // must not decide the payout.
        let mut best: Option<(u32, u32, f64)> = None;
        for (key, amount) in &self.tiers {
            if let Some((lo, hi)) = parse_range_key(key) {
                if rank < lo || rank > hi {
                    continue;
                }
                let closer = match best {
                    None => true,
                    Some((best_lo, best_hi, _)) => (hi - lo, lo) < (best_hi - best_lo, best_lo),
                };
                if closer {
                    best = Some((lo, hi, *amount));
                }
            }
        }
        if let Some((_, _, amount)) = best {
            return amount;
        }

        default_bonus_amount(rank)
    }
}

/// Built-in payout decay used when no tier matches.
pub fn default_bonus_amount(rank: u32) -> f64 {
    match rank {
        1..=5 => 500.0 - (rank - 1) as f64 * 50.0,
        6..=10 => 250.0 - (rank - 6) as f64 * 25.0,
        11..=20 => 100.0,
        21..=50 => 50.0,
        _ => 0.0,
    }
}

fn parse_range_key(key: &str) -> Option<(u32, u32)> {
    let (lo, hi) = key.split_once('-')?;
    let lo = lo.trim().parse().ok()?;
    let hi = hi.trim().parse().ok()?;
    if lo <= hi {
        Some((lo, hi))
    } else {
        None
    }
}

/// A ranked competition over one period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaderboard {
    pub id: Uuid,
    pub name: String,
    pub board_type: LeaderboardType,
    pub timeframe: LeaderboardTimeframe,
    /// `None` means global.
    pub region: Option<String>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub is_active: bool,
    pub bonus_structure: BonusStructure,
}

impl Leaderboard {
    pub fn new(
        name: &str,
        board_type: LeaderboardType,
        timeframe: LeaderboardTimeframe,
        region: Option<String>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        bonus_structure: BonusStructure,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            board_type,
            timeframe,
            region,
            period_start,
            period_end,
            is_active: true,
            bonus_structure,
        }
    }

    /// Whether the board's period covers the instant and the board accepts
    /// scores for the driver's region.
    pub fn covers(&self, now: DateTime<Utc>, driver_region: Option<&str>) -> bool {
        if !self.is_active || now < self.period_start || now >= self.period_end {
            return false;
        }
        match (&self.region, driver_region) {
            (None, _) => true,
            (Some(board), Some(driver)) => board.eq_ignore_ascii_case(driver),
            (Some(_), None) => false,
        }
    }
}

/// One driver's row on a leaderboard. Mutated on every recalculation,
/// frozen once the board finalizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub leaderboard_id: Uuid,
    pub driver_id: Uuid,
    pub score: f64,
    pub rank: u32,
    pub previous_rank: Option<u32>,
    /// previous_rank - rank; positive means the driver moved up.
    pub rank_change: i64,
    pub bonus_amount: f64,
    pub bonus_paid: bool,
    pub updated_at: DateTime<Utc>,
}
