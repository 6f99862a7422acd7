//! Ranked per-period leaderboards with tiered payouts and rollover.

pub mod engine;
pub mod periods;
pub mod types;

// Re-export commonly used types
pub use engine::{LeaderboardEngine, LeaderboardError, RolloverOutcome};
pub use types::{
    BonusStructure, Leaderboard, LeaderboardEntry, LeaderboardTimeframe, LeaderboardType,
};
