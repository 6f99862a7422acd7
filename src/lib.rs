//! HaulScore - Freight Driver Gamification Engine
//!
//! Scores completed load assignments across five efficiency dimensions,
//! awards achievements from an admin-managed catalog, maintains ranked
//! per-period leaderboards with tiered payouts, and evaluates driver
//! positions against geofenced bonus zones. All reward outputs converge
//! into immutable bonus records managed by the reward coordinator.

pub mod achievements;
pub mod events;
pub mod leaderboards;
pub mod rewards;
pub mod scoring;
pub mod storage;
pub mod zones;

// Re-export commonly used types
pub use achievements::detector::AchievementDetector;
pub use events::{EventEnvelope, EventSink, EventType};
pub use leaderboards::engine::LeaderboardEngine;
pub use rewards::coordinator::RewardCoordinator;
pub use scoring::calculator::ScoreCalculator;
pub use scoring::service::ScoreService;
pub use storage::config::EngineConfig;
pub use zones::engine::BonusZoneEngine;
