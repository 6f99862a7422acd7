//! Storage layer: SQLite persistence, schema, and configuration.

pub mod achievement_store;
pub mod bonus_store;
pub mod config;
pub mod database;
pub mod leaderboard_store;
pub mod schema;
pub mod score_store;

// Re-export commonly used types
pub use achievement_store::AchievementStore;
pub use bonus_store::BonusStore;
pub use config::{load_config, save_config, ConfigError, EngineConfig};
pub use database::{Database, DatabaseError};
pub use leaderboard_store::LeaderboardStore;
pub use score_store::ScoreStore;
