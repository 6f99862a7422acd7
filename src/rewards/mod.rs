//! Reward coordination: bonus records, payouts, and summaries.

pub mod coordinator;
pub mod types;

// Re-export commonly used types
pub use coordinator::{fuel_discount_percentage, PayoutOutcome, RewardCoordinator, RewardError};
pub use types::{BonusSource, DriverBonus, RewardSummary};
