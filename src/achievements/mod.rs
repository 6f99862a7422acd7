//! Achievement catalog, detection, and progress tracking.

pub mod detector;
pub mod types;

// Re-export commonly used types
pub use detector::{AchievementDetector, AchievementError};
pub use types::{
    Achievement, AchievementCategory, AchievementCriteria, AchievementLevel, AchievementProgress,
    ComparisonOperator, CriteriaParams, CriteriaTimeframe, DriverAchievement, MetricType,
};
