//! Core types for the achievement catalog and earned achievements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Achievement category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Efficiency,
    Network,
    Consistency,
    Milestone,
    Special,
}

impl AchievementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementCategory::Efficiency => "efficiency",
            AchievementCategory::Network => "network",
            AchievementCategory::Consistency => "consistency",
            AchievementCategory::Milestone => "milestone",
            AchievementCategory::Special => "special",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "efficiency" => Some(AchievementCategory::Efficiency),
            "network" => Some(AchievementCategory::Network),
            "consistency" => Some(AchievementCategory::Consistency),
            "milestone" => Some(AchievementCategory::Milestone),
            "special" => Some(AchievementCategory::Special),
            _ => None,
        }
    }
}

/// Achievement tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementLevel {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl AchievementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementLevel::Bronze => "bronze",
            AchievementLevel::Silver => "silver",
            AchievementLevel::Gold => "gold",
            AchievementLevel::Platinum => "platinum",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bronze" => Some(AchievementLevel::Bronze),
            "silver" => Some(AchievementLevel::Silver),
            "gold" => Some(AchievementLevel::Gold),
            "platinum" => Some(AchievementLevel::Platinum),
            _ => None,
        }
    }
}

/// The nine metric kinds a criterion can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    EfficiencyScore,
    EmptyMilesReduction,
    NetworkContribution,
    OnTimePercentage,
    HubUsage,
    FuelEfficiency,
    LoadsCompleted,
    MilesDriven,
    RelayParticipation,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::EfficiencyScore => "efficiency_score",
            MetricType::EmptyMilesReduction => "empty_miles_reduction",
            MetricType::NetworkContribution => "network_contribution",
            MetricType::OnTimePercentage => "on_time_percentage",
            MetricType::HubUsage => "hub_usage",
            MetricType::FuelEfficiency => "fuel_efficiency",
            MetricType::LoadsCompleted => "loads_completed",
            MetricType::MilesDriven => "miles_driven",
            MetricType::RelayParticipation => "relay_participation",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "efficiency_score" => Some(MetricType::EfficiencyScore),
            "empty_miles_reduction" => Some(MetricType::EmptyMilesReduction),
            "network_contribution" => Some(MetricType::NetworkContribution),
            "on_time_percentage" => Some(MetricType::OnTimePercentage),
            "hub_usage" => Some(MetricType::HubUsage),
            "fuel_efficiency" => Some(MetricType::FuelEfficiency),
            "loads_completed" => Some(MetricType::LoadsCompleted),
            "miles_driven" => Some(MetricType::MilesDriven),
            "relay_participation" => Some(MetricType::RelayParticipation),
            _ => None,
        }
    }
}

/// Comparison operator applied between the extracted value and the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    GreaterOrEqual,
    Greater,
    Equal,
    Less,
    LessOrEqual,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::GreaterOrEqual => ">=",
            ComparisonOperator::Greater => ">",
            ComparisonOperator::Equal => "=",
            ComparisonOperator::Less => "<",
            ComparisonOperator::LessOrEqual => "<=",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            ">=" => Some(ComparisonOperator::GreaterOrEqual),
            ">" => Some(ComparisonOperator::Greater),
            "=" => Some(ComparisonOperator::Equal),
            "<" => Some(ComparisonOperator::Less),
            "<=" => Some(ComparisonOperator::LessOrEqual),
            _ => None,
        }
    }

    /// Apply the operator.
    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            ComparisonOperator::GreaterOrEqual => value >= threshold,
            ComparisonOperator::Greater => value > threshold,
            ComparisonOperator::Equal => (value - threshold).abs() < f64::EPSILON,
            ComparisonOperator::Less => value < threshold,
            ComparisonOperator::LessOrEqual => value <= threshold,
        }
    }

    /// Whether a smaller value is closer to the goal.
    pub fn lower_is_better(&self) -> bool {
        matches!(self, ComparisonOperator::Less | ComparisonOperator::LessOrEqual)
    }
}

/// Timeframe a criterion is evaluated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaTimeframe {
    AllTime,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl CriteriaTimeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriteriaTimeframe::AllTime => "all_time",
            CriteriaTimeframe::Weekly => "weekly",
            CriteriaTimeframe::Monthly => "monthly",
            CriteriaTimeframe::Quarterly => "quarterly",
            CriteriaTimeframe::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "all_time" => Some(CriteriaTimeframe::AllTime),
            "weekly" => Some(CriteriaTimeframe::Weekly),
            "monthly" => Some(CriteriaTimeframe::Monthly),
            "quarterly" => Some(CriteriaTimeframe::Quarterly),
            "yearly" => Some(CriteriaTimeframe::Yearly),
            _ => None,
        }
    }
}

/// Typed extension parameters for a criterion, tagged by use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriteriaParams {
    /// Anchors the inverted progress scale for lower-is-better metrics.
    InvertedScale { base_value: f64 },
    /// Restricts the criterion to loads in a single region.
    Region { region: String },
}

/// Criteria attached to an achievement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementCriteria {
    pub metric_type: MetricType,
    pub threshold: f64,
    pub timeframe: CriteriaTimeframe,
    pub comparison_operator: ComparisonOperator,
    pub additional_params: Option<CriteriaParams>,
}

/// Catalog achievement definition. Read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: AchievementCategory,
    pub level: AchievementLevel,
    pub points: f64,
    pub criteria: AchievementCriteria,
    pub is_active: bool,
}

impl Achievement {
    /// Convenience constructor for catalog seeding and tests.
    pub fn new(
        name: &str,
        category: AchievementCategory,
        level: AchievementLevel,
        points: f64,
        criteria: AchievementCriteria,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            category,
            level,
            points,
            criteria,
            is_active: true,
        }
    }
}

/// Earned achievement fact. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverAchievement {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub achievement_id: Uuid,
    pub earned_at: DateTime<Utc>,
    pub achievement_data: Option<serde_json::Value>,
}

/// Transient progress toward an achievement. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementProgress {
    pub achievement_id: Uuid,
    pub current_value: f64,
    pub target_value: f64,
    pub progress_percentage: f64,
    pub is_completed: bool,
}
