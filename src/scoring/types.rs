//! Core types for driver efficiency scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a load was assigned to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    /// Standard point-to-point haul
    Regular,
    /// Relay leg handed off between drivers en route
    Relay,
    /// Handoff at a designated smart-hub facility
    SmartHubExchange,
}

impl AssignmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentType::Regular => "regular",
            AssignmentType::Relay => "relay",
            AssignmentType::SmartHubExchange => "smart_hub_exchange",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "regular" => Some(AssignmentType::Regular),
            "relay" => Some(AssignmentType::Relay),
            "smart_hub_exchange" => Some(AssignmentType::SmartHubExchange),
            _ => None,
        }
    }
}

/// A completed load assignment, as delivered by the dispatch collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadAssignment {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub assignment_type: AssignmentType,
    pub scheduled_pickup: Option<DateTime<Utc>>,
    pub actual_pickup: Option<DateTime<Utc>>,
    pub scheduled_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    /// Acceptable lateness window per leg, in minutes
    pub pickup_window_minutes: i64,
    pub delivery_window_minutes: i64,
    pub distance_miles: f64,
    pub rate: f64,
}

impl LoadAssignment {
    /// A completed assignment with no timing data, for callers that only
    /// have the dispatch record.
    pub fn bare(driver_id: Uuid, assignment_type: AssignmentType) -> Self {
        Self {
            id: Uuid::new_v4(),
            driver_id,
            assignment_type,
            scheduled_pickup: None,
            actual_pickup: None,
            scheduled_delivery: None,
            actual_delivery: None,
            pickup_window_minutes: 30,
            delivery_window_minutes: 30,
            distance_miles: 0.0,
            rate: 0.0,
        }
    }
}

/// Telemetry and network metrics accompanying a completed load.
///
/// Every field is optional; each factor falls back to its documented
/// default when its inputs are missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverMetrics {
    /// Operating region, keyed into the empty-miles baseline table
    pub region: Option<String>,
    /// Fraction of miles driven empty on this load, 0.0..=1.0
    pub empty_miles_pct: Option<f64>,

    // Network contribution inputs
    /// Net effect on network flow, -50.0..=50.0
    pub network_impact: Option<f64>,
    /// Load-balancing contribution, 0.0..=20.0
    pub load_balancing: Option<f64>,
    /// Whether the load served a high-demand area
    pub high_demand_area: bool,
    /// Capacity utilization, 0.0..=1.0
    pub utilization: Option<f64>,
    /// Strategic lane value, 0.0..=20.0
    pub strategic_value: Option<f64>,

    // Hub exchange inputs
    /// Exchange efficiency bonus input, 0.0..=10.0
    pub hub_efficiency: Option<f64>,
    /// Actual exchange duration in minutes
    pub exchange_duration_minutes: Option<f64>,
    /// Ideal exchange duration in minutes
    pub ideal_exchange_minutes: Option<f64>,
    /// Historical hub utilization, 0.0..=1.0
    pub historical_hub_utilization: Option<f64>,
    /// Share of recent loads touching a hub, 0.0..=1.0
    pub recent_hub_visit_ratio: Option<f64>,

    // Fuel inputs
    /// Actual / expected fuel consumption; below 1.0 is better
    pub fuel_consumption_ratio: Option<f64>,
    /// Observed miles per gallon
    pub actual_mpg: Option<f64>,
    /// Fleet baseline miles per gallon for the lane
    pub baseline_mpg: Option<f64>,
    /// Fraction of engine time spent idling, 0.0..=1.0
    pub idling_pct: Option<f64>,
    /// Eco-driving telemetry score, 0.0..=1.0
    pub eco_driving: Option<f64>,

    // Rolling totals used by achievement criteria
    pub loads_completed: u32,
    pub miles_driven: f64,
    pub on_time_pct: Option<f64>,
    pub relay_loads_completed: u32,
}

/// Per-factor breakdown persisted alongside the score snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreFactors {
    pub empty_miles_pct: Option<f64>,
    pub regional_baseline: f64,
    pub pickup_deviation_minutes: Option<i64>,
    pub delivery_deviation_minutes: Option<i64>,
    pub assignment_type: Option<AssignmentType>,
    pub fuel_measure: Option<String>,
}

/// Append-only driver efficiency score snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverScore {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub empty_miles_score: f64,
    pub network_score: f64,
    pub on_time_score: f64,
    pub hub_score: f64,
    pub fuel_score: f64,
    pub total_score: f64,
    pub factors: ScoreFactors,
    pub calculated_at: DateTime<Utc>,
}

/// Weights applied to the five score components. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub empty_miles: f64,
    pub network: f64,
    pub on_time: f64,
    pub hub: f64,
    pub fuel: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            empty_miles: 0.30,
            network: 0.25,
            on_time: 0.20,
            hub: 0.15,
            fuel: 0.10,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.empty_miles + self.network + self.on_time + self.hub + self.fuel
    }
}
