//! Five-factor efficiency score calculation.
//!
//! Pure computation: takes a completed load and its metrics bag, returns a
//! [`DriverScore`] snapshot. Persistence and event publication live in
//! [`crate::scoring::service`].

use chrono::Utc;
use uuid::Uuid;

use super::baselines::baseline_for;
use super::types::{
    AssignmentType, DriverMetrics, DriverScore, LoadAssignment, ScoreFactors, ScoreWeights,
};

/// Fallback on-time score when timing data is incomplete.
const ON_TIME_DEFAULT: f64 = 70.0;

/// Fallback fuel score when neither fuel measure is available.
const FUEL_DEFAULT: f64 = 50.0;

/// Computes weighted five-factor efficiency scores.
pub struct ScoreCalculator {
    weights: ScoreWeights,
}

impl Default for ScoreCalculator {
    fn default() -> Self {
        Self::new(ScoreWeights::default())
    }
}

impl ScoreCalculator {
    /// Create a calculator with the given component weights.
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Calculate a score snapshot for a completed load.
    pub fn calculate(
        &self,
        driver_id: Uuid,
        assignment: &LoadAssignment,
        metrics: &DriverMetrics,
    ) -> DriverScore {
        let baseline = baseline_for(metrics.region.as_deref());

        let empty_miles_score = self.empty_miles_score(metrics, baseline);
        let network_score = self.network_score(assignment, metrics);
        let on_time_score = self.on_time_score(assignment);
        let hub_score = self.hub_score(assignment, metrics);
        let fuel_score = self.fuel_score(metrics);

        let total_score = clamp_score(
            empty_miles_score * self.weights.empty_miles
                + network_score * self.weights.network
                + on_time_score * self.weights.on_time
                + hub_score * self.weights.hub
                + fuel_score * self.weights.fuel,
        );

        let factors = ScoreFactors {
            empty_miles_pct: metrics.empty_miles_pct,
            regional_baseline: baseline,
            pickup_deviation_minutes: deviation_minutes(
                assignment.scheduled_pickup,
                assignment.actual_pickup,
            ),
            delivery_deviation_minutes: deviation_minutes(
                assignment.scheduled_delivery,
                assignment.actual_delivery,
            ),
            assignment_type: Some(assignment.assignment_type),
            fuel_measure: fuel_measure_name(metrics),
        };

        DriverScore {
            id: Uuid::new_v4(),
            driver_id,
            empty_miles_score,
            network_score,
            on_time_score,
            hub_score,
            fuel_score,
            total_score,
            factors,
            calculated_at: Utc::now(),
        }
    }

    /// Empty-miles factor: 50 plus half the percent reduction from the
    /// regional baseline. A driver matching the baseline scores 50.
    pub fn empty_miles_score(&self, metrics: &DriverMetrics, baseline: f64) -> f64 {
        let Some(actual) = metrics.empty_miles_pct else {
            return 50.0;
        };
        if baseline <= 0.0 {
            return 50.0;
        }
        let percent_reduction = (baseline - actual) / baseline * 100.0;
        clamp_score(50.0 + 0.5 * percent_reduction)
    }

    /// Network-contribution factor: additive signals over a base of 50.
    pub fn network_score(&self, assignment: &LoadAssignment, metrics: &DriverMetrics) -> f64 {
        let mut score = 50.0;

        score += metrics.network_impact.unwrap_or(0.0).clamp(-50.0, 50.0);
        score += metrics.load_balancing.unwrap_or(0.0).clamp(0.0, 20.0);
        if metrics.high_demand_area {
            score += 15.0;
        }
        score += (metrics.utilization.unwrap_or(0.0) * 10.0).min(10.0);
        score += metrics.strategic_value.unwrap_or(0.0).clamp(0.0, 20.0);

        match assignment.assignment_type {
            AssignmentType::Relay => score += 10.0,
            AssignmentType::SmartHubExchange => score += 15.0,
            AssignmentType::Regular => {}
        }

        clamp_score(score)
    }

    /// On-time factor: pickup leg weighted 40%, delivery leg 60%.
    ///
    /// Per leg: 100 when early or on time, 80 when late but inside the
    /// window, otherwise 80 minus the percentage by which the window was
    /// exceeded. Missing timing data on either leg yields the default 70.
    pub fn on_time_score(&self, assignment: &LoadAssignment) -> f64 {
        let pickup = leg_score(
            deviation_minutes(assignment.scheduled_pickup, assignment.actual_pickup),
            assignment.pickup_window_minutes,
        );
        let delivery = leg_score(
            deviation_minutes(assignment.scheduled_delivery, assignment.actual_delivery),
            assignment.delivery_window_minutes,
        );

        match (pickup, delivery) {
            (Some(p), Some(d)) => clamp_score(p * 0.4 + d * 0.6),
            _ => ON_TIME_DEFAULT,
        }
    }

    /// Hub-utilization factor.
    ///
    /// Smart-hub exchanges score from a base of 85, adjusted by the exchange
    /// efficiency bonus and the duration delta against the ideal. Other
    /// assignments blend historical hub utilization with the recent-visit
    /// ratio over a base of 40.
    pub fn hub_score(&self, assignment: &LoadAssignment, metrics: &DriverMetrics) -> f64 {
        if assignment.assignment_type == AssignmentType::SmartHubExchange {
            let mut score = 85.0;
            score += metrics.hub_efficiency.unwrap_or(0.0).clamp(0.0, 10.0);

            if let (Some(actual), Some(ideal)) = (
                metrics.exchange_duration_minutes,
                metrics.ideal_exchange_minutes,
            ) {
                if ideal > 0.0 {
                    // Faster than ideal earns up to +10, slower costs up to -10
                    let delta = ((ideal - actual) / ideal * 10.0).clamp(-10.0, 10.0);
                    score += delta;
                }
            }

            return clamp_score(score);
        }

        let mut score = 40.0;
        score += metrics
            .historical_hub_utilization
            .unwrap_or(0.0)
            .clamp(0.0, 1.0)
            * 30.0;
        score += metrics
            .recent_hub_visit_ratio
            .unwrap_or(0.0)
            .clamp(0.0, 1.0)
            * 30.0;
        clamp_score(score)
    }

    /// Fuel-efficiency factor.
    ///
    /// Uses the consumption ratio when available, the MPG ratio otherwise.
    /// Idling deducts up to 10 points, eco-driving telemetry adds up to 10.
    pub fn fuel_score(&self, metrics: &DriverMetrics) -> f64 {
        let base = if let Some(ratio) = metrics.fuel_consumption_ratio {
            // Below 1.0 means less fuel burned than expected
            70.0 + (1.0 - ratio) * 50.0
        } else if let (Some(actual), Some(baseline)) = (metrics.actual_mpg, metrics.baseline_mpg) {
            if baseline > 0.0 {
                70.0 + (actual / baseline - 1.0) * 50.0
            } else {
                FUEL_DEFAULT
            }
        } else {
            return FUEL_DEFAULT;
        };

        let idling_penalty = (metrics.idling_pct.unwrap_or(0.0).clamp(0.0, 1.0) * 40.0).min(10.0);
        let eco_bonus = (metrics.eco_driving.unwrap_or(0.0).clamp(0.0, 1.0) * 10.0).min(10.0);

        clamp_score(base - idling_penalty + eco_bonus)
    }
}

/// Clamp a component or total score to the valid [0, 100] range.
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

fn deviation_minutes(
    scheduled: Option<chrono::DateTime<Utc>>,
    actual: Option<chrono::DateTime<Utc>>,
) -> Option<i64> {
    match (scheduled, actual) {
        (Some(s), Some(a)) => Some((a - s).num_minutes()),
        _ => None,
    }
}

fn leg_score(deviation: Option<i64>, window_minutes: i64) -> Option<f64> {
    let deviation = deviation?;
    if deviation <= 0 {
        return Some(100.0);
    }
    if deviation <= window_minutes {
        return Some(80.0);
    }
    if window_minutes <= 0 {
        return Some(0.0);
    }
    let excess_percentage = (deviation - window_minutes) as f64 / window_minutes as f64 * 100.0;
    Some((80.0 - excess_percentage).max(0.0))
}

fn fuel_measure_name(metrics: &DriverMetrics) -> Option<String> {
    if metrics.fuel_consumption_ratio.is_some() {
        Some("consumption_ratio".to_string())
    } else if metrics.actual_mpg.is_some() && metrics.baseline_mpg.is_some() {
        Some("mpg_ratio".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn assignment(assignment_type: AssignmentType) -> LoadAssignment {
        LoadAssignment::bare(Uuid::new_v4(), assignment_type)
    }

    #[test]
    fn test_empty_miles_reduction_from_baseline() {
        // 0.10 empty miles against a 0.38 baseline:
        // 50 + 0.5 * ((0.38 - 0.10) / 0.38 * 100) ~= 86.8
        let calc = ScoreCalculator::default();
        let metrics = DriverMetrics {
            empty_miles_pct: Some(0.10),
            ..Default::default()
        };
        let score = calc.empty_miles_score(&metrics, 0.38);
        assert!((score - 86.8).abs() < 0.1, "got {score}");
    }

    #[test]
    fn test_empty_miles_at_baseline_scores_50() {
        let calc = ScoreCalculator::default();
        let metrics = DriverMetrics {
            empty_miles_pct: Some(0.35),
            ..Default::default()
        };
        assert_eq!(calc.empty_miles_score(&metrics, 0.35), 50.0);
    }

    #[test]
    fn test_empty_miles_worse_than_baseline_clamped() {
        let calc = ScoreCalculator::default();
        let metrics = DriverMetrics {
            empty_miles_pct: Some(1.0),
            ..Default::default()
        };
        let score = calc.empty_miles_score(&metrics, 0.35);
        assert!((0.0..=100.0).contains(&score));
        assert!(score < 50.0);
    }

    #[test]
    fn test_network_score_regular_baseline() {
        let calc = ScoreCalculator::default();
        let score = calc.network_score(&assignment(AssignmentType::Regular), &DriverMetrics::default());
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_network_score_smart_hub_bonus() {
        let calc = ScoreCalculator::default();
        let metrics = DriverMetrics {
            high_demand_area: true,
            utilization: Some(0.8),
            ..Default::default()
        };
        // 50 + 15 (high demand) + 8 (utilization) + 15 (smart hub)
        let score = calc.network_score(&assignment(AssignmentType::SmartHubExchange), &metrics);
        assert!((score - 88.0).abs() < 1e-9);
    }

    #[test]
    fn test_network_score_clamped_at_100() {
        let calc = ScoreCalculator::default();
        let metrics = DriverMetrics {
            network_impact: Some(50.0),
            load_balancing: Some(20.0),
            high_demand_area: true,
            utilization: Some(1.0),
            strategic_value: Some(20.0),
            ..Default::default()
        };
        let score = calc.network_score(&assignment(AssignmentType::SmartHubExchange), &metrics);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_on_time_early_both_legs() {
        let calc = ScoreCalculator::default();
        let now = Utc::now();
        let mut a = assignment(AssignmentType::Regular);
        a.scheduled_pickup = Some(now);
        a.actual_pickup = Some(now - Duration::minutes(5));
        a.scheduled_delivery = Some(now + Duration::hours(4));
        a.actual_delivery = Some(now + Duration::hours(4));
        assert_eq!(calc.on_time_score(&a), 100.0);
    }

    #[test]
    fn test_on_time_within_window() {
        let calc = ScoreCalculator::default();
        let now = Utc::now();
        let mut a = assignment(AssignmentType::Regular);
        a.pickup_window_minutes = 30;
        a.delivery_window_minutes = 30;
        a.scheduled_pickup = Some(now);
        a.actual_pickup = Some(now + Duration::minutes(10));
        a.scheduled_delivery = Some(now + Duration::hours(4));
        a.actual_delivery = Some(now + Duration::hours(4) + Duration::minutes(20));
        // Both legs inside the window: 80 each
        assert_eq!(calc.on_time_score(&a), 80.0);
    }

    #[test]
    fn test_on_time_beyond_window_decays() {
        let calc = ScoreCalculator::default();
        let now = Utc::now();
        let mut a = assignment(AssignmentType::Regular);
        a.pickup_window_minutes = 30;
        a.delivery_window_minutes = 30;
        a.scheduled_pickup = Some(now);
        a.actual_pickup = Some(now);
        // Delivery 45 minutes late against a 30-minute window:
        // excess = 15/30 * 100 = 50% -> leg score 30
        a.scheduled_delivery = Some(now + Duration::hours(4));
        a.actual_delivery = Some(now + Duration::hours(4) + Duration::minutes(45));
        let expected = 100.0 * 0.4 + 30.0 * 0.6;
        assert!((calc.on_time_score(&a) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_on_time_missing_data_defaults() {
        let calc = ScoreCalculator::default();
        let a = assignment(AssignmentType::Regular);
        assert_eq!(calc.on_time_score(&a), ON_TIME_DEFAULT);
    }

    #[test]
    fn test_hub_score_smart_exchange() {
        let calc = ScoreCalculator::default();
        let metrics = DriverMetrics {
            hub_efficiency: Some(6.0),
            exchange_duration_minutes: Some(20.0),
            ideal_exchange_minutes: Some(25.0),
            ..Default::default()
        };
        // 85 + 6 + (5/25 * 10) = 93
        let score = calc.hub_score(&assignment(AssignmentType::SmartHubExchange), &metrics);
        assert!((score - 93.0).abs() < 1e-9);
    }

    #[test]
    fn test_hub_score_non_hub_blend() {
        let calc = ScoreCalculator::default();
        let metrics = DriverMetrics {
            historical_hub_utilization: Some(0.5),
            recent_hub_visit_ratio: Some(0.5),
            ..Default::default()
        };
        // 40 + 15 + 15
        let score = calc.hub_score(&assignment(AssignmentType::Regular), &metrics);
        assert!((score - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_fuel_score_default_when_missing() {
        let calc = ScoreCalculator::default();
        assert_eq!(calc.fuel_score(&DriverMetrics::default()), FUEL_DEFAULT);
    }

    #[test]
    fn test_fuel_score_consumption_ratio() {
        let calc = ScoreCalculator::default();
        let metrics = DriverMetrics {
            fuel_consumption_ratio: Some(0.9),
            idling_pct: Some(0.1),
            eco_driving: Some(0.5),
            ..Default::default()
        };
        // base 70 + 5, minus idling 4, plus eco 5
        let score = calc.fuel_score(&metrics);
        assert!((score - 76.0).abs() < 1e-9);
    }

    #[test]
    fn test_fuel_score_mpg_ratio() {
        let calc = ScoreCalculator::default();
        let metrics = DriverMetrics {
            actual_mpg: Some(7.7),
            baseline_mpg: Some(7.0),
            ..Default::default()
        };
        let score = calc.fuel_score(&metrics);
        assert!((score - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_is_weighted_sum_and_in_range() {
        let calc = ScoreCalculator::default();
        let metrics = DriverMetrics {
            region: Some("midwest".to_string()),
            empty_miles_pct: Some(0.10),
            network_impact: Some(12.0),
            fuel_consumption_ratio: Some(0.95),
            ..Default::default()
        };
        let a = assignment(AssignmentType::Relay);
        let score = calc.calculate(a.driver_id, &a, &metrics);

        let w = calc.weights();
        let expected = score.empty_miles_score * w.empty_miles
            + score.network_score * w.network
            + score.on_time_score * w.on_time
            + score.hub_score * w.hub
            + score.fuel_score * w.fuel;
        assert!((score.total_score - clamp_score(expected)).abs() < 1e-9);

        for s in [
            score.empty_miles_score,
            score.network_score,
            score.on_time_score,
            score.hub_score,
            score.fuel_score,
            score.total_score,
        ] {
            assert!((0.0..=100.0).contains(&s));
        }
    }

    #[test]
    fn test_randomized_components_stay_in_range() {
        // Cheap xorshift instead of pulling in a rand dependency.
        let calc = ScoreCalculator::default();
        let mut state: u64 = 0x5eed;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 10_000) as f64 / 10_000.0
        };

        for _ in 0..200 {
            let metrics = DriverMetrics {
                empty_miles_pct: Some(next()),
                network_impact: Some(next() * 200.0 - 100.0),
                load_balancing: Some(next() * 40.0),
                high_demand_area: next() > 0.5,
                utilization: Some(next() * 2.0),
                strategic_value: Some(next() * 40.0),
                fuel_consumption_ratio: Some(next() * 3.0),
                idling_pct: Some(next()),
                eco_driving: Some(next()),
                ..Default::default()
            };
            let a = assignment(AssignmentType::Regular);
            let score = calc.calculate(a.driver_id, &a, &metrics);
            for s in [
                score.empty_miles_score,
                score.network_score,
                score.on_time_score,
                score.hub_score,
                score.fuel_score,
                score.total_score,
            ] {
                assert!((0.0..=100.0).contains(&s), "out of range: {s}");
            }
        }
    }
}
