//! Achievement detection against the catalog.
//!
//! Evaluates score snapshots against active criteria, awards achievements
//! at most once per (driver, achievement), and tracks transient progress
//! with an in-process per-driver cache.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::types::{
    Achievement, AchievementCriteria, AchievementProgress, CriteriaParams, DriverAchievement,
    MetricType,
};
use crate::events::{emit, EventEnvelope, EventSink, EventType};
use crate::scoring::types::{DriverMetrics, DriverScore};
use crate::storage::{AchievementStore, Database, DatabaseError};

/// Detects and awards achievements.
pub struct AchievementDetector {
    store: AchievementStore,
    sink: Arc<dyn EventSink>,
    producer: String,
    /// Per-driver progress cache; no TTL, invalidated on new activity.
    progress_cache: Mutex<HashMap<Uuid, Vec<AchievementProgress>>>,
}

impl AchievementDetector {
    pub fn new(db: Arc<Database>, sink: Arc<dyn EventSink>, producer: String) -> Self {
        Self {
            store: AchievementStore::new(db),
            sink,
            producer,
            progress_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &AchievementStore {
        &self.store
    }

    /// Evaluate all active, not-yet-earned achievements for a score snapshot.
    ///
    /// Returns the achievements newly earned by this evaluation. A losing
    /// concurrent award is a no-op and is not reported.
    pub fn detect(
        &self,
        score: &DriverScore,
        metrics: &DriverMetrics,
    ) -> Result<Vec<Achievement>, AchievementError> {
        let driver_id = score.driver_id;

        // A new snapshot is new activity even when nothing is earned;
        // cached progress for the driver is stale from here on.
        self.invalidate_progress(driver_id);

        let earned: HashSet<Uuid> = self
            .store
            .earned_for_driver(driver_id)?
            .iter()
            .map(|e| e.achievement_id)
            .collect();

        let mut newly_earned = Vec::new();

        for achievement in self.store.active_achievements()? {
            if earned.contains(&achievement.id) {
                continue;
            }
            if !criteria_applies(&achievement.criteria, metrics) {
                continue;
            }

            let value = extract_metric(achievement.criteria.metric_type, score, metrics);
            if !achievement
                .criteria
                .comparison_operator
                .compare(value, achievement.criteria.threshold)
            {
                continue;
            }

            let data = serde_json::json!({
                "metric_type": achievement.criteria.metric_type.as_str(),
                "value": value,
                "score_id": score.id,
            });

            // The unique constraint decides the race; None means another
            // detector run won.
            let Some(awarded) = self.store.award(driver_id, achievement.id, Some(&data))? else {
                continue;
            };

            tracing::info!(
                driver_id = %driver_id,
                achievement = %achievement.name,
                "Achievement earned"
            );

            emit(
                self.sink.as_ref(),
                EventEnvelope::new(
                    EventType::AchievementEarned,
                    &self.producer,
                    serde_json::json!({
                        "driver_id": driver_id,
                        "achievement_id": achievement.id,
                        "name": achievement.name,
                        "points": achievement.points,
                        "earned_at": awarded.earned_at,
                    }),
                ),
            );

            newly_earned.push(achievement);
        }

        Ok(newly_earned)
    }

    /// Award an achievement directly (administrative path).
    ///
    /// Unlike [`detect`](Self::detect), an already-earned pair here is a
    /// conflict surfaced to the caller.
    pub fn award(
        &self,
        driver_id: Uuid,
        achievement_id: Uuid,
    ) -> Result<DriverAchievement, AchievementError> {
        let achievement = self
            .store
            .get(achievement_id)?
            .ok_or_else(|| AchievementError::NotFound(achievement_id.to_string()))?;

        let Some(awarded) = self.store.award(driver_id, achievement_id, None)? else {
            return Err(AchievementError::Conflict(format!(
                "driver {driver_id} already earned {}",
                achievement.name
            )));
        };

        self.invalidate_progress(driver_id);
        emit(
            self.sink.as_ref(),
            EventEnvelope::new(
                EventType::AchievementEarned,
                &self.producer,
                serde_json::json!({
                    "driver_id": driver_id,
                    "achievement_id": achievement_id,
                    "name": achievement.name,
                    "points": achievement.points,
                    "earned_at": awarded.earned_at,
                }),
            ),
        );
        Ok(awarded)
    }

    /// Revoke an earned achievement.
    pub fn revoke(&self, driver_id: Uuid, achievement_id: Uuid) -> Result<(), AchievementError> {
        if !self.store.revoke(driver_id, achievement_id)? {
            return Err(AchievementError::NotFound(format!(
                "driver {driver_id} has not earned achievement {achievement_id}"
            )));
        }

        self.invalidate_progress(driver_id);
        emit(
            self.sink.as_ref(),
            EventEnvelope::new(
                EventType::AchievementRevoked,
                &self.producer,
                serde_json::json!({
                    "driver_id": driver_id,
                    "achievement_id": achievement_id,
                }),
            ),
        );
        Ok(())
    }

    /// Whether the driver has earned the achievement.
    pub fn has_achievement(
        &self,
        driver_id: Uuid,
        achievement_id: Uuid,
    ) -> Result<bool, AchievementError> {
        Ok(self.store.is_earned(driver_id, achievement_id)?)
    }

    /// Progress toward every active achievement for a driver.
    ///
    /// Earned achievements report 100% completed; others are computed from
    /// the latest snapshot. Results are cached per driver until
    /// [`invalidate_progress`](Self::invalidate_progress) is called by the
    /// producer of new activity.
    pub fn driver_progress(
        &self,
        driver_id: Uuid,
        score: &DriverScore,
        metrics: &DriverMetrics,
    ) -> Result<Vec<AchievementProgress>, AchievementError> {
        if let Some(cached) = self
            .progress_cache
            .lock()
            .expect("cache poisoned")
            .get(&driver_id)
        {
            return Ok(cached.clone());
        }

        let earned: HashSet<Uuid> = self
            .store
            .earned_for_driver(driver_id)?
            .iter()
            .map(|e| e.achievement_id)
            .collect();

        let mut progress = Vec::new();
        for achievement in self.store.active_achievements()? {
            if earned.contains(&achievement.id) {
                progress.push(AchievementProgress {
                    achievement_id: achievement.id,
                    current_value: achievement.criteria.threshold,
                    target_value: achievement.criteria.threshold,
                    progress_percentage: 100.0,
                    is_completed: true,
                });
            } else {
                let value = extract_metric(achievement.criteria.metric_type, score, metrics);
                progress.push(calculate_progress(&achievement, value));
            }
        }

        self.progress_cache
            .lock()
            .expect("cache poisoned")
            .insert(driver_id, progress.clone());

        Ok(progress)
    }

    /// Drop the cached progress for a driver.
    pub fn invalidate_progress(&self, driver_id: Uuid) {
        self.progress_cache
            .lock()
            .expect("cache poisoned")
            .remove(&driver_id);
    }
}

/// Extract the scalar a metric type refers to from the snapshot or metrics bag.
pub fn extract_metric(metric_type: MetricType, score: &DriverScore, metrics: &DriverMetrics) -> f64 {
    match metric_type {
        MetricType::EfficiencyScore => score.total_score,
        MetricType::EmptyMilesReduction => metrics.empty_miles_pct.unwrap_or(1.0),
        MetricType::NetworkContribution => score.network_score,
        MetricType::OnTimePercentage => metrics.on_time_pct.unwrap_or(score.on_time_score),
        MetricType::HubUsage => score.hub_score,
        MetricType::FuelEfficiency => score.fuel_score,
        MetricType::LoadsCompleted => metrics.loads_completed as f64,
        MetricType::MilesDriven => metrics.miles_driven,
        MetricType::RelayParticipation => metrics.relay_loads_completed as f64,
    }
}

/// Progress toward a single achievement, clamped to 0..=100.
///
/// For lower-is-better operators the scale is inverted around a base value
/// (explicit `InvertedScale` param, or twice the threshold by default) so
/// that approaching the threshold from above still reads as rising progress.
pub fn calculate_progress(achievement: &Achievement, current_value: f64) -> AchievementProgress {
    let criteria = &achievement.criteria;
    let threshold = criteria.threshold;
    let is_completed = criteria.comparison_operator.compare(current_value, threshold);

    let progress_percentage = if criteria.comparison_operator.lower_is_better() {
        let base = match criteria.additional_params {
            Some(CriteriaParams::InvertedScale { base_value }) => base_value,
            _ => threshold * 2.0,
        };
        if (base - threshold).abs() < f64::EPSILON {
            if is_completed {
                100.0
            } else {
                0.0
            }
        } else {
            ((base - current_value) / (base - threshold) * 100.0).clamp(0.0, 100.0)
        }
    } else if threshold <= 0.0 {
        if is_completed {
            100.0
        } else {
            0.0
        }
    } else {
        (current_value / threshold * 100.0).clamp(0.0, 100.0)
    };

    AchievementProgress {
        achievement_id: achievement.id,
        current_value,
        target_value: threshold,
        progress_percentage,
        is_completed,
    }
}

/// Whether a criterion applies to the activity described by the metrics bag.
fn criteria_applies(criteria: &AchievementCriteria, metrics: &DriverMetrics) -> bool {
    match &criteria.additional_params {
        Some(CriteriaParams::Region { region }) => metrics
            .region
            .as_deref()
            .map(|r| r.eq_ignore_ascii_case(region))
            .unwrap_or(false),
        _ => true,
    }
}

/// Achievement errors.
#[derive(Debug, thiserror::Error)]
pub enum AchievementError {
    #[error("Achievement not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::types::{
        AchievementCategory, AchievementLevel, ComparisonOperator, CriteriaTimeframe,
    };
    use crate::events::MemorySink;
    use crate::scoring::types::ScoreFactors;
    use chrono::Utc;

    fn achievement_with(
        metric_type: MetricType,
        operator: ComparisonOperator,
        threshold: f64,
        params: Option<CriteriaParams>,
    ) -> Achievement {
        Achievement::new(
            "Test",
            AchievementCategory::Efficiency,
            AchievementLevel::Bronze,
            100.0,
            AchievementCriteria {
                metric_type,
                threshold,
                timeframe: CriteriaTimeframe::AllTime,
                comparison_operator: operator,
                additional_params: params,
            },
        )
    }

    fn score_with_total(total: f64) -> DriverScore {
        DriverScore {
            id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            empty_miles_score: 50.0,
            network_score: 50.0,
            on_time_score: 70.0,
            hub_score: 40.0,
            fuel_score: 50.0,
            total_score: total,
            factors: ScoreFactors::default(),
            calculated_at: Utc::now(),
        }
    }

    #[test]
    fn test_progress_monotone_toward_threshold() {
        let achievement = achievement_with(
            MetricType::EfficiencyScore,
            ComparisonOperator::GreaterOrEqual,
            90.0,
            None,
        );

        let mut last = -1.0;
        for value in [0.0, 30.0, 45.0, 60.0, 89.9, 90.0, 95.0] {
            let p = calculate_progress(&achievement, value);
            assert!(p.progress_percentage >= last);
            last = p.progress_percentage;
        }

        let at = calculate_progress(&achievement, 90.0);
        assert_eq!(at.progress_percentage, 100.0);
        assert!(at.is_completed);

        let past = calculate_progress(&achievement, 99.0);
        assert_eq!(past.progress_percentage, 100.0);
    }

    #[test]
    fn test_progress_inverted_for_lower_is_better() {
        // Reach 10% empty miles, starting from a 50% base
        let achievement = achievement_with(
            MetricType::EmptyMilesReduction,
            ComparisonOperator::LessOrEqual,
            0.10,
            Some(CriteriaParams::InvertedScale { base_value: 0.50 }),
        );

        let far = calculate_progress(&achievement, 0.50);
        assert_eq!(far.progress_percentage, 0.0);

        let halfway = calculate_progress(&achievement, 0.30);
        assert!((halfway.progress_percentage - 50.0).abs() < 1e-9);

        let done = calculate_progress(&achievement, 0.10);
        assert_eq!(done.progress_percentage, 100.0);
        assert!(done.is_completed);

        // Past the threshold stays clamped at 100
        let past = calculate_progress(&achievement, 0.05);
        assert_eq!(past.progress_percentage, 100.0);
    }

    #[test]
    fn test_progress_inverted_default_base() {
        // No explicit base: defaults to threshold * 2
        let achievement = achievement_with(
            MetricType::EmptyMilesReduction,
            ComparisonOperator::Less,
            0.20,
            None,
        );
        let p = calculate_progress(&achievement, 0.30);
        // base 0.40: (0.40 - 0.30) / (0.40 - 0.20) = 50%
        assert!((p.progress_percentage - 50.0).abs() < 1e-9);
        assert!(!p.is_completed);
    }

    #[test]
    fn test_detect_awards_once() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let sink = Arc::new(MemorySink::new());
        let detector =
            AchievementDetector::new(db.clone(), sink.clone(), "haulscore-test".to_string());

        let achievement = achievement_with(
            MetricType::EfficiencyScore,
            ComparisonOperator::GreaterOrEqual,
            80.0,
            None,
        );
        detector.store().insert_achievement(&achievement).unwrap();

        let score = score_with_total(85.0);
        let metrics = DriverMetrics::default();

        let first = detector.detect(&score, &metrics).unwrap();
        assert_eq!(first.len(), 1);

        // A second detection run finds it already earned
        let second = detector.detect(&score, &metrics).unwrap();
        assert!(second.is_empty());

        assert_eq!(sink.events_of(EventType::AchievementEarned).len(), 1);
    }

    #[test]
    fn test_detect_skips_below_threshold() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let sink = Arc::new(MemorySink::new());
        let detector = AchievementDetector::new(db, sink, "haulscore-test".to_string());

        let achievement = achievement_with(
            MetricType::EfficiencyScore,
            ComparisonOperator::Greater,
            90.0,
            None,
        );
        detector.store().insert_achievement(&achievement).unwrap();

        let earned = detector
            .detect(&score_with_total(90.0), &DriverMetrics::default())
            .unwrap();
        assert!(earned.is_empty());
    }

    #[test]
    fn test_region_param_gates_detection() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let sink = Arc::new(MemorySink::new());
        let detector = AchievementDetector::new(db, sink, "haulscore-test".to_string());

        let achievement = achievement_with(
            MetricType::EfficiencyScore,
            ComparisonOperator::GreaterOrEqual,
            50.0,
            Some(CriteriaParams::Region {
                region: "midwest".to_string(),
            }),
        );
        detector.store().insert_achievement(&achievement).unwrap();

        let score = score_with_total(75.0);
        let other_region = DriverMetrics {
            region: Some("west".to_string()),
            ..Default::default()
        };
        assert!(detector.detect(&score, &other_region).unwrap().is_empty());

        let matching = DriverMetrics {
            region: Some("Midwest".to_string()),
            ..Default::default()
        };
        assert_eq!(detector.detect(&score, &matching).unwrap().len(), 1);
    }

    #[test]
    fn test_manual_award_conflict() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let sink = Arc::new(MemorySink::new());
        let detector = AchievementDetector::new(db, sink, "haulscore-test".to_string());

        let achievement = achievement_with(
            MetricType::LoadsCompleted,
            ComparisonOperator::GreaterOrEqual,
            100.0,
            None,
        );
        detector.store().insert_achievement(&achievement).unwrap();

        let driver_id = Uuid::new_v4();
        detector.award(driver_id, achievement.id).unwrap();
        assert!(matches!(
            detector.award(driver_id, achievement.id),
            Err(AchievementError::Conflict(_))
        ));
    }

    #[test]
    fn test_revoke_missing_is_not_found() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let sink = Arc::new(MemorySink::new());
        let detector = AchievementDetector::new(db, sink, "haulscore-test".to_string());

        assert!(matches!(
            detector.revoke(Uuid::new_v4(), Uuid::new_v4()),
            Err(AchievementError::NotFound(_))
        ));
    }

    #[test]
    fn test_progress_cache_and_invalidation() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let sink = Arc::new(MemorySink::new());
        let detector = AchievementDetector::new(db, sink, "haulscore-test".to_string());

        let achievement = achievement_with(
            MetricType::EfficiencyScore,
            ComparisonOperator::GreaterOrEqual,
            90.0,
            None,
        );
        detector.store().insert_achievement(&achievement).unwrap();

        let score = score_with_total(45.0);
        let metrics = DriverMetrics::default();
        let driver_id = score.driver_id;

        let p1 = detector.driver_progress(driver_id, &score, &metrics).unwrap();
        assert_eq!(p1.len(), 1);
        assert!((p1[0].progress_percentage - 50.0).abs() < 1e-9);

        // Cached between reads: a better snapshot alone does not refresh
        let better = DriverScore {
            total_score: 72.0,
            ..score.clone()
        };
        let p2 = detector
            .driver_progress(driver_id, &better, &metrics)
            .unwrap();
        assert!((p2[0].progress_percentage - 50.0).abs() < 1e-9);

        // A detect pass is new activity even when nothing is earned, so
        // the next read reflects the newer snapshot
        let earned = detector.detect(&better, &metrics).unwrap();
        assert!(earned.is_empty());
        let p3 = detector
            .driver_progress(driver_id, &better, &metrics)
            .unwrap();
        assert!((p3[0].progress_percentage - 80.0).abs() < 1e-9);

        // Explicit invalidation still works for administrative callers
        detector.invalidate_progress(driver_id);
        let best = DriverScore {
            total_score: 90.0,
            ..score
        };
        let p4 = detector.driver_progress(driver_id, &best, &metrics).unwrap();
        assert_eq!(p4[0].progress_percentage, 100.0);
    }
}
