//! Integration tests for the load-completion pipeline.
//!
//! Exercises the full flow a completed load triggers: scoring and
//! persistence, achievement detection, leaderboard re-ranking, and the
//! reward records produced along the way.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use haulscore::achievements::{
    Achievement, AchievementCategory, AchievementCriteria, AchievementDetector, AchievementLevel,
    ComparisonOperator, CriteriaTimeframe, MetricType,
};
use haulscore::events::{EventType, MemorySink};
use haulscore::leaderboards::{
    BonusStructure, Leaderboard, LeaderboardEngine, LeaderboardTimeframe, LeaderboardType,
};
use haulscore::rewards::{BonusSource, RewardCoordinator};
use haulscore::scoring::{
    AssignmentType, DriverMetrics, LoadAssignment, ScoreCalculator, ScoreService, ScoreWeights,
};
use haulscore::storage::Database;
use haulscore::zones::{BonusZone, BonusZoneEngine, GeoPoint};

const PRODUCER: &str = "haulscore-test";

struct Harness {
    sink: Arc<MemorySink>,
    scores: ScoreService,
    detector: AchievementDetector,
    leaderboards: LeaderboardEngine,
    zones: BonusZoneEngine,
    rewards: RewardCoordinator,
}

fn harness() -> Harness {
    let db = Arc::new(Database::open_in_memory().expect("database"));
    let sink = Arc::new(MemorySink::new());
    Harness {
        scores: ScoreService::new(
            db.clone(),
            ScoreCalculator::new(ScoreWeights::default()),
            sink.clone(),
            PRODUCER.to_string(),
            vec![50.0, 75.0, 90.0, 95.0, 100.0],
        ),
        detector: AchievementDetector::new(db.clone(), sink.clone(), PRODUCER.to_string()),
        leaderboards: LeaderboardEngine::new(db.clone(), sink.clone(), PRODUCER.to_string()),
        zones: BonusZoneEngine::new(db.clone()),
        rewards: RewardCoordinator::new(db, sink.clone(), PRODUCER.to_string(), 25.0),
        sink,
    }
}

fn strong_metrics() -> DriverMetrics {
    DriverMetrics {
        region: Some("midwest".to_string()),
        empty_miles_pct: Some(0.10),
        network_impact: Some(30.0),
        load_balancing: Some(15.0),
        high_demand_area: true,
        utilization: Some(0.9),
        strategic_value: Some(10.0),
        fuel_consumption_ratio: Some(0.85),
        idling_pct: Some(0.02),
        eco_driving: Some(0.8),
        loads_completed: 120,
        miles_driven: 48_000.0,
        on_time_pct: Some(96.5),
        ..Default::default()
    }
}

fn on_time_assignment(driver_id: Uuid) -> LoadAssignment {
    let pickup = Utc::now() - Duration::hours(8);
    let delivery = Utc::now() - Duration::hours(1);
    LoadAssignment {
        scheduled_pickup: Some(pickup),
        actual_pickup: Some(pickup - Duration::minutes(5)),
        scheduled_delivery: Some(delivery),
        actual_delivery: Some(delivery - Duration::minutes(10)),
        distance_miles: 420.0,
        rate: 1200.0,
        ..LoadAssignment::bare(driver_id, AssignmentType::Regular)
    }
}

#[test]
fn load_completion_feeds_achievements_and_leaderboards() {
    let h = harness();
    let driver_id = Uuid::new_v4();

    let achievement = Achievement::new(
        "Century Hauler",
        AchievementCategory::Milestone,
        AchievementLevel::Gold,
        200.0,
        AchievementCriteria {
            metric_type: MetricType::LoadsCompleted,
            threshold: 100.0,
            timeframe: CriteriaTimeframe::AllTime,
            comparison_operator: ComparisonOperator::GreaterOrEqual,
            additional_params: None,
        },
    );
    h.detector.store().insert_achievement(&achievement).unwrap();

    let now = Utc::now();
    let board = Leaderboard::new(
        "Weekly Efficiency",
        LeaderboardType::OverallEfficiency,
        LeaderboardTimeframe::Weekly,
        None,
        now - Duration::days(2),
        now + Duration::days(5),
        BonusStructure::default(),
    );
    h.leaderboards.store().insert_leaderboard(&board).unwrap();

    let metrics = strong_metrics();
    let score = h
        .scores
        .record_load_completion(&on_time_assignment(driver_id), &metrics)
        .unwrap();
    assert!(score.total_score > 0.0 && score.total_score <= 100.0);

    let earned = h.detector.detect(&score, &metrics).unwrap();
    assert_eq!(earned.len(), 1);
    assert_eq!(earned[0].name, "Century Hauler");

    let entries = h
        .leaderboards
        .update_driver_ranking(&score, metrics.region.as_deref())
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].rank, 1);

    // The earned achievement pays out its catalog points
    let bonus = h
        .rewards
        .handle_achievement_earned(driver_id, achievement.id)
        .unwrap();
    assert_eq!(bonus.amount, 200.0);
    assert_eq!(bonus.source_type, BonusSource::Achievement);

    assert_eq!(h.sink.events_of(EventType::ScoreUpdated).len(), 1);
    assert_eq!(h.sink.events_of(EventType::AchievementEarned).len(), 1);
    assert_eq!(h.sink.events_of(EventType::LeaderboardUpdated).len(), 1);
    assert_eq!(h.sink.events_of(EventType::RewardCreated).len(), 1);
}

#[test]
fn milestone_events_fire_once_per_crossing() {
    let h = harness();
    let driver_id = Uuid::new_v4();

    // A strong first load crosses 50 and 75 from the zero baseline
    h.scores
        .record_load_completion(&on_time_assignment(driver_id), &strong_metrics())
        .unwrap();
    let milestones = h.sink.events_of(EventType::ScoreMilestoneReached);
    assert!(!milestones.is_empty());

    // A comparable second load crosses nothing new
    h.scores
        .record_load_completion(&on_time_assignment(driver_id), &strong_metrics())
        .unwrap();
    assert_eq!(
        h.sink.events_of(EventType::ScoreMilestoneReached).len(),
        milestones.len()
    );
}

#[test]
fn score_history_is_append_only() {
    let h = harness();
    let driver_id = Uuid::new_v4();

    for _ in 0..3 {
        h.scores
            .record_load_completion(&on_time_assignment(driver_id), &strong_metrics())
            .unwrap();
    }

    let history = h.scores.score_history(driver_id, 10).unwrap();
    assert_eq!(history.len(), 3);

    let latest = h.scores.latest_score(driver_id).unwrap().unwrap();
    assert_eq!(latest.id, history[0].id);
}

#[test]
fn zone_traversal_creates_multiplied_bonus() {
    let h = harness();
    let driver_id = Uuid::new_v4();
    let now = Utc::now();

    let zone = BonusZone::circle(
        "chicago hub",
        GeoPoint::new(41.88, -87.63),
        15.0,
        2.0,
        now - Duration::hours(1),
        now + Duration::hours(12),
    )
    .unwrap();
    h.zones.store().insert_zone(&zone).unwrap();

    // The driver's position falls inside the zone
    let matched = h
        .zones
        .check_position(GeoPoint::new(41.88, -87.63))
        .unwrap()
        .expect("zone match");
    assert_eq!(matched.id, zone.id);

    let bonus = h
        .rewards
        .handle_zone_traversal(driver_id, matched.id, Some(Uuid::new_v4()))
        .unwrap();
    assert_eq!(bonus.amount, 50.0);

    let paid = h.rewards.mark_bonus_paid(bonus.id).unwrap();
    assert!(paid.paid);
    assert_eq!(h.sink.events_of(EventType::RewardIssued).len(), 1);
}

#[test]
fn revoked_achievement_can_be_earned_again() {
    let h = harness();
    let driver_id = Uuid::new_v4();

    let achievement = Achievement::new(
        "On The Dot",
        AchievementCategory::Consistency,
        AchievementLevel::Silver,
        100.0,
        AchievementCriteria {
            metric_type: MetricType::OnTimePercentage,
            threshold: 95.0,
            timeframe: CriteriaTimeframe::AllTime,
            comparison_operator: ComparisonOperator::GreaterOrEqual,
            additional_params: None,
        },
    );
    h.detector.store().insert_achievement(&achievement).unwrap();

    let metrics = strong_metrics();
    let score = h
        .scores
        .record_load_completion(&on_time_assignment(driver_id), &metrics)
        .unwrap();

    assert_eq!(h.detector.detect(&score, &metrics).unwrap().len(), 1);
    assert!(h.detector.has_achievement(driver_id, achievement.id).unwrap());

    h.detector.revoke(driver_id, achievement.id).unwrap();
    assert!(!h.detector.has_achievement(driver_id, achievement.id).unwrap());
    assert_eq!(h.sink.events_of(EventType::AchievementRevoked).len(), 1);

    // Re-detection awards it again
    assert_eq!(h.detector.detect(&score, &metrics).unwrap().len(), 1);
}
