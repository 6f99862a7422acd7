//! Engine event publishing.
//!
//! Every state change the engine commits is announced through an [`EventSink`].
//! Publish failures never roll back the already-committed write; callers go
//! through [`emit`], which logs the failure and swallows it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// Event types emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ScoreUpdated,
    ScoreMilestoneReached,
    AchievementEarned,
    AchievementRevoked,
    LeaderboardUpdated,
    LeaderboardRankChanged,
    LeaderboardPeriodEnded,
    RewardCreated,
    RewardIssued,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ScoreUpdated => "SCORE_UPDATED",
            EventType::ScoreMilestoneReached => "SCORE_MILESTONE_REACHED",
            EventType::AchievementEarned => "ACHIEVEMENT_EARNED",
            EventType::AchievementRevoked => "ACHIEVEMENT_REVOKED",
            EventType::LeaderboardUpdated => "LEADERBOARD_UPDATED",
            EventType::LeaderboardRankChanged => "LEADERBOARD_RANK_CHANGED",
            EventType::LeaderboardPeriodEnded => "LEADERBOARD_PERIOD_ENDED",
            EventType::RewardCreated => "REWARD_CREATED",
            EventType::RewardIssued => "REWARD_ISSUED",
        }
    }

    /// Event category used for routing on the bus side.
    pub fn category(&self) -> &'static str {
        match self {
            EventType::ScoreUpdated | EventType::ScoreMilestoneReached => "score",
            EventType::AchievementEarned | EventType::AchievementRevoked => "achievement",
            EventType::LeaderboardUpdated
            | EventType::LeaderboardRankChanged
            | EventType::LeaderboardPeriodEnded => "leaderboard",
            EventType::RewardCreated | EventType::RewardIssued => "reward",
        }
    }
}

/// Envelope wrapping every published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub event_version: u16,
    pub event_time: DateTime<Utc>,
    pub producer: String,
    pub correlation_id: Option<Uuid>,
    pub category: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Build an envelope for the given type and payload.
    pub fn new(event_type: EventType, producer: &str, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            event_version: 1,
            event_time: Utc::now(),
            producer: producer.to_string(),
            correlation_id: None,
            category: event_type.category().to_string(),
            payload,
        }
    }

    /// Attach a correlation id linking this event to its triggering request.
    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// Transport seam for event publication.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &EventEnvelope) -> Result<(), EventError>;
}

/// Publish an event, logging and swallowing any failure.
///
/// The triggering write has already committed; a bus outage must not
/// surface to the caller.
pub fn emit(sink: &dyn EventSink, event: EventEnvelope) {
    let event_type = event.event_type.as_str();
    if let Err(e) = sink.publish(&event) {
        tracing::warn!("Failed to publish {} event: {}", event_type, e);
    }
}

/// Sink that logs events through tracing. Default for the maintenance binary.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &EventEnvelope) -> Result<(), EventError> {
        tracing::info!(
            event_type = event.event_type.as_str(),
            category = %event.category,
            event_id = %event.event_id,
            "event: {}",
            event.payload
        );
        Ok(())
    }
}

/// Sink that captures events in memory. Used by tests.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<EventEnvelope>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured events, in publish order.
    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events.lock().expect("sink poisoned").clone()
    }

    /// Captured events of the given type.
    pub fn events_of(&self, event_type: EventType) -> Vec<EventEnvelope> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: &EventEnvelope) -> Result<(), EventError> {
        self.events.lock().expect("sink poisoned").push(event.clone());
        Ok(())
    }
}

/// Event publication errors.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Publish failed: {0}")]
    PublishFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_fields() {
        let event = EventEnvelope::new(
            EventType::ScoreUpdated,
            "haulscore-test",
            serde_json::json!({"driver_id": "d1"}),
        );
        assert_eq!(event.event_version, 1);
        assert_eq!(event.category, "score");
        assert_eq!(event.producer, "haulscore-test");
        assert!(event.correlation_id.is_none());
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(EventType::RewardIssued.category(), "reward");
        assert_eq!(EventType::LeaderboardPeriodEnded.category(), "leaderboard");
        assert_eq!(EventType::AchievementRevoked.category(), "achievement");
    }

    #[test]
    fn test_memory_sink_captures() {
        let sink = MemorySink::new();
        emit(
            &sink,
            EventEnvelope::new(EventType::RewardCreated, "t", serde_json::json!({})),
        );
        emit(
            &sink,
            EventEnvelope::new(EventType::RewardIssued, "t", serde_json::json!({})),
        );
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.events_of(EventType::RewardIssued).len(), 1);
    }

    struct FailingSink;
    impl EventSink for FailingSink {
        fn publish(&self, _event: &EventEnvelope) -> Result<(), EventError> {
            Err(EventError::PublishFailed("bus down".to_string()))
        }
    }

    #[test]
    fn test_emit_swallows_failure() {
        // Must not panic or propagate.
        emit(
            &FailingSink,
            EventEnvelope::new(EventType::ScoreUpdated, "t", serde_json::json!({})),
        );
    }
}
