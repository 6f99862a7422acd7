//! HaulScore - Freight Driver Gamification Engine
//!
//! Entry point for the scheduled maintenance run: finalizes leaderboards
//! whose period is ending, creates their successors, and hands payouts to
//! the reward coordinator.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use haulscore::events::TracingSink;
use haulscore::leaderboards::LeaderboardEngine;
use haulscore::rewards::RewardCoordinator;
use haulscore::storage::{load_config, Database};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting HaulScore v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let db = Arc::new(Database::open(&config.database_path())?);
    let sink = Arc::new(TracingSink);

    let engine = LeaderboardEngine::new(db.clone(), sink.clone(), config.producer.clone());
    let coordinator = RewardCoordinator::new(
        db,
        sink,
        config.producer.clone(),
        config.rewards.zone_base_bonus,
    );

    let outcome = engine.process_ending_leaderboards(config.leaderboards.rollover_days_threshold)?;

    for leaderboard_id in &outcome.finalized {
        let payout = coordinator.award_leaderboard_bonuses(*leaderboard_id)?;
        tracing::info!(
            leaderboard_id = %leaderboard_id,
            bonuses_created = payout.created,
            bonuses_failed = payout.failed,
            "Paid out finalized leaderboard"
        );
    }

    tracing::info!(
        finalized = outcome.finalized.len(),
        failed = outcome.failed,
        "Maintenance run complete"
    );
    Ok(())
}
