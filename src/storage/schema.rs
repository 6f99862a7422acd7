//! Database schema definitions for the gamification engine.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Driver efficiency score snapshots (append-only)
CREATE TABLE IF NOT EXISTS driver_scores (
    id TEXT PRIMARY KEY,
    driver_id TEXT NOT NULL,
    empty_miles_score REAL NOT NULL,
    network_score REAL NOT NULL,
    on_time_score REAL NOT NULL,
    hub_score REAL NOT NULL,
    fuel_score REAL NOT NULL,
    total_score REAL NOT NULL,
    factors_json TEXT NOT NULL,
    calculated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_driver_scores_driver_id ON driver_scores(driver_id);
CREATE INDEX IF NOT EXISTS idx_driver_scores_calculated_at ON driver_scores(calculated_at);

-- Achievement catalog (admin-managed, read-only to the engine)
CREATE TABLE IF NOT EXISTS achievements (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    category TEXT NOT NULL,
    level TEXT NOT NULL,
    points REAL NOT NULL,
    metric_type TEXT NOT NULL,
    threshold REAL NOT NULL,
    timeframe TEXT NOT NULL,
    comparison_operator TEXT NOT NULL,
    params_json TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);

-- Earned achievements; the UNIQUE pair enforces at-most-once award
CREATE TABLE IF NOT EXISTS driver_achievements (
    id TEXT PRIMARY KEY,
    driver_id TEXT NOT NULL,
    achievement_id TEXT NOT NULL REFERENCES achievements(id),
    earned_at TEXT NOT NULL,
    data_json TEXT,
    UNIQUE(driver_id, achievement_id)
);

CREATE INDEX IF NOT EXISTS idx_driver_achievements_driver_id ON driver_achievements(driver_id);

-- Leaderboards
CREATE TABLE IF NOT EXISTS leaderboards (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    board_type TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    region TEXT,
    period_start TEXT NOT NULL,
    period_end TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    bonus_structure_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_leaderboards_active ON leaderboards(is_active, period_end);

-- Leaderboard entries, one per (leaderboard, driver)
CREATE TABLE IF NOT EXISTS leaderboard_entries (
    id TEXT PRIMARY KEY,
    leaderboard_id TEXT NOT NULL REFERENCES leaderboards(id) ON DELETE CASCADE,
    driver_id TEXT NOT NULL,
    score REAL NOT NULL,
    rank INTEGER NOT NULL DEFAULT 0,
    previous_rank INTEGER,
    rank_change INTEGER NOT NULL DEFAULT 0,
    bonus_amount REAL NOT NULL DEFAULT 0,
    bonus_paid INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    UNIQUE(leaderboard_id, driver_id)
);

CREATE INDEX IF NOT EXISTS idx_leaderboard_entries_board ON leaderboard_entries(leaderboard_id);

-- Geofenced bonus zones (polygon vertices stored as JSON)
CREATE TABLE IF NOT EXISTS bonus_zones (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    boundary_json TEXT NOT NULL,
    multiplier REAL NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

-- Driver bonuses (immutable except the paid transition)
CREATE TABLE IF NOT EXISTS driver_bonuses (
    id TEXT PRIMARY KEY,
    driver_id TEXT NOT NULL,
    source_type TEXT NOT NULL,
    source_id TEXT NOT NULL,
    assignment_id TEXT,
    amount REAL NOT NULL,
    reason TEXT NOT NULL,
    paid INTEGER NOT NULL DEFAULT 0,
    earned_at TEXT NOT NULL,
    paid_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_driver_bonuses_driver_id ON driver_bonuses(driver_id);
CREATE INDEX IF NOT EXISTS idx_driver_bonuses_earned_at ON driver_bonuses(earned_at);
"#;

/// SQL for creating the schema version tracking table.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;
