//! Geofenced bonus zones and position checks.

pub mod engine;
pub mod types;

// Re-export commonly used types
pub use engine::{BonusZoneEngine, ZoneError};
pub use types::{BonusZone, GeoPoint, ZoneValidationError};
