//! Bonus zone position checks.
//!
//! Containment uses a ray-casting point-in-polygon test; radius queries
//! use the haversine great-circle distance against each zone's reference
//! vertex, an approximation rather than an exact overlap test.

use chrono::Utc;
use std::sync::Arc;

use super::types::{BonusZone, GeoPoint, EARTH_RADIUS_MILES};
use crate::storage::{BonusStore, Database, DatabaseError};

const MAX_RADIUS_MILES: f64 = 500.0;

/// Evaluates driver positions against active bonus zones.
pub struct BonusZoneEngine {
    store: BonusStore,
}

impl BonusZoneEngine {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            store: BonusStore::new(db),
        }
    }

    pub fn store(&self) -> &BonusStore {
        &self.store
    }

    /// The zone covering a position, if any.
    ///
    /// When zones overlap, the highest multiplier wins; among equal
    /// multipliers the zone with the earliest start time is chosen, so the
    /// result is deterministic regardless of storage order.
    pub fn check_position(&self, position: GeoPoint) -> Result<Option<BonusZone>, ZoneError> {
        let now = Utc::now();
        let mut best: Option<BonusZone> = None;

        for zone in self.store.active_zones()? {
            if !zone.is_live(now) || !contains_point(&zone.boundary, position) {
                continue;
            }
            let better = match &best {
                None => true,
                Some(current) => {
                    zone.multiplier > current.multiplier
                        || (zone.multiplier == current.multiplier
                            && zone.start_time < current.start_time)
                }
            };
            if better {
                best = Some(zone);
            }
        }

        Ok(best)
    }

    /// Live zones whose reference vertex lies within the radius.
    pub fn zones_in_radius(
        &self,
        position: GeoPoint,
        radius_miles: f64,
    ) -> Result<Vec<BonusZone>, ZoneError> {
        if !(0.0..=MAX_RADIUS_MILES).contains(&radius_miles) {
            return Err(ZoneError::Validation(format!(
                "radius must be within [0, {MAX_RADIUS_MILES}] miles, got {radius_miles}"
            )));
        }

        let now = Utc::now();
        let mut nearby = Vec::new();
        for zone in self.store.active_zones()? {
            if !zone.is_live(now) {
                continue;
            }
            if let Some(vertex) = zone.reference_vertex() {
                if haversine_miles(position, vertex) <= radius_miles {
                    nearby.push(zone);
                }
            }
        }
        Ok(nearby)
    }
}

/// Ray-casting point-in-polygon test.
///
/// Casts a ray in the +lng direction and counts edge crossings; an odd
/// count means the point is inside. Points on an edge may fall either way.
pub fn contains_point(boundary: &[GeoPoint], point: GeoPoint) -> bool {
    if boundary.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = boundary.len() - 1;
    for i in 0..boundary.len() {
        let a = boundary[i];
        let b = boundary[j];
        if (a.lat > point.lat) != (b.lat > point.lat) {
            let intersect_lng = (b.lng - a.lng) * (point.lat - a.lat) / (b.lat - a.lat) + a.lng;
            if point.lng < intersect_lng {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Great-circle distance between two positions in miles.
pub fn haversine_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().asin()
}

/// Zone lookup errors.
#[derive(Debug, thiserror::Error)]
pub enum ZoneError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Zone not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
