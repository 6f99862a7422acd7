//! Geofenced bonus zone types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Vertex count used when materializing a circular zone into a polygon.
const CIRCLE_VERTICES: usize = 32;

/// Mean Earth radius in miles, for great-circle distances.
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// A geofenced, time-bounded area applying a payout multiplier.
///
/// The boundary is always a polygon; circular zones are materialized into
/// polygon vertices at creation time so containment checks have one shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusZone {
    pub id: Uuid,
    pub name: String,
    pub boundary: Vec<GeoPoint>,
    pub multiplier: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
}

impl BonusZone {
    /// A polygonal zone. Validates the boundary, multiplier, and window.
    pub fn polygon(
        name: &str,
        boundary: Vec<GeoPoint>,
        multiplier: f64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self, ZoneValidationError> {
        if boundary.len() < 3 {
            return Err(ZoneValidationError::BoundaryTooSmall(boundary.len()));
        }
        Self::validated(name, boundary, multiplier, start_time, end_time)
    }

    /// A circular zone, materialized into a polygon approximation.
    pub fn circle(
        name: &str,
        center: GeoPoint,
        radius_miles: f64,
        multiplier: f64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self, ZoneValidationError> {
        if radius_miles <= 0.0 {
            return Err(ZoneValidationError::InvalidRadius(radius_miles));
        }
        Self::validated(
            name,
            materialize_circle(center, radius_miles),
            multiplier,
            start_time,
            end_time,
        )
    }

    fn validated(
        name: &str,
        boundary: Vec<GeoPoint>,
        multiplier: f64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self, ZoneValidationError> {
        if !(1.0..=3.0).contains(&multiplier) {
            return Err(ZoneValidationError::InvalidMultiplier(multiplier));
        }
        if start_time >= end_time {
            return Err(ZoneValidationError::InvalidWindow);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            boundary,
            multiplier,
            start_time,
            end_time,
            is_active: true,
        })
    }

    /// Whether the zone is live at the instant: active flag set and
    /// `start_time <= at < end_time`.
    pub fn is_live(&self, at: DateTime<Utc>) -> bool {
        self.is_active && at >= self.start_time && at < self.end_time
    }

    /// The zone's reference vertex, used for radius queries.
    pub fn reference_vertex(&self) -> Option<GeoPoint> {
        self.boundary.first().copied()
    }
}

/// Approximate a circle with an equal-angle polygon.
///
/// Longitude offsets are corrected for latitude so the shape stays
/// roughly circular away from the equator.
fn materialize_circle(center: GeoPoint, radius_miles: f64) -> Vec<GeoPoint> {
    let lat_rad = center.lat.to_radians();
    let dlat = (radius_miles / EARTH_RADIUS_MILES).to_degrees();
    let dlng = dlat / lat_rad.cos().max(1e-6);

    (0..CIRCLE_VERTICES)
        .map(|i| {
            let angle = 2.0 * std::f64::consts::PI * i as f64 / CIRCLE_VERTICES as f64;
            GeoPoint::new(
                center.lat + dlat * angle.sin(),
                center.lng + dlng * angle.cos(),
            )
        })
        .collect()
}

/// Zone construction failures.
#[derive(Debug, thiserror::Error)]
pub enum ZoneValidationError {
    #[error("Multiplier {0} outside [1.0, 3.0]")]
    InvalidMultiplier(f64),

    #[error("Zone start time must be before end time")]
    InvalidWindow,

    #[error("Polygon boundary needs at least 3 vertices, got {0}")]
    BoundaryTooSmall(usize),

    #[error("Radius must be positive, got {0}")]
    InvalidRadius(f64),
}
