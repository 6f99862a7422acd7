//! Regional empty-miles baselines.
//!
//! The empty-miles factor scores a driver's deadhead percentage against the
//! typical figure for the region they operate in. Unknown regions use
//! [`DEFAULT_BASELINE`].

/// Baseline empty-miles fraction when the region is unknown.
pub const DEFAULT_BASELINE: f64 = 0.35;

/// Fixed per-region baseline table.
const REGIONAL_BASELINES: &[(&str, f64)] = &[
    ("midwest", 0.38),
    ("northeast", 0.36),
    ("southeast", 0.33),
    ("southwest", 0.34),
    ("west", 0.32),
];

/// Baseline empty-miles fraction for a region (case-insensitive).
pub fn baseline_for(region: Option<&str>) -> f64 {
    let Some(region) = region else {
        return DEFAULT_BASELINE;
    };
    let region = region.to_lowercase();
    REGIONAL_BASELINES
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, baseline)| *baseline)
        .unwrap_or(DEFAULT_BASELINE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_region() {
        assert_eq!(baseline_for(Some("midwest")), 0.38);
        assert_eq!(baseline_for(Some("MidWest")), 0.38);
    }

    #[test]
    fn test_unknown_region_uses_default() {
        assert_eq!(baseline_for(Some("alaska")), DEFAULT_BASELINE);
        assert_eq!(baseline_for(None), DEFAULT_BASELINE);
    }
}
