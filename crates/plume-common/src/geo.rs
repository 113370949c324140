//! Geodetic points.

use serde::{Deserialize, Serialize};

use crate::error::{PlumeError, PlumeResult};

/// A WGS84 point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    /// Create a point, rejecting coordinates outside the WGS84 domain.
    pub fn new(lon: f64, lat: f64) -> PlumeResult<Self> {
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(PlumeError::invalid_input(
                "lon",
                format!("{} is outside [-180, 180]", lon),
            ));
        }
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(PlumeError::invalid_input(
                "lat",
                format!("{} is outside [-90, 90]", lat),
            ));
        }

        Ok(Self { lon, lat })
    }

    /// Check the invariant on a point that was built without `new` (e.g. deserialized).
    pub fn validate(&self) -> PlumeResult<()> {
        Self::new(self.lon, self.lat).map(|_| ())
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lon, self.lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_point() {
        let p = GeoPoint::new(5.9053, 31.6585).unwrap();
        assert_eq!(p.lon, 5.9053);
        assert_eq!(p.lat, 31.6585);
    }

    #[test]
    fn test_out_of_range() {
        assert!(GeoPoint::new(181.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -90.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }
}
