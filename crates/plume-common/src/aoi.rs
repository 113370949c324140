//! Area-of-interest rectangles around a point source.

use serde::{Deserialize, Serialize};

use crate::error::{PlumeError, PlumeResult};
use crate::geo::GeoPoint;

/// Metres per degree of latitude (and of longitude at the equator) used by
/// the equirectangular approximation.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// An axis-aligned geographic rectangle in degrees.
///
/// Built once around a source and then shared read-only by every step that
/// needs a spatial filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaOfInterest {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl AreaOfInterest {
    /// Create an area from corner coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Build a square area centred on `center` with the given half-width in metres.
    ///
    /// Longitude degrees are scaled by `cos(lat)`, so the builder is only valid
    /// away from the poles.
    pub fn around(center: GeoPoint, half_width_m: f64) -> PlumeResult<Self> {
        center.validate()?;

        if !half_width_m.is_finite() || half_width_m <= 0.0 {
            return Err(PlumeError::invalid_input(
                "half_width_m",
                format!("must be a positive distance, got {}", half_width_m),
            ));
        }
        if center.lat.abs() >= 90.0 {
            return Err(PlumeError::invalid_input(
                "lat",
                format!("{} is polar; longitude scale is undefined", center.lat),
            ));
        }

        let dlat = half_width_m / METERS_PER_DEGREE;
        let dlon = half_width_m / (METERS_PER_DEGREE * center.lat.to_radians().cos());

        Ok(Self {
            min_lon: center.lon - dlon,
            min_lat: center.lat - dlat,
            max_lon: center.lon + dlon,
            max_lat: center.lat + dlat,
        })
    }

    /// Width in degrees.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height in degrees.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Centre of the rectangle.
    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lon: (self.min_lon + self.max_lon) / 2.0,
            lat: (self.min_lat + self.max_lat) / 2.0,
        }
    }

    /// Half-widths (lon, lat) re-projected to metres at the centre latitude.
    pub fn half_width_m(&self) -> (f64, f64) {
        let lat = self.center().lat.to_radians();
        (
            self.width() / 2.0 * METERS_PER_DEGREE * lat.cos(),
            self.height() / 2.0 * METERS_PER_DEGREE,
        )
    }

    /// Check if this area intersects another.
    pub fn intersects(&self, other: &AreaOfInterest) -> bool {
        self.min_lon < other.max_lon
            && self.max_lon > other.min_lon
            && self.min_lat < other.max_lat
            && self.max_lat > other.min_lat
    }

    /// Intersection of two areas.
    pub fn intersection(&self, other: &AreaOfInterest) -> Option<AreaOfInterest> {
        if !self.intersects(other) {
            return None;
        }

        Some(AreaOfInterest {
            min_lon: self.min_lon.max(other.min_lon),
            min_lat: self.min_lat.max(other.min_lat),
            max_lon: self.max_lon.min(other.max_lon),
            max_lat: self.max_lat.min(other.max_lat),
        })
    }

    /// Check if a point lies inside the area.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }

    /// Cache key fragment, quantized to avoid floating point noise.
    pub fn cache_key(&self) -> String {
        format!(
            "{:.6}_{:.6}_{:.6}_{:.6}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}
