//! Spectral bands clipped to an area of interest.

use serde::{Deserialize, Serialize};

use crate::aoi::AreaOfInterest;
use crate::error::{PlumeError, PlumeResult};
use crate::raster::{Raster, RasterShape};

/// Identifier of a spectral band within a product collection (e.g. "B11").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BandId(pub String);

impl BandId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BandId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Reflectance samples of one band, clipped to an area of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralBand {
    pub band: BandId,
    /// Unitless reflectance, physically in [0, 1].
    pub raster: Raster,
    /// The area this band was clipped to.
    pub aoi: AreaOfInterest,
    /// Identifier of the scene the samples came from.
    pub scene_id: String,
}

impl SpectralBand {
    pub fn new(
        band: BandId,
        raster: Raster,
        aoi: AreaOfInterest,
        scene_id: impl Into<String>,
    ) -> Self {
        Self {
            band,
            raster,
            aoi,
            scene_id: scene_id.into(),
        }
    }

    pub fn shape(&self) -> RasterShape {
        self.raster.shape
    }

    pub fn resolution_m(&self) -> f64 {
        self.raster.resolution_m
    }

    /// Fail unless this band was clipped to `aoi`.
    pub fn ensure_clipped_to(&self, aoi: &AreaOfInterest) -> PlumeResult<()> {
        if self.aoi != *aoi {
            return Err(PlumeError::AoiMismatch(format!(
                "band {} covers {} but {} was requested",
                self.band,
                self.aoi.cache_key(),
                aoi.cache_key()
            )));
        }
        Ok(())
    }
}
