//! Fractional signal rasters.

use plume_common::{PlumeResult, Raster, ValueRange};
use serde::{Deserialize, Serialize};

/// How a fractional signal raster was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Single overpass ratio of two bands.
    Mbsp,
    /// Plume-day signal minus a reference-day signal.
    Differential,
}

/// Per-pixel fractional absorption signal with its valid-cell range.
#[derive(Debug, Clone, PartialEq)]
pub struct FractionalSignalRaster {
    pub raster: Raster,
    pub kind: SignalKind,
    /// Range over unmasked cells; `None` if every cell is masked.
    pub range: Option<ValueRange>,
}

impl FractionalSignalRaster {
    /// Wrap a raster, computing its range.
    pub fn new(raster: Raster, kind: SignalKind) -> Self {
        let range = raster.value_range();
        Self {
            raster,
            kind,
            range,
        }
    }

    /// Number of masked cells.
    pub fn masked_count(&self) -> usize {
        self.raster.shape.len() - self.raster.valid_count()
    }

    /// Fail unless both rasters share shape and resolution.
    pub fn ensure_same_grid(&self, other: &FractionalSignalRaster) -> PlumeResult<()> {
        self.raster.ensure_same_grid(&other.raster)
    }
}
