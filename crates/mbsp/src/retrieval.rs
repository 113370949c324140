//! Per-pixel MBSP fractional signal.

use plume_common::{PlumeError, PlumeResult, Raster, SpectralBand};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calibrate::ScaleFactor;
use crate::signal::{FractionalSignalRaster, SignalKind};

/// Options for the fractional signal computation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MbspOptions {
    /// Constant subtracted from every valid cell (`F − offset`).
    ///
    /// Zero disables it. Some published workflows remove a fixed model
    /// background (e.g. `-0.029`) here instead of differencing against a
    /// reference overpass.
    #[serde(default)]
    pub fractional_offset: f64,
}

impl MbspOptions {
    pub fn validate(&self) -> PlumeResult<()> {
        if !self.fractional_offset.is_finite() {
            return Err(PlumeError::invalid_input(
                "fractional_offset",
                "must be finite",
            ));
        }
        Ok(())
    }
}

/// Compute `F = (c · target − reference) / reference` for every pixel.
///
/// Cells where the reference sample is zero, or either sample is missing,
/// are masked (`NaN`). The returned range covers unmasked cells only.
pub fn retrieve_fractional_signal(
    reference: &SpectralBand,
    target: &SpectralBand,
    scale: ScaleFactor,
    options: &MbspOptions,
) -> PlumeResult<FractionalSignalRaster> {
    reference.raster.ensure_same_grid(&target.raster)?;
    options.validate()?;

    let c = scale.value();
    let offset = options.fractional_offset;

    let data: Vec<f32> = reference
        .raster
        .data
        .par_iter()
        .zip(target.raster.data.par_iter())
        .map(|(&r, &t)| {
            if r == 0.0 || !r.is_finite() || !t.is_finite() {
                return f32::NAN;
            }
            let (r, t) = (r as f64, t as f64);
            ((c * t - r) / r - offset) as f32
        })
        .collect();

    let raster = Raster {
        shape: reference.raster.shape,
        resolution_m: reference.raster.resolution_m,
        data,
    };
    let signal = FractionalSignalRaster::new(raster, SignalKind::Mbsp);

    let masked = signal.masked_count();
    if masked > 0 {
        metrics::counter!("mbsp_masked_pixels_total").increment(masked as u64);
    }
    info!(
        scene = %reference.scene_id,
        shape = %signal.raster.shape,
        scale = c,
        masked,
        min = signal.range.map(|r| r.min),
        max = signal.range.map(|r| r.max),
        "Retrieved MBSP fractional signal"
    );

    Ok(signal)
}
