//! Synthetic band generators.
//!
//! These create predictable reflectance patterns whose retrieval results can
//! be checked by hand.

use plume_common::{AreaOfInterest, BandId, GeoPoint, Raster, RasterShape, SpectralBand};

use crate::fixtures::hassi_messaoud;

/// Ground resolution of the synthetic bands (Sentinel-2 SWIR, 20 m).
pub const TEST_RESOLUTION_M: f64 = 20.0;

/// The 10 km square around the Hassi Messaoud source.
pub fn test_aoi() -> AreaOfInterest {
    let source = GeoPoint {
        lon: hassi_messaoud::SOURCE_LON,
        lat: hassi_messaoud::SOURCE_LAT,
    };
    AreaOfInterest::around(source, hassi_messaoud::HALF_WIDTH_M)
        .expect("fixture source is valid")
}

/// Creates a band whose cell (row, col) holds `f(row, col)`.
pub fn band_from_fn(
    band: &str,
    rows: usize,
    cols: usize,
    f: impl Fn(usize, usize) -> f32,
) -> SpectralBand {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            data.push(f(row, col));
        }
    }

    let raster = Raster::new(RasterShape::new(rows, cols), TEST_RESOLUTION_M, data)
        .expect("generator fills every cell");
    SpectralBand::new(BandId::new(band), raster, test_aoi(), "synthetic")
}

/// Creates a "B11" band with every cell set to `value`.
pub fn uniform_band(rows: usize, cols: usize, value: f32) -> SpectralBand {
    band_from_fn("B11", rows, cols, |_, _| value)
}

/// Returns a copy of `base` with every sample multiplied by `k` and relabelled.
pub fn scaled_band(base: &SpectralBand, band: &str, k: f32) -> SpectralBand {
    let mut out = base.clone();
    out.band = BandId::new(band);
    out.raster.data.iter_mut().for_each(|v| *v *= k);
    out
}

/// Creates a band with surface-like reflectance values.
///
/// Values form a smooth gradient from about 0.25 (top-left) to 0.55
/// (bottom-right), with no zero samples.
pub fn surface_band(band: &str, rows: usize, cols: usize) -> SpectralBand {
    band_from_fn(band, rows, cols, |row, col| {
        let x = col as f32 / cols.max(1) as f32;
        let y = row as f32 / rows.max(1) as f32;
        0.25 + 0.15 * x + 0.15 * y
    })
}

/// Applies a Gaussian absorption dip centred on (`row`, `col`).
///
/// Each sample is multiplied by `1 - depth * exp(-d² / (2 σ²))`, where `d` is
/// the distance in pixels, so `depth = 0.1` removes 10% of the signal at the
/// plume centre.
pub fn with_plume(
    base: &SpectralBand,
    row: usize,
    col: usize,
    depth: f32,
    sigma_px: f32,
) -> SpectralBand {
    let mut out = base.clone();
    let cols = out.raster.shape.cols;
    for (i, v) in out.raster.data.iter_mut().enumerate() {
        let dr = (i / cols) as f32 - row as f32;
        let dc = (i % cols) as f32 - col as f32;
        let d2 = dr * dr + dc * dc;
        *v *= 1.0 - depth * (-d2 / (2.0 * sigma_px * sigma_px)).exp();
    }
    out
}
