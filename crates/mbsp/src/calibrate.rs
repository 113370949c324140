//! Zero-intercept least-squares band ratio calibration.

use plume_common::{AreaOfInterest, PlumeError, PlumeResult, SpectralBand};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Regression slope relating two bands over an area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScaleFactor(pub f64);

impl ScaleFactor {
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// Fit `band_b ≈ c · band_a` with the intercept forced through zero.
///
/// Returns `c = Σ(A·B) / Σ(A²)` over every pixel where both samples are
/// finite. Both bands must share shape and resolution and be clipped to `aoi`.
pub fn calibrate(
    band_a: &SpectralBand,
    band_b: &SpectralBand,
    aoi: &AreaOfInterest,
) -> PlumeResult<ScaleFactor> {
    band_a.raster.ensure_same_grid(&band_b.raster)?;
    band_a.ensure_clipped_to(aoi)?;
    band_b.ensure_clipped_to(aoi)?;

    // Sequential f64 accumulation keeps the result bit-for-bit reproducible.
    let mut sum_ab = 0.0_f64;
    let mut sum_aa = 0.0_f64;
    let mut used = 0usize;
    for (&a, &b) in band_a.raster.data.iter().zip(&band_b.raster.data) {
        if !a.is_finite() || !b.is_finite() {
            continue;
        }
        let (a, b) = (a as f64, b as f64);
        sum_ab += a * b;
        sum_aa += a * a;
        used += 1;
    }

    if used == 0 {
        return Err(PlumeError::degenerate(format!(
            "no valid sample pairs between {} and {}",
            band_a.band, band_b.band
        )));
    }
    if sum_aa == 0.0 {
        return Err(PlumeError::degenerate(format!(
            "band {} is zero over all {} samples",
            band_a.band, used
        )));
    }

    let c = sum_ab / sum_aa;
    debug!(
        band_a = %band_a.band,
        band_b = %band_b.band,
        samples = used,
        scale = c,
        "Calibrated band ratio"
    );

    Ok(ScaleFactor(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, scaled_band, surface_band, test_aoi, uniform_band};

    #[test]
    fn test_proportional_bands() {
        let b = surface_band("B11", 6, 7);
        let a = scaled_band(&b, "B12", 1.5);
        let c = calibrate(&b, &a, &test_aoi()).unwrap();
        assert_approx_eq!(c.value(), 1.5, 1e-6);
    }

    #[test]
    fn test_flat_zero_band_is_degenerate() {
        let a = uniform_band(3, 3, 0.0);
        let b = uniform_band(3, 3, 0.4);
        let err = calibrate(&a, &b, &test_aoi()).unwrap_err();
        assert!(matches!(err, PlumeError::DegenerateRegression(_)));
    }

    #[test]
    fn test_all_missing_is_degenerate() {
        let a = uniform_band(2, 2, f32::NAN);
        let b = uniform_band(2, 2, 0.4);
        assert!(matches!(
            calibrate(&a, &b, &test_aoi()),
            Err(PlumeError::DegenerateRegression(_))
        ));
    }

    #[test]
    fn test_missing_samples_are_skipped() {
        let a = surface_band("B11", 4, 4);
        let mut b = scaled_band(&a, "B12", 2.0);
        b.raster.data[5] = f32::NAN;
        let c = calibrate(&a, &b, &test_aoi()).unwrap();
        assert_approx_eq!(c.value(), 2.0, 1e-6);
    }
}
